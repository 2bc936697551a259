use tracing::info;

use super::types::{Taxonomy, TaxonomyNode};
use crate::normalize::ROOT_NAME;
use crate::TARGET_TAXONOMY;

/// Separator between levels in raw category columns.
pub const CATEGORY_SEPARATOR: &str = "--";

/// Category assigned to records whose category column is empty or `\N`.
pub const UNCATEGORIZED: &str = "未分类";

/// Grows a taxonomy tree from flat `A--B--C` category paths.
///
/// Sibling order is first-seen order, so re-running over the same records
/// produces the same tree.
pub struct TaxonomyBuilder {
    root: TaxonomyNode,
    added: usize,
}

impl Default for TaxonomyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TaxonomyBuilder {
    pub fn new() -> Self {
        TaxonomyBuilder {
            root: TaxonomyNode::new(ROOT_NAME),
            added: 0,
        }
    }

    /// Attaches `project` to the node at `category_path`, creating nodes on the way.
    pub fn add(&mut self, project: &str, category_path: &str) {
        let category_path = category_path.trim();
        let category_path = if category_path.is_empty() || category_path == r"\N" {
            UNCATEGORIZED
        } else {
            category_path
        };

        let mut node = &mut self.root;
        for name in category_path.split(CATEGORY_SEPARATOR) {
            let index = match node.children.iter().position(|c| c.name == name) {
                Some(index) => index,
                None => {
                    node.children.push(TaxonomyNode::new(name));
                    node.children.len() - 1
                }
            };
            node = &mut node.children[index];
        }

        node.projects
            .get_or_insert_with(Vec::new)
            .push(project.to_string());
        self.added += 1;
    }

    pub fn build(self) -> Taxonomy {
        info!(
            target: TARGET_TAXONOMY,
            "Built taxonomy with {} nodes from {} projects",
            self.root.node_count(),
            self.added
        );
        Taxonomy::new(self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::extract_items;

    #[test]
    fn test_shared_prefixes_share_nodes() {
        let mut builder = TaxonomyBuilder::new();
        builder.add("产线自动化", "先进制造--工艺--其他");
        builder.add("节能涂层", "先进制造--工艺");
        builder.add("碳纤维", "新材料");
        let taxonomy = builder.build();

        assert_eq!(taxonomy.root.children.len(), 2);
        let manufacturing = &taxonomy.root.children[0];
        assert_eq!(manufacturing.name, "先进制造");
        assert_eq!(manufacturing.children.len(), 1);
        let process = &manufacturing.children[0];
        assert_eq!(process.projects.as_ref().unwrap(), &vec!["节能涂层".to_string()]);
        assert_eq!(process.children[0].name, "其他");
    }

    #[test]
    fn test_missing_category_is_uncategorized() {
        let mut builder = TaxonomyBuilder::new();
        builder.add("A", "");
        builder.add("B", r"\N");
        let taxonomy = builder.build();
        assert_eq!(taxonomy.root.children.len(), 1);
        assert_eq!(taxonomy.root.children[0].name, UNCATEGORIZED);
    }

    #[test]
    fn test_built_tree_round_trips_through_extractor() {
        let mut builder = TaxonomyBuilder::new();
        builder.add("产线自动化", "先进制造--工艺");
        let extraction = extract_items(&builder.build());
        assert_eq!(extraction.items[0].path, "先进制造 > 工艺");
    }
}
