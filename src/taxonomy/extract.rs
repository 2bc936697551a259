use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::types::{Taxonomy, TaxonomyNode};
use crate::normalize::DISPLAY_SEPARATOR;
use crate::TARGET_TAXONOMY;

/// A leaf item together with the path of the node it hangs from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyItem {
    pub item: String,
    pub path: String,
}

#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub items: Vec<TaxonomyItem>,
    /// Empty or whitespace-only item strings that were dropped.
    pub skipped_empty: usize,
}

/// Flattens the taxonomy into `(item, path)` pairs in depth-first,
/// first-child-first order. A node's own items come before its children's.
pub fn extract_items(taxonomy: &Taxonomy) -> Extraction {
    let mut extraction = Extraction::default();

    // (node, path of names from below the root down to and including this node)
    let mut stack: Vec<(&TaxonomyNode, Vec<&str>)> = vec![(&taxonomy.root, Vec::new())];

    while let Some((node, names)) = stack.pop() {
        let path = names.join(DISPLAY_SEPARATOR);

        if let Some(projects) = &node.projects {
            for project in projects {
                if project.trim().is_empty() {
                    extraction.skipped_empty += 1;
                    continue;
                }
                extraction.items.push(TaxonomyItem {
                    item: project.clone(),
                    path: path.clone(),
                });
            }
        }

        // reversed so the first child is popped first
        for child in node.children.iter().rev() {
            let mut child_names = names.clone();
            child_names.push(child.name.as_str());
            stack.push((child, child_names));
        }
    }

    if extraction.skipped_empty > 0 {
        debug!(
            target: TARGET_TAXONOMY,
            "Skipped {} empty item strings", extraction.skipped_empty
        );
    }
    info!(
        target: TARGET_TAXONOMY,
        "Extracted {} items from taxonomy", extraction.items.len()
    );

    extraction
}
