use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::normalize::ROOT_NAME;
use crate::TARGET_TAXONOMY;

/// Name given to nodes that carry no `name` field.
pub const DEFAULT_NODE_NAME: &str = "Root";

/// One node of the internal project taxonomy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyNode {
    pub name: String,
    #[serde(default)]
    pub children: Vec<TaxonomyNode>,
    // Leaf items (project names) attached directly to this node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<String>>,
}

impl TaxonomyNode {
    pub fn new(name: &str) -> Self {
        TaxonomyNode {
            name: name.to_string(),
            children: Vec::new(),
            projects: None,
        }
    }

    pub fn with_projects(mut self, projects: &[&str]) -> Self {
        self.projects = Some(projects.iter().map(|p| p.to_string()).collect());
        self
    }

    pub fn with_child(mut self, child: TaxonomyNode) -> Self {
        self.children.push(child);
        self
    }

    /// Number of nodes in this subtree, including this one.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }

    /// Builds a node from loosely-typed JSON.
    ///
    /// Tolerates what hand-edited tree files contain: a missing `name` becomes
    /// [`DEFAULT_NODE_NAME`], non-array `children`/`projects` are ignored, and
    /// non-string project entries are dropped.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| anyhow!("taxonomy node is not a JSON object"))?;

        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_NODE_NAME)
            .to_string();

        let projects = match obj.get("projects") {
            Some(Value::Array(items)) => {
                let kept: Vec<String> = items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect();
                if kept.len() != items.len() {
                    debug!(
                        target: TARGET_TAXONOMY,
                        "Dropped {} non-string project entries under '{}'",
                        items.len() - kept.len(),
                        name
                    );
                }
                Some(kept)
            }
            _ => None,
        };

        let children = match obj.get("children") {
            Some(Value::Array(items)) => items
                .iter()
                .map(TaxonomyNode::from_value)
                .collect::<Result<Vec<_>>>()?,
            _ => Vec::new(),
        };

        Ok(TaxonomyNode {
            name,
            children,
            projects,
        })
    }
}

/// A taxonomy document. The root's own name never appears in extracted paths.
#[derive(Debug, Clone, PartialEq)]
pub struct Taxonomy {
    pub root: TaxonomyNode,
}

impl Taxonomy {
    pub fn new(root: TaxonomyNode) -> Self {
        Taxonomy { root }
    }

    /// Accepts either a root object or an array of top-level nodes. An array is
    /// wrapped in a synthetic root, so each element's name stays in the path.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Object(_) => Ok(Taxonomy::new(TaxonomyNode::from_value(value)?)),
            Value::Array(items) => {
                let mut root = TaxonomyNode::new(ROOT_NAME);
                for item in items {
                    root.children.push(TaxonomyNode::from_value(item)?);
                }
                Ok(Taxonomy::new(root))
            }
            _ => Err(anyhow!("taxonomy document must be an object or an array")),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json).context("Failed to parse taxonomy JSON")?;
        Taxonomy::from_value(&value)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::InputNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read taxonomy file {}", path.display()))?;
        let taxonomy = Taxonomy::from_json_str(&json)?;
        info!(
            target: TARGET_TAXONOMY,
            "Loaded taxonomy from {} ({} nodes)",
            path.display(),
            taxonomy.root.node_count()
        );
        Ok(taxonomy)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.root)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write taxonomy file {}", path.display()))?;
        Ok(())
    }
}
