use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::quiz::flowchart::parse_flowchart;
use crate::quiz::node::DecisionNode;
use crate::quiz::notation::ParsedTree;
use crate::quiz::outline::parse_outline;
use crate::quiz::tree::DecisionTree;

/// The formats a tree file can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Outline,
    Flowchart,
}

impl Format {
    /// Pick a format from the file extension, falling back to sniffing the
    /// contents.
    pub fn detect(path: &Path, contents: &str) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("json") => Format::Json,
            Some("mmd" | "mermaid" | "flow") => Format::Flowchart,
            Some("md" | "txt" | "outline") => Format::Outline,
            _ if contents.trim_start().starts_with('{') => Format::Json,
            _ if contents.contains("-->") => Format::Flowchart,
            _ => Format::Outline,
        }
    }
}

/// Build a validated tree from `contents`. Notation warnings are logged and
/// do not stop the load; anything that would leave the tree unusable does.
pub fn parse_tree(format: Format, contents: &str) -> Result<DecisionTree> {
    let root = match format {
        Format::Json => serde_json::from_str::<DecisionNode>(contents)
            .context("failed to parse JSON decision tree")?,
        Format::Outline => {
            report(parse_outline(contents).context("failed to parse outline")?)
        }
        Format::Flowchart => {
            report(parse_flowchart(contents).context("failed to parse flowchart")?)
        }
    };
    let tree = DecisionTree::new(root).context("decision tree is invalid")?;
    Ok(tree)
}

pub fn load_tree(path: &Path) -> Result<DecisionTree> {
    let contents = fs::read_to_string(path)
        .context(format!("failed to read tree file {}", path.display()))?;
    let format = Format::detect(path, &contents);
    info!("Loading {:?} tree from {}", format, path.display());
    parse_tree(format, &contents).context(format!("in {}", path.display()))
}

fn report(parsed: ParsedTree) -> DecisionNode {
    for warning in &parsed.warnings {
        warn!("Skipped {warning}");
    }
    parsed.root
}
