//! Pieces shared by the text front-ends ([`outline`](super::outline) and
//! [`flowchart`](super::flowchart)).

use std::collections::{HashMap, HashSet};

use slug::slugify;

use crate::quiz::error::ParseWarning;
use crate::quiz::node::DecisionNode;

/// Result of parsing a text notation. `root` still has to go through
/// [`DecisionTree::new`](super::tree::DecisionTree::new) before use.
#[derive(Debug, Clone)]
pub struct ParsedTree {
    pub root: DecisionNode,
    /// Lines that were skipped or only partly understood.
    pub warnings: Vec<ParseWarning>,
}

/// Hands out node ids derived from display text, unique within one document
/// (`traffic`, `traffic-2`, ...).
#[derive(Debug, Default)]
pub struct IdSlugger {
    occurrences: HashMap<String, usize>,
    issued: HashSet<String>,
}

impl IdSlugger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_id(&mut self, text: &str) -> String {
        let mut base = slugify(text);
        if base.is_empty() {
            base = "node".to_string();
        }
        let count = self.occurrences.entry(base.clone()).or_insert(0);
        loop {
            *count += 1;
            let candidate = if *count == 1 {
                base.clone()
            } else {
                format!("{base}-{count}")
            };
            // A plain slug can itself end in `-N`, so check every candidate.
            if self.issued.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

/// Id of the option labelled `label` that leads to node `target`. Including
/// the target keeps ids apart when the same label appears on many edges.
pub fn option_id(label: &str, target: &str) -> String {
    let label = label.trim();
    if label.is_empty() {
        return target.to_string();
    }
    format!("{}-{}", label.to_lowercase(), target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_ids_are_unique() {
        let mut slugger = IdSlugger::new();
        assert_eq!(slugger.node_id("Just use Vercel."), "just-use-vercel");
        assert_eq!(slugger.node_id("Just use Vercel"), "just-use-vercel-2");
        assert_eq!(slugger.node_id("Q 2"), "q-2");
        assert_eq!(slugger.node_id("Q"), "q");
        assert_eq!(slugger.node_id("Q"), "q-3");
        assert_eq!(slugger.node_id("?"), "node");
    }

    #[test]
    fn test_option_id() {
        assert_eq!(option_id("Yes", "Z"), "yes-Z");
        assert_eq!(option_id("", "Z"), "Z");
    }
}
