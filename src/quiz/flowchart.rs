//! Arrow-diagram notation, a subset of mermaid flowcharts.
//!
//! ```text
//! flowchart TD
//!     %% root: framework
//!     framework{"Using a framework?"} -->|Yes| new[Brand new project?]
//!     framework -->|No| nope(Don't use Vercel<br/>Why are you even thinking about it?)
//!     new -->|Yes| yes(Just use Vercel)
//! ```
//!
//! Each line holds at most one `-->` edge. A node reference is an id,
//! optionally followed by a label in `()`, `[]`, `{}` or `<>`. Text after a
//! `<br/>` inside the label becomes the node's info. `|Label|` after the
//! arrow labels the option.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use crate::quiz::error::{NotationError, ParseWarning};
use crate::quiz::node::{Choice, Content, DecisionNode, Next};
use crate::quiz::notation::{option_id, ParsedTree};

const ARROW: &str = "-->";

fn node_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?P<id>[A-Za-z0-9_][A-Za-z0-9_-]*)\s*(?P<label>.*)$").unwrap())
}

fn br_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^<br\s*/?>").unwrap())
}

fn root_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^%%\s*root\s*:\s*(?P<id>\S+)\s*$").unwrap())
}

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:graph|flowchart)\b").unwrap())
}

/// A node reference as written on one side of an arrow.
#[derive(Debug, PartialEq, Eq)]
struct NodeRef {
    id: String,
    label: Option<Label>,
}

#[derive(Debug, PartialEq, Eq)]
struct Label {
    text: String,
    info: Option<String>,
}

#[derive(Debug)]
struct FlowNode {
    id: String,
    label: Option<Label>,
    // First mention
    line: usize,
    edges: Vec<FlowEdge>,
    in_degree: usize,
}

#[derive(Debug)]
struct FlowEdge {
    option: String,
    label: Option<String>,
    target: usize,
}

#[derive(Debug, Default)]
struct Graph {
    nodes: Vec<FlowNode>,
    by_id: HashMap<String, usize>,
    root_marker: Option<String>,
    warnings: Vec<ParseWarning>,
}

/// Parse an arrow diagram into a tree rooted at the node named by a
/// `%% root: <id>` line, or else at the only node nothing points to.
pub fn parse_flowchart(input: &str) -> Result<ParsedTree, NotationError> {
    let mut graph = Graph::default();
    for (n, line) in input.lines().enumerate() {
        graph.line(n + 1, line.trim());
    }
    graph.into_tree()
}

impl Graph {
    fn line(&mut self, line_no: usize, line: &str) {
        if line.is_empty() || header_re().is_match(line) {
            return;
        }
        if line.starts_with("%%") {
            if let Some(caps) = root_marker_re().captures(line) {
                self.root_marker = Some(caps["id"].to_string());
            }
            return;
        }

        let parts: Vec<&str> = line.split(ARROW).collect();
        match parts.as_slice() {
            [single] => match parse_node_ref(single) {
                Ok(node) => {
                    self.register(line_no, node);
                }
                Err(message) => self.warnings.push(ParseWarning::new(line_no, message)),
            },
            [left, right] => {
                if let Err(message) = self.edge(line_no, left, right) {
                    self.warnings.push(ParseWarning::new(line_no, message));
                }
            }
            _ => self.warnings.push(ParseWarning::new(
                line_no,
                format!("expected at most one `{ARROW}`"),
            )),
        }
    }

    fn edge(&mut self, line_no: usize, left: &str, right: &str) -> Result<(), String> {
        let source = parse_node_ref(left)?;
        let (label, right) = split_edge_label(right)?;
        let target = parse_node_ref(right)?;

        // Parse both sides before registering either, so a bad line leaves
        // no half-registered nodes behind.
        let source = self.register(line_no, source);
        let target = self.register(line_no, target);

        let option = option_id(label.unwrap_or(""), &self.nodes[target].id);
        if self.nodes[source].edges.iter().any(|e| e.option == option) {
            return Err(format!(
                "duplicate edge `{option}` from `{}`",
                self.nodes[source].id
            ));
        }
        self.nodes[source].edges.push(FlowEdge {
            option,
            label: label.map(str::to_string),
            target,
        });
        self.nodes[target].in_degree += 1;
        Ok(())
    }

    /// Return the slot for `node`, creating it on first mention.
    fn register(&mut self, line_no: usize, node: NodeRef) -> usize {
        if let Some(&slot) = self.by_id.get(&node.id) {
            let relabelled = match (&self.nodes[slot].label, &node.label) {
                (Some(old), Some(new)) => old != new,
                _ => false,
            };
            if relabelled {
                self.warnings.push(ParseWarning::new(
                    line_no,
                    format!("node `{}` relabelled; keeping the first label", node.id),
                ));
            } else if self.nodes[slot].label.is_none() {
                self.nodes[slot].label = node.label;
            }
            return slot;
        }

        let slot = self.nodes.len();
        self.by_id.insert(node.id.clone(), slot);
        self.nodes.push(FlowNode {
            id: node.id,
            label: node.label,
            line: line_no,
            edges: Vec::new(),
            in_degree: 0,
        });
        slot
    }

    fn root(&self) -> Result<usize, NotationError> {
        if self.nodes.is_empty() {
            return Err(NotationError::Empty);
        }
        if let Some(id) = &self.root_marker {
            return self
                .by_id
                .get(id)
                .copied()
                .ok_or_else(|| NotationError::UnknownRoot { id: id.clone() });
        }

        let candidates: Vec<usize> = (0..self.nodes.len())
            .filter(|&slot| self.nodes[slot].in_degree == 0)
            .collect();
        match candidates.as_slice() {
            [only] => Ok(*only),
            _ => Err(NotationError::AmbiguousRoot {
                candidates: candidates
                    .iter()
                    .map(|&slot| self.nodes[slot].id.clone())
                    .collect(),
            }),
        }
    }

    fn into_tree(self) -> Result<ParsedTree, NotationError> {
        let root = self.root()?;
        debug!("Flowchart root: {}", self.nodes[root].id);

        let mut emitted = HashSet::new();
        let tree = self.emit(root, &mut emitted);

        let unreachable: Vec<ParseWarning> = self
            .nodes
            .iter()
            .filter(|node| !emitted.contains(node.id.as_str()))
            .map(|node| {
                ParseWarning::new(
                    node.line,
                    format!("node `{}` is unreachable from the root", node.id),
                )
            })
            .collect();

        let mut warnings = self.warnings;
        warnings.extend(unreachable);
        Ok(ParsedTree {
            root: tree,
            warnings,
        })
    }

    /// Depth-first: a node is written inline the first time it is reached
    /// and as a back-reference every time after.
    fn emit<'a>(&'a self, slot: usize, emitted: &mut HashSet<&'a str>) -> DecisionNode {
        let node = &self.nodes[slot];
        emitted.insert(node.id.as_str());

        let mut out = DecisionNode::new(node.id.clone(), self.content(slot));
        for edge in &node.edges {
            let target = &self.nodes[edge.target];
            let next = if emitted.contains(target.id.as_str()) {
                Next::Ref(target.id.clone())
            } else {
                Next::Node(Box::new(self.emit(edge.target, emitted)))
            };
            let text = match &edge.label {
                Some(label) => label.clone(),
                None => self.display_text(edge.target),
            };
            out.options.push(Choice {
                id: edge.option.clone(),
                content: Content::text(text),
                next,
            });
        }
        out
    }

    fn display_text(&self, slot: usize) -> String {
        let node = &self.nodes[slot];
        match &node.label {
            Some(label) => label.text.clone(),
            None => node.id.clone(),
        }
    }

    fn content(&self, slot: usize) -> Content {
        let content = Content::text(self.display_text(slot));
        match self.nodes[slot].label.as_ref().and_then(|l| l.info.clone()) {
            Some(info) => content.with_info(info),
            None => content,
        }
    }
}

/// Split `|Label| target` into the label and the rest.
fn split_edge_label(right: &str) -> Result<(Option<&str>, &str), String> {
    let right = right.trim();
    let Some(after) = right.strip_prefix('|') else {
        return Ok((None, right));
    };
    let Some((label, rest)) = after.split_once('|') else {
        return Err("unterminated `|` edge label".to_string());
    };
    let label = label.trim();
    let label = (!label.is_empty()).then_some(label);
    Ok((label, rest.trim()))
}

fn parse_node_ref(text: &str) -> Result<NodeRef, String> {
    let text = text.trim();
    let caps = node_ref_re()
        .captures(text)
        .ok_or_else(|| format!("invalid node reference `{text}`"))?;
    let id = caps["id"].to_string();
    let rest = caps["label"].trim();
    if rest.is_empty() {
        return Ok(NodeRef { id, label: None });
    }

    let inner = bracket_contents(rest).map_err(|message| format!("node `{id}`: {message}"))?;
    Ok(NodeRef {
        id,
        label: split_label(inner),
    })
}

fn closer_for(open: char) -> Option<char> {
    match open {
        '(' => Some(')'),
        '[' => Some(']'),
        '{' => Some('}'),
        '<' => Some('>'),
        _ => None,
    }
}

/// Contents of the bracket pair wrapping all of `text`. Brackets must nest
/// properly; `<br>` tags and anything inside double quotes are skipped.
fn bracket_contents(text: &str) -> Result<&str, String> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_quotes = false;
    let mut pos = 0;

    while pos < text.len() {
        let rest = &text[pos..];
        let Some(c) = rest.chars().next() else { break };

        if !in_quotes && !stack.is_empty() {
            if let Some(tag) = br_re().find(rest) {
                pos += tag.end();
                continue;
            }
        }

        match c {
            '"' if !stack.is_empty() => in_quotes = !in_quotes,
            _ if in_quotes => {}
            '(' | '[' | '{' | '<' => stack.push(c),
            ')' | ']' | '}' | '>' => {
                let open = stack
                    .pop()
                    .ok_or_else(|| format!("unexpected `{c}`"))?;
                if closer_for(open) != Some(c) {
                    return Err(format!("`{open}` closed by `{c}`"));
                }
                if stack.is_empty() {
                    let end = pos + c.len_utf8();
                    if end != text.len() {
                        return Err(format!("unexpected text after label: `{}`", &text[end..]));
                    }
                    return Ok(&text[1..pos]);
                }
            }
            _ if stack.is_empty() => return Err(format!("expected a bracketed label, found `{c}`")),
            _ => {}
        }
        pos += c.len_utf8();
    }

    if in_quotes {
        return Err("unterminated quote".to_string());
    }
    Err("unclosed bracket".to_string())
}

fn split_label(inner: &str) -> Option<Label> {
    let inner = inner.trim();
    let inner = inner
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(inner);

    let mut parts = Vec::new();
    let mut rest = inner;
    while let Some(pos) = rest.to_ascii_lowercase().find("<br") {
        match br_re().find(&rest[pos..]) {
            Some(tag) => {
                parts.push(&rest[..pos]);
                rest = &rest[pos + tag.end()..];
            }
            None => break,
        }
    }
    parts.push(rest);

    let mut parts = parts.into_iter().map(|p| p.trim().trim_matches('"').trim());
    let text = parts.next().unwrap_or_default().to_string();
    let info: Vec<&str> = parts.filter(|p| !p.is_empty()).collect();
    if text.is_empty() {
        return None;
    }
    Some(Label {
        text,
        info: (!info.is_empty()).then(|| info.join("\n")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::session::Session;
    use crate::quiz::tree::DecisionTree;

    #[test]
    fn test_node_ref_forms() {
        assert_eq!(
            parse_node_ref("A").unwrap(),
            NodeRef {
                id: "A".into(),
                label: None
            }
        );
        for text in ["A(Hello)", "A[Hello]", "A{Hello}", "A<Hello>", "A[\"Hello\"]"] {
            let node = parse_node_ref(text).unwrap();
            assert_eq!(node.label.unwrap().text, "Hello", "{text}");
        }

        let node = parse_node_ref("end(\"Don't use Vercel<br/>Why even (seriously)?\")").unwrap();
        let label = node.label.unwrap();
        assert_eq!(label.text, "Don't use Vercel");
        assert_eq!(label.info.as_deref(), Some("Why even (seriously)?"));
    }

    #[test]
    fn test_mismatched_brackets_are_rejected() {
        assert!(parse_node_ref("A[Hello)").is_err());
        assert!(parse_node_ref("A[Hello").is_err());
        assert!(parse_node_ref("A[Hello] extra").is_err());
        assert!(parse_node_ref("A Hello").is_err());
        assert!(parse_node_ref("[Hello]").is_err());
    }

    #[test]
    fn test_bad_lines_are_skipped_with_warnings() {
        let input = "
flowchart TD
R[Start] -->|Go| A[Next)
R -->|Go| B(End)
R --> C --> D
";
        let parsed = parse_flowchart(input).unwrap();
        let lines: Vec<usize> = parsed.warnings.iter().map(|w| w.line).collect();
        assert_eq!(lines, vec![3, 5]);
        assert_eq!(parsed.root.id, "R");
        assert_eq!(parsed.root.options.len(), 1);
        assert_eq!(parsed.root.options[0].id, "go-B");
    }

    #[test]
    fn test_shared_target_is_one_node() {
        let input = "
R[Start] -->|Left| X[Is it X?]
R -->|Right| Y[Is it Y?]
X --> |Yes| Z(Shared outcome)
Y --> |Yes| Z
X -->|No| NX(Not X)
Y -->|No| NY(Not Y)
";
        let parsed = parse_flowchart(input).unwrap();
        assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);
        let tree = DecisionTree::new(parsed.root).unwrap();

        let x = tree.get("X").unwrap();
        let y = tree.get("Y").unwrap();
        let via_x = tree.resolve(x.option("yes-Z").unwrap()).unwrap();
        let via_y = tree.resolve(y.option("yes-Z").unwrap()).unwrap();
        assert_eq!(via_x, via_y);

        let mut left = Session::new(&tree);
        left.select("left-X").unwrap();
        let from_x = left.select("yes-Z").unwrap();
        let mut right = Session::new(&tree);
        right.select("right-Y").unwrap();
        let from_y = right.select("yes-Z").unwrap();
        assert!(std::ptr::eq(from_x, from_y));
        assert_eq!(from_y.content.text_str(), Some("Shared outcome"));
    }

    #[test]
    fn test_repeated_source_merges_options() {
        let input = "Q{Pick one} -->|A| a(Alpha)\nQ -->|B| b(Beta)\nQ -->|B| b\n";
        let parsed = parse_flowchart(input).unwrap();
        assert_eq!(parsed.root.options.len(), 2);
        assert_eq!(parsed.warnings.len(), 1);
        assert!(parsed.warnings[0].message.contains("duplicate edge"));
    }

    #[test]
    fn test_unlabelled_edge_uses_target_text() {
        let parsed = parse_flowchart("Q[Continue?] --> done(All done)").unwrap();
        let choice = &parsed.root.options[0];
        assert_eq!(choice.id, "done");
        assert_eq!(choice.content.text_str(), Some("All done"));
    }

    #[test]
    fn test_ambiguous_root_is_an_error() {
        let err = parse_flowchart("X --> |Yes| Z\nY --> |Yes| Z").unwrap_err();
        assert_eq!(
            err,
            NotationError::AmbiguousRoot {
                candidates: vec!["X".into(), "Y".into()]
            }
        );

        let cyclic = parse_flowchart("A --> B\nB --> A").unwrap_err();
        assert_eq!(cyclic, NotationError::AmbiguousRoot { candidates: vec![] });
    }

    #[test]
    fn test_root_marker_picks_root() {
        let input = "%% root: Y\nX --> |Yes| Z\nY --> |Yes| Z";
        let parsed = parse_flowchart(input).unwrap();
        assert_eq!(parsed.root.id, "Y");
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].line, 2);
        assert!(parsed.warnings[0].message.contains("`X`"));

        let missing = parse_flowchart("%% root: nope\nA --> B").unwrap_err();
        assert_eq!(missing, NotationError::UnknownRoot { id: "nope".into() });
    }

    #[test]
    fn test_cycle_is_rejected_by_validation() {
        let input = "%% root: A\nA[Q1] -->|Next| B[Q2]\nB -->|Back| A";
        let parsed = parse_flowchart(input).unwrap();
        assert!(DecisionTree::new(parsed.root).is_err());
    }

    #[test]
    fn test_info_from_line_break() {
        let parsed =
            parse_flowchart("q{Framework?} -->|No| n(\"Don't use Vercel<br/>Why are you even thinking about it?\")")
                .unwrap();
        match &parsed.root.options[0].next {
            Next::Node(node) => {
                assert_eq!(node.content.text_str(), Some("Don't use Vercel"));
                assert_eq!(
                    node.content.info.as_deref(),
                    Some("Why are you even thinking about it?")
                );
            }
            Next::Ref(id) => panic!("unexpected reference to {id}"),
        }
    }
}
