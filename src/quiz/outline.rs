//! Indented-bullet notation.
//!
//! ```text
//! - Are you using a framework like Next.js or Remix?
//!   - Yes:
//!     - Is it a brand new web project?
//!       - Yes: Just use Vercel.
//!       - No: Don't use Vercel.
//!   - No: Don't use Vercel.
//! ```
//!
//! Levels alternate between questions and answers. An answer written as
//! `Label: Text` leads straight to `Text`; an answer written as `Label:`
//! leads to the question nested under it. Trailing colons are decoration.

use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use crate::quiz::error::{NotationError, ParseWarning};
use crate::quiz::node::{Choice, Content, DecisionNode, Next};
use crate::quiz::notation::{option_id, IdSlugger, ParsedTree};

fn bullet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<indent>[ \t]*)(?P<marks>(?:-(?:[ \t]+|$))+)(?P<rest>.*)$").unwrap()
    })
}

#[derive(Debug)]
struct Item {
    text: String,
    line: usize,
    children: Vec<usize>,
}

/// Parse the outline. The first top-level item is the root; further
/// top-level items are reported as warnings and ignored.
pub fn parse_outline(input: &str) -> Result<ParsedTree, NotationError> {
    let mut warnings = Vec::new();
    let mut items: Vec<Item> = Vec::new();
    let mut roots: Vec<usize> = Vec::new();
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for (n, line) in input.lines().enumerate() {
        let line_no = n + 1;
        if line.trim().is_empty() {
            continue;
        }
        let Some(caps) = bullet_re().captures(line) else {
            warnings.push(ParseWarning::new(line_no, "not a bullet item"));
            continue;
        };

        let indent: usize = caps["indent"]
            .chars()
            .map(|c| if c == '\t' { 2 } else { 1 })
            .sum();
        let marks = caps["marks"].matches('-').count();
        let depth = indent / 2 + marks - 1;

        let rest = caps["rest"].trim();
        let text = rest.strip_suffix(':').unwrap_or(rest).trim();
        if text.is_empty() {
            debug!("Skipping empty outline item on line {line_no}");
            continue;
        }

        while stack.last().is_some_and(|&(_, d)| d >= depth) {
            stack.pop();
        }

        let index = items.len();
        items.push(Item {
            text: text.to_string(),
            line: line_no,
            children: Vec::new(),
        });
        match stack.last() {
            Some(&(parent, _)) => items[parent].children.push(index),
            None => roots.push(index),
        }
        stack.push((index, depth));
    }

    let Some((&first, rest)) = roots.split_first() else {
        return Err(NotationError::Empty);
    };
    for &extra in rest {
        warnings.push(ParseWarning::new(
            items[extra].line,
            format!("ignoring additional top-level item `{}`", items[extra].text),
        ));
    }

    let mut builder = Builder {
        items: &items,
        slugger: IdSlugger::new(),
        warnings,
    };
    let root = builder.question(first);
    Ok(ParsedTree {
        root,
        warnings: builder.warnings,
    })
}

struct Builder<'a> {
    items: &'a [Item],
    slugger: IdSlugger,
    warnings: Vec<ParseWarning>,
}

impl Builder<'_> {
    fn question(&mut self, index: usize) -> DecisionNode {
        let items = self.items;
        let item = &items[index];
        self.node(&item.text, &item.children)
    }

    fn node(&mut self, text: &str, answers: &[usize]) -> DecisionNode {
        let mut node = DecisionNode::new(self.slugger.node_id(text), Content::text(text));
        node.options = answers.iter().map(|&a| self.answer(a)).collect();
        node
    }

    fn answer(&mut self, index: usize) -> Choice {
        let items = self.items;
        let item = &items[index];

        let (label, target) = match split_inline(&item.text) {
            Some((label, outcome)) => (label, self.node(outcome, &item.children)),
            None => {
                let label = item.text.as_str();
                let target = match item.children.as_slice() {
                    [] => self.node(label, &[]),
                    [only] => self.question(*only),
                    [first, ..] => {
                        self.warnings.push(ParseWarning::new(
                            item.line,
                            format!(
                                "answer `{label}` has {} follow-up questions; using the first",
                                item.children.len()
                            ),
                        ));
                        self.question(*first)
                    }
                };
                (label, target)
            }
        };

        Choice {
            id: option_id(label, &target.id),
            content: Content::text(label),
            next: Next::Node(Box::new(target)),
        }
    }
}

/// `"Yes: Just use Vercel."` -> `("Yes", "Just use Vercel.")`.
fn split_inline(text: &str) -> Option<(&str, &str)> {
    let (label, outcome) = text.split_once(": ")?;
    let (label, outcome) = (label.trim(), outcome.trim());
    if label.is_empty() || outcome.is_empty() {
        return None;
    }
    Some((label, outcome))
}
