use std::fmt;

use thiserror::Error;

/// Structural problems found while validating an authored tree.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("node id `{id}` appears twice on one path")]
    DuplicateId { id: String },
    #[error("node `{node}` has more than one option with id `{option}`")]
    DuplicateOptionId { node: String, option: String },
    #[error("invalid id `{id}`: {reason}")]
    InvalidId { id: String, reason: &'static str },
    #[error("{owner} has content that is missing a required field")]
    InvalidContent { owner: String },
    #[error("option `{option}` on node `{node}` refers back to its ancestor `{target}`")]
    CyclicReference {
        node: String,
        option: String,
        target: String,
    },
    #[error("option `{option}` on node `{node}` refers to undefined node `{target}`")]
    DanglingReference {
        node: String,
        option: String,
        target: String,
    },
}

/// Failures of a single transition. The session is left untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TraversalError {
    #[error("node `{node}` has no option `{option}`")]
    UnknownOption { node: String, option: String },
    #[error("no node with id `{target}` in the tree")]
    DanglingReference { target: String },
    #[error("saved state ends at `{expected}` but replaying its answers reaches `{actual}`")]
    StaleState { expected: String, actual: String },
}

/// Errors that stop a text notation from producing a tree at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotationError {
    #[error("no nodes found in input")]
    Empty,
    #[error("cannot determine the root node (candidates: {candidates:?})")]
    AmbiguousRoot { candidates: Vec<String> },
    #[error("root marker names unknown node `{id}`")]
    UnknownRoot { id: String },
}

/// A line of text notation that was skipped or only partly understood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// 1-based line number in the source text.
    pub line: usize,
    pub message: String,
}

impl ParseWarning {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}
