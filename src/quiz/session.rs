use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::quiz::error::TraversalError;
use crate::quiz::tree::{DecisionTree, Node, NodeIndex};

/// Joins answered option ids into the tally key.
pub const PATH_DELIMITER: &str = ">>>";

/// Serializable traversal state, written after every transition so a user
/// can pick up where they left off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Id of the node the user is looking at.
    pub current: String,
    /// Option ids picked so far, root first.
    pub answers: Vec<String>,
}

/// One user's walk through a shared tree.
///
/// The root's own id is not recorded: a fresh session has no answers and
/// every entry in `answers` is an option id.
#[derive(Debug, Clone)]
pub struct Session<'t> {
    tree: &'t DecisionTree,
    current: NodeIndex,
    answers: Vec<String>,
}

impl PartialEq for Session<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree)
            && self.current == other.current
            && self.answers == other.answers
    }
}

impl Eq for Session<'_> {}

impl<'t> Session<'t> {
    pub fn new(tree: &'t DecisionTree) -> Self {
        Self {
            tree,
            current: tree.root_index(),
            answers: Vec::new(),
        }
    }

    /// Rebuild a session from saved state by replaying its answers from the
    /// root. Fails if the replay does not land on the saved node, which
    /// happens when the tree changed since the state was written.
    pub fn resume(tree: &'t DecisionTree, state: &SessionState) -> Result<Self, TraversalError> {
        let session = Self::replay(tree, &state.answers)?;
        let reached = &session.current().id;
        if *reached != state.current {
            return Err(TraversalError::StaleState {
                expected: state.current.clone(),
                actual: reached.clone(),
            });
        }
        debug!(
            "Resumed session at {} after {} answers",
            reached,
            session.answers.len()
        );
        Ok(session)
    }

    /// Select `answers` in order, starting from the root.
    pub fn replay(tree: &'t DecisionTree, answers: &[String]) -> Result<Self, TraversalError> {
        let mut session = Self::new(tree);
        for answer in answers {
            session.select(answer)?;
        }
        Ok(session)
    }

    pub fn tree(&self) -> &'t DecisionTree {
        self.tree
    }

    pub fn current(&self) -> &'t Node {
        self.tree.node(self.current)
    }

    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    /// Follow the option `option_id` of the current node.
    ///
    /// On error nothing changes, so the caller can offer the options again.
    pub fn select(&mut self, option_id: &str) -> Result<&'t Node, TraversalError> {
        let node = self.current();
        let edge = node
            .option(option_id)
            .ok_or_else(|| TraversalError::UnknownOption {
                node: node.id.clone(),
                option: option_id.to_string(),
            })?;
        let next = self.tree.resolve(edge)?;

        self.answers.push(edge.id.clone());
        self.current = next;

        let next_node = self.tree.node(next);
        info!("Transition: {} -> {} (via {})", node.id, next_node.id, edge.id);
        Ok(next_node)
    }

    pub fn is_terminal(&self) -> bool {
        self.current().is_terminal()
    }

    pub fn reset(&mut self) {
        self.current = self.tree.root_index();
        self.answers.clear();
    }

    /// The answers joined with [`PATH_DELIMITER`]; identifies the outcome in
    /// the tally.
    pub fn path_key(&self) -> String {
        path_key(&self.answers)
    }

    pub fn snapshot(&self) -> SessionState {
        SessionState {
            current: self.current().id.clone(),
            answers: self.answers.clone(),
        }
    }
}

pub fn path_key(answers: &[String]) -> String {
    answers.join(PATH_DELIMITER)
}
