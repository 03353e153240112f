use std::collections::HashSet;

use crate::quiz::error::ValidationError;
use crate::quiz::node::{DecisionNode, Next};
use crate::quiz::session::PATH_DELIMITER;

/// Check that an authored tree is safe to walk.
///
/// Walks depth-first from `root`. Node ids must be unique along any single
/// root-to-leaf path; a node reached through two different branches is
/// checked independently on each. A back-reference must name a node that was
/// already registered earlier in the walk, and must not name one of its own
/// ancestors.
pub fn validate(root: &DecisionNode) -> Result<(), ValidationError> {
    let mut walk = Walk::default();
    walk.visit(root)
}

#[derive(Default)]
struct Walk<'a> {
    path: Vec<&'a str>,
    registered: HashSet<&'a str>,
}

impl<'a> Walk<'a> {
    fn visit(&mut self, node: &'a DecisionNode) -> Result<(), ValidationError> {
        if node.id.trim().is_empty() {
            return Err(ValidationError::InvalidId {
                id: node.id.clone(),
                reason: "node id is empty",
            });
        }
        if self.path.contains(&node.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: node.id.clone(),
            });
        }
        if !node.content.is_well_formed() {
            return Err(ValidationError::InvalidContent {
                owner: format!("node `{}`", node.id),
            });
        }

        self.path.push(&node.id);
        self.registered.insert(&node.id);

        let mut option_ids = HashSet::new();
        for choice in &node.options {
            check_option_id(&choice.id)?;
            if !option_ids.insert(choice.id.as_str()) {
                return Err(ValidationError::DuplicateOptionId {
                    node: node.id.clone(),
                    option: choice.id.clone(),
                });
            }
            if !choice.content.is_well_formed() {
                return Err(ValidationError::InvalidContent {
                    owner: format!("option `{}` on node `{}`", choice.id, node.id),
                });
            }

            match &choice.next {
                Next::Ref(target) if self.path.contains(&target.as_str()) => {
                    return Err(ValidationError::CyclicReference {
                        node: node.id.clone(),
                        option: choice.id.clone(),
                        target: target.clone(),
                    });
                }
                Next::Ref(target) if !self.registered.contains(target.as_str()) => {
                    return Err(ValidationError::DanglingReference {
                        node: node.id.clone(),
                        option: choice.id.clone(),
                        target: target.clone(),
                    });
                }
                Next::Ref(_) => {}
                Next::Node(child) => self.visit(child)?,
            }
        }

        self.path.pop();
        Ok(())
    }
}

fn check_option_id(id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::InvalidId {
            id: id.to_string(),
            reason: "option id is empty",
        });
    }
    // The path key joins option ids with the delimiter, so it cannot occur
    // inside one.
    if id.contains(PATH_DELIMITER) {
        return Err(ValidationError::InvalidId {
            id: id.to_string(),
            reason: "option id contains the path delimiter",
        });
    }
    Ok(())
}
