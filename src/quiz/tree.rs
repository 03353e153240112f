use std::collections::HashMap;

use crate::quiz::error::{TraversalError, ValidationError};
use crate::quiz::node::{Content, DecisionNode, Next};
use crate::quiz::validate::validate;

/// Position of a node inside a [`DecisionTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIndex(usize);

/// A node after flattening: options point at arena slots or node ids.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub content: Content,
    pub options: Vec<Edge>,
}

impl Node {
    pub fn is_terminal(&self) -> bool {
        self.options.is_empty()
    }

    pub fn option(&self, id: &str) -> Option<&Edge> {
        self.options.iter().find(|edge| edge.id == id)
    }
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub id: String,
    pub content: Content,
    pub target: Target,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    // Inline child owned by this edge
    Node(NodeIndex),
    // Back-reference, looked up by id over the whole tree
    Alias(String),
}

/// The full decision graph: an arena of nodes plus an id -> index map.
///
/// Built once from a validated [`DecisionNode`] and never mutated after, so
/// any number of sessions can share one tree.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    index: HashMap<String, NodeIndex>,
    root: NodeIndex,
    total_steps: usize,
}

impl DecisionTree {
    /// Validate `root` and flatten it. A tree that fails validation cannot
    /// be constructed at all.
    pub fn new(root: DecisionNode) -> Result<Self, ValidationError> {
        validate(&root)?;

        let mut tree = Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            root: NodeIndex(0),
            total_steps: 0,
        };
        tree.root = tree.flatten(root);

        let mut memo = vec![None; tree.nodes.len()];
        tree.total_steps = tree.longest_path(tree.root, &mut memo);
        Ok(tree)
    }

    fn flatten(&mut self, node: DecisionNode) -> NodeIndex {
        let slot = NodeIndex(self.nodes.len());
        // Depth-first registration: the first node with a given id wins
        // lookups, same order validation registered them in.
        self.index.entry(node.id.clone()).or_insert(slot);
        self.nodes.push(Node {
            id: node.id,
            content: node.content,
            options: Vec::new(),
        });

        let mut edges = Vec::with_capacity(node.options.len());
        for choice in node.options {
            let target = match choice.next {
                Next::Ref(id) => Target::Alias(id),
                Next::Node(child) => Target::Node(self.flatten(*child)),
            };
            edges.push(Edge {
                id: choice.id,
                content: choice.content,
                target,
            });
        }
        self.nodes[slot.0].options = edges;
        slot
    }

    pub fn root_index(&self) -> NodeIndex {
        self.root
    }

    pub fn root(&self) -> &Node {
        self.node(self.root)
    }

    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index.0]
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.index_of(id).map(|index| self.node(index))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Where following `edge` lands.
    pub fn resolve(&self, edge: &Edge) -> Result<NodeIndex, TraversalError> {
        match &edge.target {
            Target::Node(index) => Ok(*index),
            Target::Alias(id) => self
                .index_of(id)
                .ok_or_else(|| TraversalError::DanglingReference { target: id.clone() }),
        }
    }

    /// Count the decisions on the longest path through the tree (i.e. the
    /// maximum number of questions a user can be asked).
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    // Shared branches are reached through several edges; `memo` keeps each
    // node to one visit.
    fn longest_path(&self, index: NodeIndex, memo: &mut [Option<usize>]) -> usize {
        if let Some(steps) = memo[index.0] {
            return steps;
        }
        let node = self.node(index);
        let steps = if node.is_terminal() {
            0
        } else {
            let mut max_child = 0;
            for edge in &node.options {
                if let Ok(next) = self.resolve(edge) {
                    max_child = max_child.max(self.longest_path(next, memo));
                }
            }
            1 + max_child
        };
        memo[index.0] = Some(steps);
        steps
    }

    /// Ids of every terminal node, in arena order.
    pub fn terminals(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|node| node.is_terminal())
            .map(|node| node.id.as_str())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// "Should you use Vercel?" scenario
// ---------------------------------------------------------------------------

const SERVER_EXPERIENCE: &str = "server-experience";

fn yes() -> Content {
    Content::text("Yes")
}

fn no() -> Content {
    Content::text("No")
}

fn use_vercel(suffix: &str, info: &str) -> DecisionNode {
    DecisionNode::new(
        format!("use-vercel-{suffix}"),
        Content::text("Just use Vercel").with_info(info),
    )
}

fn dont_use_vercel(suffix: &str, info: &str) -> DecisionNode {
    DecisionNode::new(
        format!("dont-use-vercel-{suffix}"),
        Content::text("Don't use Vercel").with_info(info),
    )
}

/// The authored tree behind the built-in quiz.
pub fn should_you_use_vercel_node() -> DecisionNode {
    let mentioned_by_guillermo = DecisionNode::new(
        "mentioned-by-guillermo",
        Content::text(
            "Do you want to have the chance to have your project mentioned by \
             <a target=\"_blank\" href=\"https://twitter.com/rauchg\">Guillermo Rauch</a>, \
             the CEO of Vercel?",
        ),
    )
    .with_choice(
        "yes-mentioned-by-guillermo",
        yes(),
        use_vercel(
            "yes-mentioned-by-guillermo",
            "It's <strong>actually</strong> better to host your project on your own server. \
             But by hosting it on Vercel, you have the chance to get exposure by having your \
             project mentioned by Guillermo Rauch.",
        ),
    )
    .with_choice(
        "no-mentioned-by-guillermo",
        no(),
        dont_use_vercel(
            "no-mentioned-by-guillermo",
            "If you host it on Vercel, you might be charged a lot because of the high traffic. \
             So host it on your own since you have the resources to do so.",
        ),
    );

    let server_experience = DecisionNode::new(
        SERVER_EXPERIENCE,
        Content::text("Have you or anyone in your team set up a server before?"),
    )
    .with_choice("yes-server-experience", yes(), mentioned_by_guillermo)
    .with_choice(
        "no-server-experience",
        no(),
        use_vercel(
            "no-server-experience",
            "Maintaining a server is not an easy task. You have to take care of software \
             upgrade, security, traffic management, etc. Better to focus on your project by \
             deploying it on Vercel.",
        ),
    );

    let traffic_scale = DecisionNode::new(
        "traffic-scale",
        Content::text(
            "From the scale 0-10, 10 being the most confident, how sure are you with your \
             project getting lots of traffic?",
        ),
    )
    .with_choice("traffic-confidence-high", Content::text("6-10"), server_experience)
    .with_choice(
        "traffic-confidence-low",
        Content::text("1-5"),
        use_vercel(
            "traffic-confidence-low",
            "Vercel has an attractive free plan so you can try it out to see if there's a \
             product market fit.",
        ),
    );

    // Existing projects with traffic re-enter the server-experience branch
    // defined above instead of duplicating it.
    let project_traffic = DecisionNode::new(
        "project-traffic",
        Content::text("Does your project have lots of traffic?"),
    )
    .with_ref("yes-project-traffic", yes(), SERVER_EXPERIENCE)
    .with_choice(
        "no-project-traffic",
        no(),
        use_vercel(
            "no-project-traffic",
            "It's better to deploy to Vercel so that you can focus on your project instead of \
             maintaining a server.",
        ),
    );

    let brand_new_project = DecisionNode::new(
        "brand-new-project",
        Content::text("Is it a brand new web project?"),
    )
    .with_choice("yes-brand-new-project", yes(), traffic_scale)
    .with_choice("no-use-framework", no(), project_traffic);

    DecisionNode::new(
        "using-framework",
        Content::text(
            "Are you using a framework like \
             <a target=\"_blank\" href=\"https://nextjs.org/\">Next.js</a> or \
             <a target=\"_blank\" href=\"https://remix.run/\">Remix</a>?",
        ),
    )
    .with_choice("yes-use-framework", yes(), brand_new_project)
    .with_choice(
        "no-framework",
        no(),
        dont_use_vercel("no-framework", "Why are you even thinking about using Vercel?"),
    )
}

pub fn should_you_use_vercel() -> Result<DecisionTree, ValidationError> {
    DecisionTree::new(should_you_use_vercel_node())
}
