use serde::{Deserialize, Serialize};

/// What a node or an option shows to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    #[serde(flatten)]
    pub body: Body,
    /// Supplementary text shown below the main body (e.g. the reasoning
    /// behind a final recommendation).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Body {
    Text { text: String },
    Image { image: String },
    TextImage { text: String, image: String },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            body: Body::Text { text: text.into() },
            info: None,
        }
    }

    pub fn image(image: impl Into<String>) -> Self {
        Self {
            body: Body::Image {
                image: image.into(),
            },
            info: None,
        }
    }

    pub fn text_image(text: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            body: Body::TextImage {
                text: text.into(),
                image: image.into(),
            },
            info: None,
        }
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    pub fn text_str(&self) -> Option<&str> {
        match &self.body {
            Body::Text { text } | Body::TextImage { text, .. } => Some(text),
            Body::Image { .. } => None,
        }
    }

    pub fn image_str(&self) -> Option<&str> {
        match &self.body {
            Body::Image { image } | Body::TextImage { image, .. } => Some(image),
            Body::Text { .. } => None,
        }
    }

    /// True when every field required by the content kind is non-blank.
    pub fn is_well_formed(&self) -> bool {
        let filled = |s: &str| !s.trim().is_empty();
        match &self.body {
            Body::Text { text } => filled(text),
            Body::Image { image } => filled(image),
            Body::TextImage { text, image } => filled(text) && filled(image),
        }
    }
}

/// A question or a final recommendation, as authored.
///
/// This is the nested shape content authors write (and the JSON shape the
/// tree files use). It is validated and flattened into a
/// [`DecisionTree`](super::tree::DecisionTree) before anyone walks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionNode {
    /// Unique identifier for this node (e.g. "using-framework").
    pub id: String,
    pub content: Content,
    /// Display order matters: the first option is the primary one.
    /// Empty for terminal nodes.
    #[serde(default)]
    pub options: Vec<Choice>,
}

/// One answer the user can pick on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    pub content: Content,
    pub next: Next,
}

/// Where a choice leads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Next {
    // Id of a node defined earlier in the tree
    Ref(String),
    // Node owned by this choice
    Node(Box<DecisionNode>),
}

impl DecisionNode {
    pub fn new(id: impl Into<String>, content: Content) -> Self {
        Self {
            id: id.into(),
            content,
            options: Vec::new(),
        }
    }

    /// Append a choice leading to an inline child node.
    pub fn with_choice(mut self, id: impl Into<String>, content: Content, next: DecisionNode) -> Self {
        self.options.push(Choice {
            id: id.into(),
            content,
            next: Next::Node(Box::new(next)),
        });
        self
    }

    /// Append a choice leading back to a node defined elsewhere in the tree.
    pub fn with_ref(
        mut self,
        id: impl Into<String>,
        content: Content,
        target: impl Into<String>,
    ) -> Self {
        self.options.push(Choice {
            id: id.into(),
            content,
            next: Next::Ref(target.into()),
        });
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.options.is_empty()
    }
}
