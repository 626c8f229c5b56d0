use scraper::Html;

use crate::extract::text_content;

/// One node added to the page by a DOM mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddedNode {
    /// Outer HTML of an added element.
    Element(String),
    /// A bare text node.
    Text(String),
}

impl AddedNode {
    /// Full text of an element node, buttons and hidden parts included.
    /// Text nodes are not scanned.
    pub fn element_text(&self) -> Option<String> {
        match self {
            AddedNode::Element(html) => {
                let fragment = Html::parse_fragment(html);
                Some(text_content(&fragment.root_element()))
            }
            AddedNode::Text(_) => None,
        }
    }
}

/// Nodes added by one batch of mutation records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationBatch {
    pub added: Vec<AddedNode>,
}

impl MutationBatch {
    pub fn new(added: Vec<AddedNode>) -> Self {
        Self { added }
    }

    pub fn element(html: impl Into<String>) -> Self {
        Self::new(vec![AddedNode::Element(html.into())])
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
    }
}
