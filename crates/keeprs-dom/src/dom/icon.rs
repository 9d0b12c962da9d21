use super::NodeRef;
use crate::model::Icon;
use std::fmt;

/// An `IconID` element. Each group or entry owns its own.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DomIcon {
    inner: NodeRef,
}

impl DomIcon {
    pub(crate) fn new(inner: NodeRef) -> Self {
        Self { inner }
    }
}

impl Icon for DomIcon {
    /// Unparseable content reads as the default icon, 0.
    fn index(&self) -> i32 {
        self.inner
            .read(|state, node| state.doc.text(node).trim().parse().unwrap_or(0))
    }

    fn set_index(&self, index: i32) {
        self.inner
            .write(|state, node| state.doc.set_text(node, index.to_string()));
    }
}

impl fmt::Debug for DomIcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DomIcon").field(&self.index()).finish()
    }
}
