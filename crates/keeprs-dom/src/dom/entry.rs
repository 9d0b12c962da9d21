use super::{DomGroup, DomIcon, DomState, NodeRef};
use crate::document::{Document, NodeId};
use crate::helpers::{
    self, CREATION_TIME_ELEMENT_NAME, KEY_ELEMENT_NAME, LAST_MODIFICATION_TIME_ELEMENT_NAME,
    PROTECTED_ATTRIBUTE, STRING_ELEMENT_NAME, VALUE_ELEMENT_NAME,
};
use crate::model::{Entry, Icon};
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// An entry element of a [`DomDatabase`](super::DomDatabase).
///
/// Field values are only ever read from the document on request; the
/// `Debug` output carries the identifier and never a value.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DomEntry {
    inner: NodeRef,
}

/// The `String` element holding the field `name`.
fn string_node(doc: &Document, entry: NodeId, name: &str) -> Option<NodeId> {
    doc.children_named(entry, STRING_ELEMENT_NAME)
        .find(|&string| helpers::element_content(doc, KEY_ELEMENT_NAME, string) == Some(name))
}

/// Write a field value, applying the database's protection policy.
pub(crate) fn write_property(state: &mut DomState, entry: NodeId, name: &str, value: &str) {
    let protect = state.should_protect(name);
    let doc = &mut state.doc;
    let string = match string_node(doc, entry, name) {
        Some(existing) => existing,
        None => {
            let created = doc.create_element(STRING_ELEMENT_NAME);
            helpers::set_element_content(doc, KEY_ELEMENT_NAME, created, name);
            // freshly created, cannot form a cycle
            let _ = doc.append_child(entry, created);
            created
        }
    };
    let value_node = helpers::set_element_content(doc, VALUE_ELEMENT_NAME, string, value);
    if protect {
        doc.set_attribute(value_node, PROTECTED_ATTRIBUTE, helpers::format_bool(true));
    }
}

impl DomEntry {
    pub(crate) fn new(inner: NodeRef) -> Self {
        Self { inner }
    }

    pub(crate) fn node_ref(&self) -> &NodeRef {
        &self.inner
    }

    /// Handle of the backing node.
    pub fn node(&self) -> NodeId {
        self.inner.node()
    }

    /// Whether the entry is reachable from the document root.
    pub fn is_attached(&self) -> bool {
        self.inner.read(|state, node| state.doc.is_attached(node))
    }
}

impl Entry for DomEntry {
    type Group = DomGroup;
    type Icon = DomIcon;

    fn uuid(&self) -> Option<Uuid> {
        self.inner.uuid()
    }

    fn parent(&self) -> Option<DomGroup> {
        self.inner.parent_group().map(DomGroup::new)
    }

    fn property(&self, name: &str) -> Option<String> {
        self.inner.read(|state, node| -> Option<String> {
            let string = string_node(&state.doc, node, name)?;
            helpers::element_content(&state.doc, VALUE_ELEMENT_NAME, string).map(str::to_string)
        })
    }

    fn set_property(&self, name: &str, value: &str) {
        self.inner.write(|state, node| {
            write_property(state, node, name, value);
            helpers::touch_element(&mut state.doc, LAST_MODIFICATION_TIME_ELEMENT_NAME, node);
        });
    }

    fn remove_property(&self, name: &str) -> bool {
        let Some(string) = self
            .inner
            .read(|state, node| string_node(&state.doc, node, name))
        else {
            return false;
        };
        self.inner.write(|state, node| {
            state.doc.remove(string);
            helpers::touch_element(&mut state.doc, LAST_MODIFICATION_TIME_ELEMENT_NAME, node);
        });
        true
    }

    fn property_names(&self) -> Vec<String> {
        self.inner.read(|state, node| {
            state
                .doc
                .children_named(node, STRING_ELEMENT_NAME)
                .filter_map(|string| helpers::element_content(&state.doc, KEY_ELEMENT_NAME, string))
                .map(str::to_string)
                .collect()
        })
    }

    fn is_protected(&self, name: &str) -> bool {
        self.inner.read(|state, node| {
            let flagged = string_node(&state.doc, node, name)
                .and_then(|string| state.doc.first_child_named(string, VALUE_ELEMENT_NAME))
                .and_then(|value| state.doc.attribute(value, PROTECTED_ATTRIBUTE))
                .is_some_and(helpers::parse_bool);
            flagged || state.should_protect(name)
        })
    }

    fn icon(&self) -> DomIcon {
        DomIcon::new(self.inner.icon_node())
    }

    fn set_icon(&self, icon: &DomIcon) {
        self.inner.set_icon_index(icon.index());
    }

    fn creation_time(&self) -> Option<DateTime<Utc>> {
        self.inner
            .content(CREATION_TIME_ELEMENT_NAME)
            .and_then(|text| helpers::parse_time(&text))
    }

    fn last_modification_time(&self) -> Option<DateTime<Utc>> {
        self.inner
            .content(LAST_MODIFICATION_TIME_ELEMENT_NAME)
            .and_then(|text| helpers::parse_time(&text))
    }
}

impl fmt::Debug for DomEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomEntry")
            .field("node", &self.node())
            .field("uuid", &self.uuid())
            .finish()
    }
}
