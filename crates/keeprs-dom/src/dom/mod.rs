//! Database model backed by a [`Document`].
//!
//! Every wrapper is a [`NodeId`] plus a shared handle on the database state.
//! Nothing is cached: each accessor reads or writes the document directly,
//! so wrappers can be dropped and recreated at any time. Two wrappers are
//! equal when they point at the same node of the same database.
//!
//! The state is shared through `Rc<RefCell<_>>`, so wrappers are neither
//! `Send` nor `Sync` and the document is only ever touched from one thread.

mod database;
mod entry;
mod group;
mod icon;

pub use database::DomDatabase;
pub use entry::DomEntry;
pub use group::DomGroup;
pub use icon::DomIcon;

use crate::config::DatabaseConfig;
use crate::document::{Document, NodeId};
use crate::format::StreamFormat;
use crate::helpers::{self, MEMORY_PROTECTION_PREFIX, RECYCLE_BIN_UUID_ELEMENT_NAME};
use std::cell::RefCell;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use uuid::Uuid;

pub(crate) struct DomState {
    pub(crate) doc: Document,
    pub(crate) root_group: NodeId,
    pub(crate) meta: NodeId,
    pub(crate) dirty: bool,
    pub(crate) stream_format: Option<Rc<dyn StreamFormat>>,
    pub(crate) config: DatabaseConfig,
}

impl DomState {
    pub(crate) fn meta_content(&self, path: &str) -> Option<&str> {
        helpers::element_content(&self.doc, path, self.meta)
    }

    pub(crate) fn should_protect(&self, field: &str) -> bool {
        self.meta_content(&format!("{MEMORY_PROTECTION_PREFIX}{field}"))
            .is_some_and(helpers::parse_bool)
    }

    pub(crate) fn recycle_bin_uuid(&self) -> Option<Uuid> {
        self.meta_content(RECYCLE_BIN_UUID_ELEMENT_NAME)
            .and_then(helpers::uuid_from_base64)
    }
}

pub(crate) type SharedState = Rc<RefCell<DomState>>;

/// A node of a particular database.
#[derive(Clone)]
pub(crate) struct NodeRef {
    state: SharedState,
    node: NodeId,
}

impl NodeRef {
    pub(crate) fn new(state: SharedState, node: NodeId) -> Self {
        Self { state, node }
    }

    pub(crate) fn node(&self) -> NodeId {
        self.node
    }

    /// Another node of the same database.
    pub(crate) fn with_node(&self, node: NodeId) -> Self {
        Self::new(Rc::clone(&self.state), node)
    }

    pub(crate) fn same_database(&self, other: &NodeRef) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&DomState, NodeId) -> R) -> R {
        f(&self.state.borrow(), self.node)
    }

    /// Mutate the document without touching the dirty flag.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut DomState, NodeId) -> R) -> R {
        f(&mut self.state.borrow_mut(), self.node)
    }

    /// Mutate the document and mark the database dirty.
    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut DomState, NodeId) -> R) -> R {
        self.update(|state, node| {
            let result = f(state, node);
            state.dirty = true;
            result
        })
    }

    /// Like [`NodeRef::write`], but the database is only marked dirty when
    /// `f` succeeds.
    pub(crate) fn try_write<T, E>(
        &self,
        f: impl FnOnce(&mut DomState, NodeId) -> Result<T, E>,
    ) -> Result<T, E> {
        self.update(|state, node| {
            let result = f(state, node);
            if result.is_ok() {
                state.dirty = true;
            }
            result
        })
    }

    pub(crate) fn content(&self, path: &str) -> Option<String> {
        self.read(|state, node| helpers::element_content(&state.doc, path, node).map(str::to_string))
    }

    /// Set a field and re-stamp its paired timestamp.
    pub(crate) fn set_stamped(&self, path: &str, value: &str, stamp: &str) {
        self.write(|state, node| {
            helpers::set_element_content(&mut state.doc, path, node, value);
            helpers::touch_element(&mut state.doc, stamp, node);
        });
    }

    pub(crate) fn uuid(&self) -> Option<Uuid> {
        let text = self.content(helpers::UUID_ELEMENT_NAME)?;
        let uuid = helpers::uuid_from_base64(&text);
        if uuid.is_none() {
            tracing::debug!("Ignoring undecodable UUID text: {text:?}");
        }
        uuid
    }

    /// The parent node when it is a group.
    pub(crate) fn parent_group(&self) -> Option<NodeRef> {
        self.read(|state, node| {
            state
                .doc
                .parent(node)
                .filter(|&parent| state.doc.name(parent) == helpers::GROUP_ELEMENT_NAME)
        })
        .map(|parent| self.with_node(parent))
    }

    /// Direct children with the given element name.
    pub(crate) fn children_named(&self, name: &str) -> Vec<NodeRef> {
        self.read(|state, node| state.doc.children_named(node, name).collect::<Vec<_>>())
            .into_iter()
            .map(|child| self.with_node(child))
            .collect()
    }

    /// The `IconID` child, created if the node has none.
    pub(crate) fn icon_node(&self) -> NodeRef {
        let icon = self.update(|state, node| {
            helpers::ensure_element(&mut state.doc, helpers::ICON_ELEMENT_NAME, node)
        });
        self.with_node(icon)
    }

    /// Copy an icon index into this node's own `IconID`.
    pub(crate) fn set_icon_index(&self, index: i32) {
        self.write(|state, node| {
            helpers::set_element_content(
                &mut state.doc,
                helpers::ICON_ELEMENT_NAME,
                node,
                &index.to_string(),
            );
        });
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.same_database(other) && self.node == other.node
    }
}

impl Eq for NodeRef {}

impl Hash for NodeRef {
    fn hash<H: Hasher>(&self, hasher: &mut H) {
        Rc::as_ptr(&self.state).hash(hasher);
        self.node.hash(hasher);
    }
}
