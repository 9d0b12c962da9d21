use super::{DomEntry, DomIcon, NodeRef};
use crate::error::{Error, Result};
use crate::helpers::{
    self, ENTRY_ELEMENT_NAME, GROUP_ELEMENT_NAME, LAST_MODIFICATION_TIME_ELEMENT_NAME,
    LOCATION_CHANGED_ELEMENT_NAME, NAME_ELEMENT_NAME, NOTES_ELEMENT_NAME,
};
use crate::model::{Group, Icon};
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// A group element of a [`DomDatabase`](super::DomDatabase).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DomGroup {
    inner: NodeRef,
}

impl DomGroup {
    pub(crate) fn new(inner: NodeRef) -> Self {
        Self { inner }
    }

    /// Handle of the backing node.
    pub fn node(&self) -> crate::document::NodeId {
        self.inner.node()
    }

    /// Whether the group is reachable from the document root.
    pub fn is_attached(&self) -> bool {
        self.inner.read(|state, node| state.doc.is_attached(node))
    }

    fn attach(&self, child: &NodeRef) -> Result<()> {
        if !self.inner.same_database(child) {
            return Err(Error::Hierarchy(
                "cannot move nodes between databases".into(),
            ));
        }
        self.inner.try_write(|state, node| -> Result<()> {
            state.doc.append_child(node, child.node())?;
            helpers::touch_element(&mut state.doc, LOCATION_CHANGED_ELEMENT_NAME, child.node());
            Ok(())
        })
    }

    fn detach(&self, child: &NodeRef) -> bool {
        if !self.inner.same_database(child) {
            return false;
        }
        let is_child = self
            .inner
            .read(|state, node| state.doc.parent(child.node()) == Some(node));
        if is_child {
            self.inner.write(|state, _| state.doc.remove(child.node()));
        }
        is_child
    }
}

impl Group for DomGroup {
    type Entry = DomEntry;
    type Icon = DomIcon;

    fn uuid(&self) -> Option<Uuid> {
        self.inner.uuid()
    }

    fn name(&self) -> String {
        self.inner.content(NAME_ELEMENT_NAME).unwrap_or_default()
    }

    fn set_name(&self, name: &str) {
        self.inner
            .set_stamped(NAME_ELEMENT_NAME, name, LAST_MODIFICATION_TIME_ELEMENT_NAME);
    }

    fn notes(&self) -> String {
        self.inner.content(NOTES_ELEMENT_NAME).unwrap_or_default()
    }

    fn set_notes(&self, notes: &str) {
        self.inner
            .set_stamped(NOTES_ELEMENT_NAME, notes, LAST_MODIFICATION_TIME_ELEMENT_NAME);
    }

    fn is_root(&self) -> bool {
        self.inner.read(|state, node| state.root_group == node)
    }

    fn is_recycle_bin(&self) -> bool {
        let recorded = self.inner.read(|state, _| state.recycle_bin_uuid());
        match (recorded, self.uuid()) {
            (Some(recorded), Some(own)) => !recorded.is_nil() && recorded == own,
            _ => false,
        }
    }

    fn parent(&self) -> Option<Self> {
        self.inner.parent_group().map(Self::new)
    }

    fn groups(&self) -> Vec<Self> {
        self.inner
            .children_named(GROUP_ELEMENT_NAME)
            .into_iter()
            .map(Self::new)
            .collect()
    }

    fn entries(&self) -> Vec<DomEntry> {
        self.inner
            .children_named(ENTRY_ELEMENT_NAME)
            .into_iter()
            .map(DomEntry::new)
            .collect()
    }

    fn add_group(&self, group: &Self) -> Result<()> {
        if group.is_root() {
            return Err(Error::Hierarchy("the root group cannot be moved".into()));
        }
        self.attach(&group.inner)
    }

    fn remove_group(&self, group: &Self) -> bool {
        self.detach(&group.inner)
    }

    fn add_entry(&self, entry: &DomEntry) -> Result<()> {
        self.attach(entry.node_ref())
    }

    fn remove_entry(&self, entry: &DomEntry) -> bool {
        self.detach(entry.node_ref())
    }

    fn icon(&self) -> DomIcon {
        DomIcon::new(self.inner.icon_node())
    }

    fn set_icon(&self, icon: &DomIcon) {
        self.inner.set_icon_index(icon.index());
    }

    fn last_modification_time(&self) -> Option<DateTime<Utc>> {
        self.inner
            .content(LAST_MODIFICATION_TIME_ELEMENT_NAME)
            .and_then(|text| helpers::parse_time(&text))
    }
}

impl fmt::Debug for DomGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomGroup")
            .field("node", &self.node())
            .field("name", &self.name())
            .finish()
    }
}
