//! Backend-independent database model.
//!
//! A backend provides a matched family of [`Database`], [`Group`], [`Entry`]
//! and [`Icon`] types. The associated types tie the family together so a
//! group from one backend can never be handed to another. Policy shared by
//! every backend (recycle bin handling, lookups, traversal, saving with the
//! remembered format) lives in the default methods of [`Database`].

use crate::error::{Error, Result};
use crate::format::{Credentials, StreamFormat};
use chrono::{DateTime, Utc};
use std::fmt;
use std::io::Write;
use std::rc::Rc;
use uuid::Uuid;

pub const TITLE: &str = "Title";
pub const USER_NAME: &str = "UserName";
pub const PASSWORD: &str = "Password";
pub const URL: &str = "URL";
pub const NOTES: &str = "Notes";

/// Fields every entry carries.
pub const STANDARD_PROPERTIES: [&str; 5] = [TITLE, USER_NAME, PASSWORD, URL, NOTES];

pub const RECYCLE_BIN_NAME: &str = "Recycle Bin";
/// Trash can in the standard icon set.
pub const RECYCLE_BIN_ICON: i32 = 43;

/// Index into the standard icon set.
pub trait Icon: Clone + PartialEq + fmt::Debug {
    fn index(&self) -> i32;
    fn set_index(&self, index: i32);
}

/// A password entry.
pub trait Entry: Clone + PartialEq + fmt::Debug {
    type Group;
    type Icon: Icon;

    /// `None` when the stored identifier is missing or undecodable.
    fn uuid(&self) -> Option<Uuid>;
    fn parent(&self) -> Option<Self::Group>;

    fn property(&self, name: &str) -> Option<String>;
    /// Set a field, creating it if needed. Fields the database protects are
    /// marked protected.
    fn set_property(&self, name: &str, value: &str);
    fn remove_property(&self, name: &str) -> bool;
    fn property_names(&self) -> Vec<String>;
    fn is_protected(&self, name: &str) -> bool;

    fn icon(&self) -> Self::Icon;
    /// Copy the index of `icon` into this entry's own icon.
    fn set_icon(&self, icon: &Self::Icon);

    fn creation_time(&self) -> Option<DateTime<Utc>>;
    fn last_modification_time(&self) -> Option<DateTime<Utc>>;

    fn title(&self) -> String {
        self.property(TITLE).unwrap_or_default()
    }

    fn set_title(&self, title: &str) {
        self.set_property(TITLE, title);
    }

    fn username(&self) -> String {
        self.property(USER_NAME).unwrap_or_default()
    }

    fn set_username(&self, username: &str) {
        self.set_property(USER_NAME, username);
    }

    fn password(&self) -> String {
        self.property(PASSWORD).unwrap_or_default()
    }

    fn set_password(&self, password: &str) {
        self.set_property(PASSWORD, password);
    }

    fn url(&self) -> String {
        self.property(URL).unwrap_or_default()
    }

    fn set_url(&self, url: &str) {
        self.set_property(URL, url);
    }

    fn notes(&self) -> String {
        self.property(NOTES).unwrap_or_default()
    }

    fn set_notes(&self, notes: &str) {
        self.set_property(NOTES, notes);
    }

    /// Case-insensitive substring match on title, username, URL and notes.
    /// An empty `text` matches every entry, even one without those fields.
    fn match_text(&self, text: &str) -> bool {
        if text.is_empty() {
            return true;
        }
        let needle = text.to_lowercase();
        [TITLE, USER_NAME, URL, NOTES].iter().any(|name| {
            self.property(name)
                .is_some_and(|value| value.to_lowercase().contains(&needle))
        })
    }
}

/// A folder of entries and sub-groups.
pub trait Group: Clone + PartialEq + fmt::Debug {
    type Entry: Entry;
    type Icon: Icon;

    fn uuid(&self) -> Option<Uuid>;
    fn name(&self) -> String;
    fn set_name(&self, name: &str);
    fn notes(&self) -> String;
    fn set_notes(&self, notes: &str);

    fn is_root(&self) -> bool;
    fn is_recycle_bin(&self) -> bool;
    fn parent(&self) -> Option<Self>;

    /// Child groups, re-read from the backing store on every call.
    fn groups(&self) -> Vec<Self>;
    /// Child entries, re-read from the backing store on every call.
    fn entries(&self) -> Vec<Self::Entry>;

    /// Attach `group` as the last child, moving it from its old parent.
    fn add_group(&self, group: &Self) -> Result<()>;
    /// Detach a direct child. Returns whether it was a child.
    fn remove_group(&self, group: &Self) -> bool;
    /// Attach `entry` as the last entry, moving it from its old parent.
    fn add_entry(&self, entry: &Self::Entry) -> Result<()>;
    fn remove_entry(&self, entry: &Self::Entry) -> bool;

    fn icon(&self) -> Self::Icon;
    fn set_icon(&self, icon: &Self::Icon);

    fn last_modification_time(&self) -> Option<DateTime<Utc>>;

    /// Names from the root down to this group, joined by `/`.
    fn path(&self) -> String {
        let mut names = vec![self.name()];
        let mut current = self.parent();
        while let Some(group) = current {
            names.push(group.name());
            current = group.parent();
        }
        names.reverse();
        names.join("/")
    }

    /// Search the subtree below this group, excluding the group itself.
    fn find_group(&self, uuid: Uuid) -> Option<Self> {
        for child in self.groups() {
            if child.uuid() == Some(uuid) {
                return Some(child);
            }
            if let Some(found) = child.find_group(uuid) {
                return Some(found);
            }
        }
        None
    }

    /// Whether `other` lies strictly below this group.
    fn contains_group(&self, other: &Self) -> bool {
        let mut current = other.parent();
        while let Some(group) = current {
            if &group == self {
                return true;
            }
            current = group.parent();
        }
        false
    }
}

/// Callbacks for [`Database::visit`].
pub trait Visitor<G, E> {
    fn start_visit(&mut self, _group: &G) {}
    fn end_visit(&mut self, _group: &G) {}
    fn visit_entry(&mut self, _entry: &E) {}
}

/// Renders the tree as indented text, one group or entry per line.
#[derive(Debug, Default)]
pub struct PrintVisitor {
    depth: usize,
    output: String,
}

impl PrintVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.output.push_str("  ");
        }
        self.output.push_str(text);
        self.output.push('\n');
    }
}

impl<G: Group, E: Entry> Visitor<G, E> for PrintVisitor {
    fn start_visit(&mut self, group: &G) {
        self.line(&format!("{}/", group.name()));
        self.depth += 1;
    }

    fn end_visit(&mut self, _group: &G) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn visit_entry(&mut self, entry: &E) {
        self.line(&entry.title());
    }
}

/// A password database.
pub trait Database {
    type Group: Group<Entry = Self::Entry, Icon = Self::Icon>;
    type Entry: Entry<Group = Self::Group, Icon = Self::Icon>;
    type Icon: Icon;

    fn root_group(&self) -> Self::Group;

    /// A detached group, not part of the tree until added to a parent.
    fn new_group(&self) -> Self::Group;
    /// A detached entry, not part of the tree until added to a group.
    fn new_entry(&self) -> Self::Entry;
    fn new_icon(&self) -> Self::Icon;

    /// A detached icon. Like the other factories it leaves the dirty flag
    /// alone.
    fn new_icon_with_index(&self, index: i32) -> Self::Icon {
        let dirty = self.is_dirty();
        let icon = self.new_icon();
        icon.set_index(index);
        self.set_dirty(dirty);
        icon
    }

    fn name(&self) -> Option<String>;
    fn set_name(&self, name: &str);
    fn description(&self) -> Option<String>;
    fn set_description(&self, description: &str);

    fn is_dirty(&self) -> bool;
    fn set_dirty(&self, dirty: bool);

    /// Whether the metadata asks for `field` to be protected. `false` when
    /// no policy is recorded.
    fn should_protect(&self, field: &str) -> bool;

    fn is_recycle_bin_enabled(&self) -> bool;
    fn enable_recycle_bin(&self, enable: bool);
    /// Identifier recorded in the metadata, which may be nil or stale.
    fn recycle_bin_uuid(&self) -> Option<Uuid>;
    /// Record `uuid` as the recycle bin and stamp the change time.
    fn set_recycle_bin_uuid(&self, uuid: Uuid);

    /// Format to save with: the one the database was loaded with, or the
    /// configured default for databases created from scratch.
    fn stream_format(&self) -> Rc<dyn StreamFormat>;

    /// Save with an explicit format and clear the dirty flag.
    fn save_with(
        &self,
        format: &dyn StreamFormat,
        credentials: &Credentials,
        output: &mut dyn Write,
    ) -> Result<()>;

    /// Save with the format returned by [`Database::stream_format`].
    fn save(&self, credentials: &Credentials, output: &mut dyn Write) -> Result<()> {
        let format = self.stream_format();
        self.save_with(format.as_ref(), credentials, output)
    }

    /// The recorded recycle bin, if it still exists in the tree.
    fn existing_recycle_bin(&self) -> Option<Self::Group> {
        let uuid = self.recycle_bin_uuid().filter(|uuid| !uuid.is_nil())?;
        let found = self.root_group().find_group(uuid);
        if found.is_none() {
            tracing::warn!(%uuid, "Recycle bin group not found, treating reference as stale");
        }
        found
    }

    /// The recycle bin, created under the root group when it is enabled but
    /// missing.
    ///
    /// A recorded bin that still exists is returned even when the feature has
    /// since been disabled; the enabled flag only gates creation.
    fn recycle_bin(&self) -> Option<Self::Group> {
        if let Some(bin) = self.existing_recycle_bin() {
            return Some(bin);
        }
        if !self.is_recycle_bin_enabled() {
            return None;
        }

        let bin = self.new_group();
        bin.set_name(RECYCLE_BIN_NAME);
        bin.set_icon(&self.new_icon_with_index(RECYCLE_BIN_ICON));
        if let Err(err) = self.root_group().add_group(&bin) {
            tracing::error!("Failed to attach recycle bin: {err}");
            return None;
        }
        if let Some(uuid) = bin.uuid() {
            self.set_recycle_bin_uuid(uuid);
            tracing::info!(%uuid, "Created recycle bin");
        }
        Some(bin)
    }

    /// The root group or any group below it with this identifier.
    fn find_group(&self, uuid: Uuid) -> Option<Self::Group> {
        let root = self.root_group();
        if root.uuid() == Some(uuid) {
            return Some(root);
        }
        root.find_group(uuid)
    }

    fn find_entry(&self, uuid: Uuid) -> Option<Self::Entry> {
        self.find_entries_matching(|entry| entry.uuid() == Some(uuid))
            .into_iter()
            .next()
    }

    /// Entries whose standard fields contain `text`, ignoring case. An
    /// empty string matches every entry.
    fn find_entries(&self, text: &str) -> Vec<Self::Entry> {
        self.find_entries_matching(|entry| entry.match_text(text))
    }

    /// Entries anywhere in the tree accepted by `matcher`, in visiting order.
    fn find_entries_matching<F>(&self, matcher: F) -> Vec<Self::Entry>
    where
        F: Fn(&Self::Entry) -> bool,
    {
        let mut found = Vec::new();
        let mut pending = vec![self.root_group()];
        while let Some(group) = pending.pop() {
            found.extend(group.entries().into_iter().filter(|entry| matcher(entry)));
            pending.extend(group.groups().into_iter().rev());
        }
        found
    }

    /// Walk the tree depth first from the root, entries before sub-groups.
    fn visit<V>(&self, visitor: &mut V)
    where
        V: Visitor<Self::Group, Self::Entry>,
    {
        fn walk<G, V>(group: &G, visitor: &mut V)
        where
            G: Group,
            V: Visitor<G, G::Entry>,
        {
            visitor.start_visit(group);
            for entry in group.entries() {
                visitor.visit_entry(&entry);
            }
            for child in group.groups() {
                walk(&child, visitor);
            }
            visitor.end_visit(group);
        }

        walk(&self.root_group(), visitor);
    }

    /// Move an entry to the recycle bin, or remove it for good when it is
    /// already there or the bin is disabled.
    fn delete_entry(&self, entry: &Self::Entry) -> Result<()> {
        let Some(parent) = entry.parent() else {
            return Ok(());
        };
        if self.is_recycle_bin_enabled() {
            if let Some(bin) = self.recycle_bin() {
                if parent != bin && !bin.contains_group(&parent) {
                    return bin.add_entry(entry);
                }
            }
        }
        parent.remove_entry(entry);
        Ok(())
    }

    /// Move a group to the recycle bin, or remove it for good when it is
    /// already there, holds the bin, or the bin is disabled. The root group
    /// cannot be deleted.
    fn delete_group(&self, group: &Self::Group) -> Result<()> {
        if group.is_root() {
            return Err(Error::Hierarchy("the root group cannot be deleted".into()));
        }
        let Some(parent) = group.parent() else {
            return Ok(());
        };
        if self.is_recycle_bin_enabled() {
            if let Some(bin) = self.recycle_bin() {
                if &bin != group && !bin.contains_group(group) && !group.contains_group(&bin) {
                    return bin.add_group(group);
                }
            }
        }
        parent.remove_group(group);
        Ok(())
    }

    /// Permanently remove everything inside the recycle bin.
    fn empty_recycle_bin(&self) {
        let Some(bin) = self.existing_recycle_bin() else {
            return;
        };
        for group in bin.groups() {
            bin.remove_group(&group);
        }
        for entry in bin.entries() {
            bin.remove_entry(&entry);
        }
    }
}
