//! Database façade over a [`Document`].

use super::entry::write_property;
use super::{DomEntry, DomGroup, DomIcon, DomState, NodeRef, SharedState};
use crate::config::DatabaseConfig;
use crate::document::{Document, NodeId};
use crate::error::{Error, Result};
use crate::format::{Credentials, StreamFormat, XmlStreamFormat};
use crate::helpers::{
    self, DATABASE_DESCRIPTION_CHANGED_ELEMENT_NAME, DATABASE_DESCRIPTION_ELEMENT_NAME,
    DATABASE_NAME_CHANGED_ELEMENT_NAME, DATABASE_NAME_ELEMENT_NAME, ENTRY_ELEMENT_NAME,
    GENERATOR_ELEMENT_NAME, GROUP_ELEMENT_NAME, ICON_ELEMENT_NAME, MEMORY_PROTECTION_PREFIX,
    NAME_ELEMENT_NAME, NOTES_ELEMENT_NAME, RECYCLE_BIN_CHANGED_ELEMENT_NAME,
    RECYCLE_BIN_ENABLED_ELEMENT_NAME, RECYCLE_BIN_UUID_ELEMENT_NAME,
};
use crate::model::{Database, NOTES, PASSWORD, STANDARD_PROPERTIES, TITLE, URL, USER_NAME};
use std::cell::RefCell;
use std::fmt;
use std::io::{Read, Write};
use std::rc::Rc;
use uuid::Uuid;

pub const ROOT_ELEMENT_NAME: &str = "KeePassFile";
pub const META_PATH: &str = "/KeePassFile/Meta";
pub const ROOT_GROUP_PATH: &str = "/KeePassFile/Root/Group";

/// Name given to the root group of new databases.
const ROOT_GROUP_NAME: &str = "Root";

/// A password database whose only storage is its document.
pub struct DomDatabase {
    state: SharedState,
}

impl DomDatabase {
    /// Create an empty database with the default configuration.
    pub fn new() -> Self {
        Self::with_config(DatabaseConfig::default())
    }

    /// Create an empty database: a root group and the metadata a loaded
    /// database would have.
    pub fn with_config(config: DatabaseConfig) -> Self {
        let (doc, root_group, meta) = empty_document(&config);
        Self::from_state(DomState {
            doc,
            root_group,
            meta,
            dirty: false,
            stream_format: None,
            config,
        })
    }

    /// Load a plain XML database.
    pub fn load(credentials: &Credentials, input: &mut dyn Read) -> Result<Self> {
        Self::load_with(
            Rc::new(XmlStreamFormat::default()),
            DatabaseConfig::default(),
            credentials,
            input,
        )
    }

    /// Load through `format`, which is remembered for later saves.
    pub fn load_with(
        format: Rc<dyn StreamFormat>,
        config: DatabaseConfig,
        credentials: &Credentials,
        input: &mut dyn Read,
    ) -> Result<Self> {
        let mut doc = Document::new();
        format.load(&mut doc, credentials, input)?;
        let db = Self::from_document(doc, config)?;
        db.state.borrow_mut().stream_format = Some(format);
        tracing::info!("Loaded database {:?}", db.name().unwrap_or_default());
        Ok(db)
    }

    /// Wrap an already populated document.
    ///
    /// Fails when the metadata or the root group cannot be found.
    pub fn from_document(doc: Document, config: DatabaseConfig) -> Result<Self> {
        let meta = resolve(&doc, META_PATH)?;
        let root_group = resolve(&doc, ROOT_GROUP_PATH)?;
        Ok(Self::from_state(DomState {
            doc,
            root_group,
            meta,
            dirty: false,
            stream_format: None,
            config,
        }))
    }

    fn from_state(state: DomState) -> Self {
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    fn node(&self, node: NodeId) -> NodeRef {
        NodeRef::new(Rc::clone(&self.state), node)
    }

    fn meta(&self) -> NodeRef {
        let meta = self.state.borrow().meta;
        self.node(meta)
    }

    /// Create a detached element with the fields every group or entry has.
    fn create_item(&self, name: &str) -> NodeId {
        let mut state = self.state.borrow_mut();
        let node = state.doc.create_element(name);
        helpers::init_node(&mut state.doc, node);
        node
    }

    pub fn config(&self) -> DatabaseConfig {
        self.state.borrow().config.clone()
    }

    /// Read-only access to the backing document.
    pub fn with_document<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(&self.state.borrow().doc)
    }

    /// Serialize the backing document as XML, e.g. for diagnostics.
    pub fn to_xml(&self) -> Result<String> {
        let mut bytes: Vec<u8> = Vec::new();
        self.with_document(|doc| crate::document::write(doc, &mut bytes))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Default for DomDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DomDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomDatabase")
            .field("name", &self.name())
            .field("dirty", &self.is_dirty())
            .finish_non_exhaustive()
    }
}

fn resolve(doc: &Document, path: &'static str) -> Result<NodeId> {
    let found = doc
        .document_element()
        .and_then(|top| doc.find_first(top, path));
    found.ok_or_else(|| {
        tracing::error!("Document has no {path}");
        Error::MissingNode { path }
    })
}

fn empty_document(config: &DatabaseConfig) -> (Document, NodeId, NodeId) {
    let mut doc = Document::new();
    let top = doc.create_element(ROOT_ELEMENT_NAME);
    doc.set_document_element(top);

    let meta = helpers::ensure_element(&mut doc, "Meta", top);
    helpers::set_element_content(&mut doc, GENERATOR_ELEMENT_NAME, meta, &config.generator);
    let name = config.name.as_deref().unwrap_or_default();
    helpers::set_element_content(&mut doc, DATABASE_NAME_ELEMENT_NAME, meta, name);
    helpers::touch_element(&mut doc, DATABASE_NAME_CHANGED_ELEMENT_NAME, meta);
    let description = config.description.as_deref().unwrap_or_default();
    helpers::set_element_content(&mut doc, DATABASE_DESCRIPTION_ELEMENT_NAME, meta, description);
    helpers::touch_element(&mut doc, DATABASE_DESCRIPTION_CHANGED_ELEMENT_NAME, meta);
    for (field, protect) in [
        (TITLE, false),
        (USER_NAME, false),
        (PASSWORD, true),
        (URL, false),
        (NOTES, false),
    ] {
        helpers::set_element_content(
            &mut doc,
            &format!("{MEMORY_PROTECTION_PREFIX}{field}"),
            meta,
            helpers::format_bool(protect),
        );
    }
    helpers::set_element_content(
        &mut doc,
        RECYCLE_BIN_ENABLED_ELEMENT_NAME,
        meta,
        helpers::format_bool(config.recycle_bin_enabled),
    );
    helpers::set_element_content(
        &mut doc,
        RECYCLE_BIN_UUID_ELEMENT_NAME,
        meta,
        &helpers::base64_from_uuid(Uuid::nil()),
    );
    helpers::touch_element(&mut doc, RECYCLE_BIN_CHANGED_ELEMENT_NAME, meta);

    let root_group = helpers::ensure_element(&mut doc, "Root/Group", top);
    helpers::init_node(&mut doc, root_group);
    helpers::set_element_content(&mut doc, NAME_ELEMENT_NAME, root_group, ROOT_GROUP_NAME);
    helpers::set_element_content(&mut doc, NOTES_ELEMENT_NAME, root_group, "");

    (doc, root_group, meta)
}

impl Database for DomDatabase {
    type Group = DomGroup;
    type Entry = DomEntry;
    type Icon = DomIcon;

    fn root_group(&self) -> DomGroup {
        let root = self.state.borrow().root_group;
        DomGroup::new(self.node(root))
    }

    fn new_group(&self) -> DomGroup {
        let node = self.create_item(GROUP_ELEMENT_NAME);
        {
            let mut state = self.state.borrow_mut();
            helpers::set_element_content(&mut state.doc, NAME_ELEMENT_NAME, node, "");
            helpers::set_element_content(&mut state.doc, NOTES_ELEMENT_NAME, node, "");
        }
        DomGroup::new(self.node(node))
    }

    fn new_entry(&self) -> DomEntry {
        let node = self.create_item(ENTRY_ELEMENT_NAME);
        {
            let mut state = self.state.borrow_mut();
            for field in STANDARD_PROPERTIES {
                write_property(&mut state, node, field, "");
            }
        }
        DomEntry::new(self.node(node))
    }

    fn new_icon(&self) -> DomIcon {
        self.new_icon_with_index(0)
    }

    fn new_icon_with_index(&self, index: i32) -> DomIcon {
        let node = {
            let mut state = self.state.borrow_mut();
            let node = state.doc.create_element(ICON_ELEMENT_NAME);
            state.doc.set_text(node, index.to_string());
            node
        };
        DomIcon::new(self.node(node))
    }

    fn name(&self) -> Option<String> {
        self.meta().content(DATABASE_NAME_ELEMENT_NAME)
    }

    fn set_name(&self, name: &str) {
        self.meta().set_stamped(
            DATABASE_NAME_ELEMENT_NAME,
            name,
            DATABASE_NAME_CHANGED_ELEMENT_NAME,
        );
    }

    fn description(&self) -> Option<String> {
        self.meta().content(DATABASE_DESCRIPTION_ELEMENT_NAME)
    }

    fn set_description(&self, description: &str) {
        self.meta().set_stamped(
            DATABASE_DESCRIPTION_ELEMENT_NAME,
            description,
            DATABASE_DESCRIPTION_CHANGED_ELEMENT_NAME,
        );
    }

    fn is_dirty(&self) -> bool {
        self.state.borrow().dirty
    }

    fn set_dirty(&self, dirty: bool) {
        self.state.borrow_mut().dirty = dirty;
    }

    fn should_protect(&self, field: &str) -> bool {
        self.state.borrow().should_protect(field)
    }

    fn is_recycle_bin_enabled(&self) -> bool {
        self.state
            .borrow()
            .meta_content(RECYCLE_BIN_ENABLED_ELEMENT_NAME)
            .is_some_and(helpers::parse_bool)
    }

    fn enable_recycle_bin(&self, enable: bool) {
        self.meta().write(|state, meta| {
            helpers::set_element_content(
                &mut state.doc,
                RECYCLE_BIN_ENABLED_ELEMENT_NAME,
                meta,
                helpers::format_bool(enable),
            );
        });
    }

    fn recycle_bin_uuid(&self) -> Option<Uuid> {
        self.state.borrow().recycle_bin_uuid()
    }

    fn set_recycle_bin_uuid(&self, uuid: Uuid) {
        self.meta().set_stamped(
            RECYCLE_BIN_UUID_ELEMENT_NAME,
            &helpers::base64_from_uuid(uuid),
            RECYCLE_BIN_CHANGED_ELEMENT_NAME,
        );
    }

    fn stream_format(&self) -> Rc<dyn StreamFormat> {
        let mut state = self.state.borrow_mut();
        if let Some(format) = &state.stream_format {
            return Rc::clone(format);
        }
        let format: Rc<dyn StreamFormat> =
            Rc::new(XmlStreamFormat::new(state.config.stream_config()));
        tracing::debug!(version = %format.config().version, "No loaded format, using default");
        state.stream_format = Some(Rc::clone(&format));
        format
    }

    fn save_with(
        &self,
        format: &dyn StreamFormat,
        credentials: &Credentials,
        output: &mut dyn Write,
    ) -> Result<()> {
        self.meta().update(|state, meta| {
            let generator = state.config.generator.clone();
            helpers::set_element_content(&mut state.doc, GENERATOR_ELEMENT_NAME, meta, &generator);
        });
        self.with_document(|doc| format.save(doc, credentials, output))?;
        self.set_dirty(false);
        tracing::info!(version = %format.config().version, "Saved database");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entry, Group};

    #[test]
    fn empty_database_resolves_through_paths() {
        let db = DomDatabase::new();
        let (doc, _, _) = empty_document(&DatabaseConfig::default());
        assert!(resolve(&doc, META_PATH).is_ok());
        assert!(resolve(&doc, ROOT_GROUP_PATH).is_ok());
        assert!(db.root_group().is_root());
        assert_eq!(db.root_group().name(), ROOT_GROUP_NAME);
        assert!(!db.is_dirty());
    }

    #[test]
    fn missing_meta_is_structural() {
        let doc = Document::with_root(ROOT_ELEMENT_NAME);
        let err = DomDatabase::from_document(doc, DatabaseConfig::default()).unwrap_err();
        assert!(matches!(err, Error::MissingNode { path } if path == META_PATH));
    }

    #[test]
    fn new_entry_password_follows_policy() {
        let db = DomDatabase::new();
        let entry = db.new_entry();
        assert!(entry.is_protected(PASSWORD));
        assert!(!entry.is_protected(TITLE));
        assert_eq!(entry.property_names().len(), STANDARD_PROPERTIES.len());
        assert!(!db.is_dirty());
    }

    #[test]
    fn save_stamps_generator() {
        let config = DatabaseConfig {
            generator: "unit-test".to_string(),
            ..DatabaseConfig::default()
        };
        let db = DomDatabase::with_config(config);
        let meta = db.meta();
        meta.write(|state, node| {
            helpers::set_element_content(&mut state.doc, GENERATOR_ELEMENT_NAME, node, "other");
        });
        let mut out: Vec<u8> = Vec::new();
        db.save(&Credentials::default(), &mut out).unwrap();
        assert_eq!(meta.content(GENERATOR_ELEMENT_NAME).as_deref(), Some("unit-test"));
        assert!(!db.is_dirty());
    }

    #[test]
    fn detached_group_is_not_attached() {
        let db = DomDatabase::new();
        let group = db.new_group();
        assert!(!group.is_attached());
        assert!(group.parent().is_none());
        db.root_group().add_group(&group).unwrap();
        assert!(group.is_attached());
    }
}
