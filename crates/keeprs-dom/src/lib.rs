//! Document-backed KeePass database model for keeprs.
//!
//! A [`DomDatabase`] holds no copy of its data: groups, entries and icons are
//! thin views over the nodes of a mutable [`Document`], and every read or
//! write goes straight to that document. Bytes are turned into a document by
//! a pluggable [`StreamFormat`].

pub mod config;
pub mod document;
pub mod dom;
pub mod error;
pub mod format;
pub mod helpers;
pub mod model;
pub mod search;

pub use config::{ConfigError, DatabaseConfig};
pub use document::{Document, DocumentError, NodeId};
pub use dom::{DomDatabase, DomEntry, DomGroup, DomIcon};
pub use error::{Error, Result};
pub use format::{
    Credentials, FormatError, FormatVersion, StreamConfig, StreamFormat, XmlStreamFormat,
};
pub use model::{Database, Entry, Group, Icon, PrintVisitor, Visitor};
pub use search::{search_entries, SearchHit};
