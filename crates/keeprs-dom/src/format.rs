//! Stream formats turning bytes into a [`Document`] and back.
//!
//! Encryption and compression live in external formats implementing
//! [`StreamFormat`]. The crate ships [`XmlStreamFormat`], which reads and
//! writes the plain KeePass XML document.

use crate::document::{self, Document, DocumentError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};

/// Errors raised at the stream format boundary.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("decryption failed: wrong credentials or corrupt data")]
    Decryption,
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(String),
    #[error("malformed container: {0}")]
    MalformedContainer(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DocumentError> for FormatError {
    fn from(err: DocumentError) -> Self {
        FormatError::MalformedContainer(err.to_string())
    }
}

/// Key material handed to a stream format. Never printed.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    key: Vec<u8>,
}

impl Credentials {
    pub fn from_password(password: &str) -> Self {
        Self {
            key: password.as_bytes().to_vec(),
        }
    }

    pub fn from_bytes(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials").finish_non_exhaustive()
    }
}

/// Container format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatVersion {
    V3,
    V4,
}

impl FormatVersion {
    /// The newest version this crate knows about.
    pub fn latest() -> Self {
        FormatVersion::V4
    }
}

impl Default for FormatVersion {
    fn default() -> Self {
        Self::latest()
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatVersion::V3 => write!(f, "3.1"),
            FormatVersion::V4 => write!(f, "4.0"),
        }
    }
}

/// Settings a format was loaded with, reused when saving.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default)]
    pub version: FormatVersion,
}

impl StreamConfig {
    pub fn new(version: FormatVersion) -> Self {
        Self { version }
    }
}

/// A codec between raw bytes and a populated [`Document`].
pub trait StreamFormat: fmt::Debug {
    /// Settings this format writes with.
    fn config(&self) -> &StreamConfig;

    /// Fill `document` from `input`.
    fn load(
        &self,
        document: &mut Document,
        credentials: &Credentials,
        input: &mut dyn Read,
    ) -> Result<(), FormatError>;

    /// Write `document` to `output`.
    fn save(
        &self,
        document: &Document,
        credentials: &Credentials,
        output: &mut dyn Write,
    ) -> Result<(), FormatError>;
}

/// Unencrypted KeePass XML. Credentials are accepted and ignored.
#[derive(Debug, Clone, Default)]
pub struct XmlStreamFormat {
    config: StreamConfig,
}

impl XmlStreamFormat {
    pub fn new(config: StreamConfig) -> Self {
        Self { config }
    }
}

impl StreamFormat for XmlStreamFormat {
    fn config(&self) -> &StreamConfig {
        &self.config
    }

    fn load(
        &self,
        document: &mut Document,
        _credentials: &Credentials,
        input: &mut dyn Read,
    ) -> Result<(), FormatError> {
        let mut bytes: Vec<u8> = Vec::new();
        input.read_to_end(&mut bytes)?;
        *document = document::parse(&bytes)?;
        tracing::debug!(bytes = bytes.len(), "Loaded plain XML document");
        Ok(())
    }

    fn save(
        &self,
        document: &Document,
        _credentials: &Credentials,
        output: &mut dyn Write,
    ) -> Result<(), FormatError> {
        let mut bytes: Vec<u8> = Vec::new();
        document::write(document, &mut bytes)?;
        output.write_all(&bytes)?;
        output.flush()?;
        tracing::debug!(bytes = bytes.len(), version = %self.config.version, "Saved plain XML document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_hides_key() {
        let creds = Credentials::from_password("hunter2");
        assert!(!format!("{creds:?}").contains("hunter2"));
        assert_eq!(creds.as_bytes(), b"hunter2");
    }

    #[test]
    fn default_config_is_latest_version() {
        assert_eq!(StreamConfig::default().version, FormatVersion::V4);
        assert_eq!(FormatVersion::latest(), FormatVersion::V4);
    }

    #[test]
    fn malformed_xml_is_a_container_error() {
        let format = XmlStreamFormat::default();
        let mut doc = Document::new();
        let err = format
            .load(&mut doc, &Credentials::default(), &mut &b"<KeePassFile><Meta>"[..])
            .unwrap_err();
        assert!(matches!(err, FormatError::MalformedContainer(_)));
    }
}
