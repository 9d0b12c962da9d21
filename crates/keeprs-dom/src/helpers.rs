//! Stateless helpers for reading and writing fields of the document.

use crate::document::{Document, NodeId};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashSet;
use uuid::Uuid;

pub const GROUP_ELEMENT_NAME: &str = "Group";
pub const ENTRY_ELEMENT_NAME: &str = "Entry";
pub const ICON_ELEMENT_NAME: &str = "IconID";
pub const UUID_ELEMENT_NAME: &str = "UUID";
pub const NAME_ELEMENT_NAME: &str = "Name";
pub const NOTES_ELEMENT_NAME: &str = "Notes";
pub const TIMES_ELEMENT_NAME: &str = "Times";
pub const STRING_ELEMENT_NAME: &str = "String";
pub const KEY_ELEMENT_NAME: &str = "Key";
pub const VALUE_ELEMENT_NAME: &str = "Value";
pub const PROTECTED_ATTRIBUTE: &str = "Protected";

pub const CREATION_TIME_ELEMENT_NAME: &str = "Times/CreationTime";
pub const LAST_MODIFICATION_TIME_ELEMENT_NAME: &str = "Times/LastModificationTime";
pub const LAST_ACCESS_TIME_ELEMENT_NAME: &str = "Times/LastAccessTime";
pub const EXPIRY_TIME_ELEMENT_NAME: &str = "Times/ExpiryTime";
pub const EXPIRES_ELEMENT_NAME: &str = "Times/Expires";
pub const USAGE_COUNT_ELEMENT_NAME: &str = "Times/UsageCount";
pub const LOCATION_CHANGED_ELEMENT_NAME: &str = "Times/LocationChanged";

pub const GENERATOR_ELEMENT_NAME: &str = "Generator";
pub const DATABASE_NAME_ELEMENT_NAME: &str = "DatabaseName";
pub const DATABASE_NAME_CHANGED_ELEMENT_NAME: &str = "DatabaseNameChanged";
pub const DATABASE_DESCRIPTION_ELEMENT_NAME: &str = "DatabaseDescription";
pub const DATABASE_DESCRIPTION_CHANGED_ELEMENT_NAME: &str = "DatabaseDescriptionChanged";
pub const MEMORY_PROTECTION_PREFIX: &str = "MemoryProtection/Protect";
pub const RECYCLE_BIN_ENABLED_ELEMENT_NAME: &str = "RecycleBinEnabled";
pub const RECYCLE_BIN_UUID_ELEMENT_NAME: &str = "RecycleBinUUID";
pub const RECYCLE_BIN_CHANGED_ELEMENT_NAME: &str = "RecycleBinChanged";

/// Look up the element at `path` relative to `context`.
pub fn get_element(doc: &Document, path: &str, context: NodeId) -> Option<NodeId> {
    doc.find_first(context, path)
}

/// Look up the element at `path`, creating any missing elements on the way.
pub fn ensure_element(doc: &mut Document, path: &str, context: NodeId) -> NodeId {
    let mut current = context;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current = match doc.first_child_named(current, segment) {
            Some(existing) => existing,
            None => {
                let created = doc.create_element(segment);
                // a freshly created element can never be an ancestor of `current`
                let _ = doc.append_child(current, created);
                created
            }
        };
    }
    current
}

/// Text content of the element at `path`, if the element exists.
pub fn element_content<'a>(doc: &'a Document, path: &str, context: NodeId) -> Option<&'a str> {
    get_element(doc, path, context).map(|id| doc.text(id))
}

/// Set the text content at `path`, creating the element if needed.
pub fn set_element_content(
    doc: &mut Document,
    path: &str,
    context: NodeId,
    value: &str,
) -> NodeId {
    let id = ensure_element(doc, path, context);
    doc.set_text(id, value);
    id
}

/// Set the text content at `path` only if the element is missing or empty.
pub fn ensure_element_content(
    doc: &mut Document,
    path: &str,
    context: NodeId,
    value: &str,
) -> NodeId {
    let id = ensure_element(doc, path, context);
    if doc.text(id).is_empty() {
        doc.set_text(id, value);
    }
    id
}

/// Stamp the element at `path` with the current time.
pub fn touch_element(doc: &mut Document, path: &str, context: NodeId) -> NodeId {
    set_element_content(doc, path, context, &format_time(Utc::now()))
}

pub fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|time| time.with_timezone(&Utc))
}

/// Encode a UUID as padded base64 of its 16 raw bytes.
pub fn base64_from_uuid(uuid: Uuid) -> String {
    STANDARD.encode(uuid.as_bytes())
}

/// Decode a base64 UUID. Anything that is not exactly 16 bytes is `None`.
pub fn uuid_from_base64(text: &str) -> Option<Uuid> {
    let bytes = STANDARD.decode(text.trim()).ok()?;
    Uuid::from_slice(&bytes).ok()
}

/// Booleans are stored as `True`/`False`; parsing is case-insensitive.
pub fn parse_bool(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("true")
}

pub fn format_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Generate a random UUID that no `UUID` element of `doc` already holds.
pub fn new_unique_uuid(doc: &Document) -> Uuid {
    let taken: HashSet<Uuid> = doc
        .nodes_named(UUID_ELEMENT_NAME)
        .filter_map(|id| uuid_from_base64(doc.text(id)))
        .collect();
    loop {
        let candidate = Uuid::new_v4();
        if !candidate.is_nil() && !taken.contains(&candidate) {
            return candidate;
        }
    }
}

/// Populate the common children of a new group or entry node.
pub fn init_node(doc: &mut Document, node: NodeId) {
    let uuid = new_unique_uuid(doc);
    set_element_content(doc, UUID_ELEMENT_NAME, node, &base64_from_uuid(uuid));
    set_element_content(doc, ICON_ELEMENT_NAME, node, "0");
    let now = format_time(Utc::now());
    for path in [
        CREATION_TIME_ELEMENT_NAME,
        LAST_MODIFICATION_TIME_ELEMENT_NAME,
        LAST_ACCESS_TIME_ELEMENT_NAME,
        EXPIRY_TIME_ELEMENT_NAME,
        LOCATION_CHANGED_ELEMENT_NAME,
    ] {
        set_element_content(doc, path, node, &now);
    }
    set_element_content(doc, EXPIRES_ELEMENT_NAME, node, format_bool(false));
    set_element_content(doc, USAGE_COUNT_ELEMENT_NAME, node, "0");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_base64_is_24_chars_and_decodes() {
        let uuid = Uuid::new_v4();
        let text = base64_from_uuid(uuid);
        assert_eq!(text.len(), 24);
        assert_eq!(uuid_from_base64(&text), Some(uuid));
        assert_eq!(
            uuid_from_base64("AAAAAAAAAAAAAAAAAAAAAA=="),
            Some(Uuid::nil())
        );
    }

    #[test]
    fn invalid_uuid_text_is_none() {
        assert_eq!(uuid_from_base64("not base64!"), None);
        assert_eq!(uuid_from_base64("AAAA"), None);
        assert_eq!(uuid_from_base64(""), None);
    }

    #[test]
    fn bool_parsing_ignores_case() {
        assert!(parse_bool("true"));
        assert!(parse_bool("True"));
        assert!(parse_bool(" TRUE "));
        assert!(!parse_bool("False"));
        assert!(!parse_bool("yes"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn ensure_element_creates_missing_path() {
        let mut doc = Document::with_root("Meta");
        let meta = doc.document_element().unwrap();
        let flag = set_element_content(&mut doc, "MemoryProtection/ProtectTitle", meta, "False");
        assert_eq!(element_content(&doc, "MemoryProtection/ProtectTitle", meta), Some("False"));
        assert_eq!(ensure_element(&mut doc, "MemoryProtection/ProtectTitle", meta), flag);
        assert_eq!(doc.children(meta).len(), 1);
    }

    #[test]
    fn ensure_content_keeps_existing_value() {
        let mut doc = Document::with_root("Meta");
        let meta = doc.document_element().unwrap();
        ensure_element_content(&mut doc, "Generator", meta, "first");
        ensure_element_content(&mut doc, "Generator", meta, "second");
        assert_eq!(element_content(&doc, "Generator", meta), Some("first"));
    }

    #[test]
    fn touch_writes_parseable_time() {
        let mut doc = Document::with_root("Meta");
        let meta = doc.document_element().unwrap();
        let before = Utc::now() - chrono::Duration::seconds(1);
        touch_element(&mut doc, "DatabaseNameChanged", meta);
        let text = element_content(&doc, "DatabaseNameChanged", meta).unwrap();
        assert!(parse_time(text).unwrap() >= before);
    }

    #[test]
    fn new_uuid_avoids_existing_values() {
        let mut doc = Document::with_root("Group");
        let group = doc.document_element().unwrap();
        init_node(&mut doc, group);
        let existing = uuid_from_base64(element_content(&doc, "UUID", group).unwrap()).unwrap();
        for _ in 0..32 {
            assert_ne!(new_unique_uuid(&doc), existing);
        }
        assert_eq!(element_content(&doc, "Times/Expires", group), Some("False"));
    }
}
