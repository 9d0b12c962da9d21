//! Reading and writing a [`Document`] as XML text.

use super::{Document, DocumentError, NodeId};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Write;

fn xml_error(err: impl std::fmt::Display) -> DocumentError {
    DocumentError::Xml(err.to_string())
}

fn element_name(start: &BytesStart<'_>) -> Result<String, DocumentError> {
    std::str::from_utf8(start.name().as_ref())
        .map(str::to_string)
        .map_err(xml_error)
}

fn open_element(
    doc: &mut Document,
    stack: &[NodeId],
    start: &BytesStart<'_>,
) -> Result<NodeId, DocumentError> {
    let id = doc.create_element(&element_name(start)?);
    for attr in start.attributes() {
        let attr = attr.map_err(xml_error)?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(xml_error)?;
        let value = attr.unescape_value().map_err(xml_error)?;
        doc.set_attribute(id, key, value.into_owned());
    }
    match stack.last() {
        Some(&parent) => doc.append_child(parent, id)?,
        None if doc.document_element().is_none() => doc.set_document_element(id),
        None => return Err(DocumentError::Xml("multiple document elements".into())),
    }
    Ok(id)
}

/// Parse XML bytes into a new document.
///
/// Text is kept verbatim on leaf elements; whitespace between child
/// elements is dropped.
pub fn parse(input: &[u8]) -> Result<Document, DocumentError> {
    let mut reader = Reader::from_reader(input);
    let mut doc = Document::new();
    let mut stack: Vec<NodeId> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(start) => {
                let id = open_element(&mut doc, &stack, &start)?;
                stack.push(id);
            }
            Event::Empty(start) => {
                open_element(&mut doc, &stack, &start)?;
            }
            Event::End(_) => {
                let Some(id) = stack.pop() else {
                    return Err(DocumentError::Xml("unbalanced end tag".into()));
                };
                if !doc.children(id).is_empty() {
                    doc.set_text(id, String::new());
                }
            }
            Event::Text(text) => {
                if let Some(&id) = stack.last() {
                    let text = text.unescape().map_err(xml_error)?;
                    let mut content = doc.text(id).to_string();
                    content.push_str(&text);
                    doc.set_text(id, content);
                }
            }
            Event::CData(data) => {
                if let Some(&id) = stack.last() {
                    let mut content = doc.text(id).to_string();
                    content.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    doc.set_text(id, content);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(DocumentError::Xml("unexpected end of input".into()));
    }
    Ok(doc)
}

/// Write the document as indented XML.
pub fn write<W: Write>(doc: &Document, output: W) -> Result<(), DocumentError> {
    let mut writer = Writer::new_with_indent(output, b'\t', 1);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), Some("yes"))))
        .map_err(xml_error)?;
    if let Some(root) = doc.document_element() {
        write_node(doc, root, &mut writer)?;
    }
    writer.get_mut().write_all(b"\n").map_err(xml_error)?;
    Ok(())
}

fn write_node<W: Write>(
    doc: &Document,
    id: NodeId,
    writer: &mut Writer<W>,
) -> Result<(), DocumentError> {
    let name = doc.name(id);
    let mut start = BytesStart::new(name);
    for attribute in doc.attributes(id) {
        start.push_attribute(attribute);
    }

    let children = doc.children(id);
    if children.is_empty() && doc.text(id).is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(xml_error);
    }

    writer.write_event(Event::Start(start)).map_err(xml_error)?;
    if children.is_empty() {
        writer
            .write_event(Event::Text(BytesText::new(doc.text(id))))
            .map_err(xml_error)?;
    } else {
        for &child in children {
            write_node(doc, child, writer)?;
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<KeePassFile>
	<Meta>
		<DatabaseName>Vault &amp; Co</DatabaseName>
	</Meta>
	<Root>
		<Group>
			<Name>Root</Name>
			<Entry>
				<String>
					<Key>Password</Key>
					<Value Protected="True">  spaced  </Value>
				</String>
			</Entry>
		</Group>
	</Root>
</KeePassFile>"#;

    #[test]
    fn parse_keeps_leaf_text_verbatim() {
        let doc = parse(SAMPLE.as_bytes()).unwrap();
        let root = doc.document_element().unwrap();
        let name = doc.find_first(root, "Meta/DatabaseName").unwrap();
        assert_eq!(doc.text(name), "Vault & Co");
        let value = doc.find_first(root, "Root/Group/Entry/String/Value").unwrap();
        assert_eq!(doc.text(value), "  spaced  ");
        assert_eq!(doc.attribute(value, "Protected"), Some("True"));
        let meta = doc.find_first(root, "Meta").unwrap();
        assert_eq!(doc.text(meta), "");
    }

    #[test]
    fn written_output_parses_back() {
        let doc = parse(SAMPLE.as_bytes()).unwrap();
        let mut out: Vec<u8> = Vec::new();
        write(&doc, &mut out).unwrap();
        let reparsed = parse(&out).unwrap();
        let root = reparsed.document_element().unwrap();
        let value = reparsed
            .find_first(root, "Root/Group/Entry/String/Value")
            .unwrap();
        assert_eq!(reparsed.text(value), "  spaced  ");
        let name = reparsed.find_first(root, "Meta/DatabaseName").unwrap();
        assert_eq!(reparsed.text(name), "Vault & Co");
    }

    #[test]
    fn empty_elements_round_trip() {
        let doc = parse(b"<A><B/><C></C></A>").unwrap();
        let root = doc.document_element().unwrap();
        assert_eq!(doc.children(root).len(), 2);
        let mut out: Vec<u8> = Vec::new();
        write(&doc, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("<B/>"));
    }

    #[test]
    fn unbalanced_input_is_rejected() {
        assert!(parse(b"<A><B></A>").is_err());
        assert!(parse(b"<A><B>").is_err());
    }
}
