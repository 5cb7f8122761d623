use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::attributes::Attributes;
use crate::error::AdornError;
use crate::event::XmlEventSink;

/// Drives a sink with the content events of an XML document.
///
/// Empty elements are reported as a start immediately followed by an end.
/// Comments, processing instructions and the document type declaration are
/// not reported.
pub fn parse_xml<R: BufRead, S: XmlEventSink>(input: R, sink: &mut S) -> Result<(), AdornError> {
    let mut reader = Reader::from_reader(input);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    sink.start_document()?;
    loop {
        let position = reader.buffer_position() as u64;
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = element_name(e);
                let attribs = element_attributes(e, position)?;
                sink.start_element(&name, &attribs)?;
            }
            Ok(Event::Empty(ref e)) => {
                let name = element_name(e);
                let attribs = element_attributes(e, position)?;
                sink.start_element(&name, &attribs)?;
                sink.end_element(&name)?;
            }
            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                sink.end_element(&name)?;
            }
            Ok(Event::Text(ref e)) => {
                let text = match e.unescape() {
                    Ok(text) => text.to_string(),
                    //undeclared entities are passed on as they are
                    Err(_) => String::from_utf8_lossy(e).to_string(),
                };
                if !text.is_empty() {
                    sink.characters(&text)?;
                }
            }
            Ok(Event::CData(ref e)) => {
                let text = String::from_utf8_lossy(e).to_string();
                if !text.is_empty() {
                    sink.characters(&text)?;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AdornError::malformed(
                    reader.buffer_position() as u64,
                    e.to_string(),
                ))
            }
            _ => {}
        }
        buf.clear();
    }
    sink.end_document()
}

pub fn parse_str<S: XmlEventSink>(xml: &str, sink: &mut S) -> Result<(), AdornError> {
    parse_xml(xml.as_bytes(), sink)
}

pub fn parse_file<S: XmlEventSink>(filename: &Path, sink: &mut S) -> Result<(), AdornError> {
    let file = File::open(filename)?;
    parse_xml(BufReader::new(file), sink)
}

fn element_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_string()
}

fn element_attributes(e: &BytesStart, position: u64) -> Result<Attributes, AdornError> {
    let mut attribs = Attributes::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| AdornError::malformed(position, err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = match attr.unescape_value() {
            Ok(value) => value.to_string(),
            Err(_) => String::from_utf8_lossy(&attr.value).to_string(),
        };
        attribs = attribs.with_set(key, value);
    }
    Ok(attribs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::XmlEvent;

    #[test]
    fn test_parse_events() -> Result<(), String> {
        let xml = r#"<?xml version="1.0"?>
<!-- a comment -->
<TEI><p rend="x &amp; y">The <hi>dog</hi><lb/> &lt;barks&gt;</p></TEI>"#;
        let mut events: Vec<XmlEvent> = Vec::new();
        parse_str(xml, &mut events).map_err(|e| e.to_string())?;
        let events: Vec<XmlEvent> = events
            .into_iter()
            .filter(|e| !matches!(e, XmlEvent::Characters(s) if s.trim().is_empty()))
            .collect();
        let expected = vec![
            XmlEvent::StartDocument,
            XmlEvent::Start("TEI".into(), Attributes::new()),
            XmlEvent::Start("p".into(), Attributes::new().with_set("rend", "x & y")),
            XmlEvent::Characters("The ".into()),
            XmlEvent::Start("hi".into(), Attributes::new()),
            XmlEvent::Characters("dog".into()),
            XmlEvent::End("hi".into()),
            XmlEvent::Start("lb".into(), Attributes::new()),
            XmlEvent::End("lb".into()),
            XmlEvent::Characters(" <barks>".into()),
            XmlEvent::End("p".into()),
            XmlEvent::End("TEI".into()),
            XmlEvent::EndDocument,
        ];
        assert_eq!(events, expected);
        Ok(())
    }

    #[test]
    fn test_parse_malformed() {
        let mut events: Vec<XmlEvent> = Vec::new();
        let result = parse_str("<TEI><p>text</q></TEI>", &mut events);
        assert!(matches!(result, Err(AdornError::Malformed { .. })));
    }

    #[test]
    fn test_parse_xml_lang() -> Result<(), String> {
        let mut events: Vec<XmlEvent> = Vec::new();
        parse_str(r#"<foreign xml:lang="la">et</foreign>"#, &mut events)
            .map_err(|e| e.to_string())?;
        match &events[1] {
            XmlEvent::Start(name, attribs) => {
                assert_eq!(name, "foreign");
                assert_eq!(attribs.get("xml:lang"), Some("la"));
            }
            other => return Err(format!("unexpected event {:?}", other)),
        }
        Ok(())
    }
}
