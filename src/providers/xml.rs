//! Minimal event-based XML extraction shared by the feed providers.
//!
//! Matching is on local names, so namespace prefixes are ignored.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("malformed XML: {0}")]
    Malformed(#[from] quick_xml::Error),
    #[error("malformed XML attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),
    #[error("document ended inside <{0}>")]
    Truncated(String),
}

/// One element with its attributes and the text of its direct children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlRecord {
    pub attributes: HashMap<String, String>,
    pub fields: HashMap<String, String>,
}

impl XmlRecord {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Trimmed, non-empty text of a child element.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

fn attributes(start: &BytesStart<'_>) -> Result<HashMap<String, String>, XmlError> {
    let mut map = HashMap::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        map.insert(key, attr.unescape_value()?.into_owned());
    }
    Ok(map)
}

/// Unescaped text content of the first element named `name`, if any.
pub fn element_text(xml: &str, name: &str) -> Result<Option<String>, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut inside = false;
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) if !inside && local_name(&e) == name => inside = true,
            Event::Empty(e) if !inside && local_name(&e) == name => return Ok(Some(String::new())),
            Event::Text(t) if inside => text.push_str(&t.unescape()?),
            Event::CData(c) if inside => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
            Event::End(e) if inside && e.local_name().as_ref() == name.as_bytes() => {
                return Ok(Some(text));
            }
            Event::Eof if inside => return Err(XmlError::Truncated(name.to_string())),
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Every element named `name`, with its attributes and child-element texts.
pub fn records(xml: &str, name: &str) -> Result<Vec<XmlRecord>, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut found = Vec::new();
    let mut current: Option<XmlRecord> = None;
    // Depth below the record element; 1 means a direct child is open
    let mut depth = 0usize;
    let mut field: Option<(String, String)> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if current.is_none() {
                    if local_name(&e) == name {
                        current = Some(XmlRecord {
                            attributes: attributes(&e)?,
                            fields: HashMap::new(),
                        });
                        depth = 0;
                    }
                } else {
                    depth += 1;
                    if depth == 1 {
                        field = Some((local_name(&e), String::new()));
                    }
                }
            }
            Event::Empty(e) => {
                if current.is_none() && local_name(&e) == name {
                    found.push(XmlRecord {
                        attributes: attributes(&e)?,
                        fields: HashMap::new(),
                    });
                } else if let Some(record) = current.as_mut()
                    && depth == 0
                {
                    record.fields.insert(local_name(&e), String::new());
                }
            }
            Event::Text(t) => {
                if let Some((_, value)) = field.as_mut()
                    && depth == 1
                {
                    value.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some((_, value)) = field.as_mut()
                    && depth == 1
                {
                    value.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                if let Some(record) = current.as_mut() {
                    if depth == 0 {
                        if let Some(done) = current.take() {
                            found.push(done);
                        }
                    } else {
                        if depth == 1
                            && let Some((key, value)) = field.take()
                        {
                            record.fields.insert(key, value);
                        }
                        depth -= 1;
                    }
                }
            }
            Event::Eof if current.is_some() => return Err(XmlError::Truncated(name.to_string())),
            Event::Eof => return Ok(found),
            _ => {}
        }
    }
}
