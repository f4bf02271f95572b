//! Embedded tag reading
//!
//! Reads EXIF (TIFF/Exif/GPS/Interop IFDs of the primary image) with the
//! `kamadak-exif` crate, a handful of XMP packet properties with `quick-xml`,
//! and synthesizes
//! `File.*` tags from filesystem metadata. Everything comes back as a flat
//! list of [`RawTag`]s for the metadata extractor to store.

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Bytes scanned for an XMP packet
const XMP_SCAN_LIMIT: u64 = 256 * 1024;

/// XMP property lifted into an `Xmp.<tag>` tag
struct XmpProperty {
    namespace: &'static str,
    /// Conventional prefix, used when a packet omits the namespace declaration
    prefix: &'static str,
    local: &'static str,
    tag: &'static str,
}

const XMP_PROPERTIES: &[XmpProperty] = &[
    XmpProperty {
        namespace: "http://ns.adobe.com/xap/1.0/",
        prefix: "xmp",
        local: "Rating",
        tag: "Rating",
    },
    XmpProperty {
        namespace: "http://ns.adobe.com/xap/1.0/",
        prefix: "xmp",
        local: "Label",
        tag: "Label",
    },
    XmpProperty {
        namespace: "http://ns.adobe.com/exif/1.0/aux/",
        prefix: "aux",
        local: "Lens",
        tag: "Lens",
    },
    XmpProperty {
        namespace: "http://ns.adobe.com/photoshop/1.0/",
        prefix: "photoshop",
        local: "City",
        tag: "City",
    },
    XmpProperty {
        namespace: "http://ns.adobe.com/photoshop/1.0/",
        prefix: "photoshop",
        local: "Country",
        tag: "Country",
    },
    XmpProperty {
        namespace: "http://purl.org/dc/elements/1.1/",
        prefix: "dc",
        local: "title",
        tag: "Title",
    },
    XmpProperty {
        namespace: "http://purl.org/dc/elements/1.1/",
        prefix: "dc",
        local: "subject",
        tag: "Subject",
    },
];

const RDF_NAMESPACE: &[u8] = b"http://www.w3.org/1999/02/22-rdf-syntax-ns#";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("I/O error reading tags: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt EXIF data: {0}")]
    Exif(String),
}

/// Decoded tag value
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Text(String),
    TextList(Vec<String>),
    Int(i64),
    IntList(Vec<i64>),
    Float(f64),
    FloatList(Vec<f64>),
    Rational(f64),
    RationalList(Vec<f64>),
    Date(DateTime<Utc>),
    /// Opaque binary payload, never stored
    Bytes(Vec<u8>),
}

impl TagValue {
    /// Raw value rendered as text, for comparison against descriptions
    pub fn raw_text(&self) -> Option<String> {
        match self {
            TagValue::Text(s) => Some(s.clone()),
            TagValue::TextList(l) => Some(l.join(", ")),
            TagValue::Int(i) => Some(i.to_string()),
            TagValue::Float(f) | TagValue::Rational(f) => Some(f.to_string()),
            TagValue::IntList(l) => Some(
                l.iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            TagValue::FloatList(l) | TagValue::RationalList(l) => Some(
                l.iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            TagValue::Date(d) => Some(d.to_rfc3339()),
            TagValue::Bytes(_) => None,
        }
    }
}

/// One tag from one metadata directory
#[derive(Debug, Clone, PartialEq)]
pub struct RawTag {
    /// `Exif`, `GPS`, `Interoperability`, `Xmp`, `File`, ...
    pub directory: String,
    pub name: String,
    pub value: TagValue,
    /// Human-readable rendering (units, enum names) when the reader has one
    pub description: Option<String>,
}

impl RawTag {
    pub fn new(directory: &str, name: &str, value: TagValue) -> Self {
        Self {
            directory: directory.to_string(),
            name: name.to_string(),
            value,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Read every embedded tag from `path`
///
/// A file without EXIF data, or in a container the reader does not know, is an
/// empty result. A container whose EXIF segment is present but corrupt is an
/// error.
pub fn read_tags(path: &Path) -> Result<Vec<RawTag>, MetadataError> {
    let mut tags = read_exif(path)?;
    tags.extend(read_xmp(path)?);
    debug!(path = %path.display(), tags = tags.len(), "Read embedded tags");
    Ok(tags)
}

fn read_exif(path: &Path) -> Result<Vec<RawTag>, MetadataError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let exif = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(container)) => {
            debug!(path = %path.display(), container, "No EXIF data");
            return Ok(Vec::new());
        }
        Err(exif::Error::InvalidFormat(msg)) if msg == "Unknown image format" => {
            debug!(path = %path.display(), "Container has no EXIF support");
            return Ok(Vec::new());
        }
        Err(exif::Error::Io(e)) => return Err(MetadataError::Io(e)),
        Err(e) => return Err(MetadataError::Exif(e.to_string())),
    };

    let mut tags = Vec::new();
    for field in exif.fields() {
        if field.ifd_num != exif::In::PRIMARY {
            continue;
        }
        let Some(value) = convert_value(field.tag, &field.value) else {
            continue;
        };
        let directory = match field.tag.context() {
            exif::Context::Gps => "GPS",
            exif::Context::Interop => "Interoperability",
            _ => "Exif",
        };
        let description = field.display_value().with_unit(&exif).to_string();
        tags.push(
            RawTag::new(directory, &field.tag.to_string(), value).with_description(description),
        );
    }
    Ok(tags)
}

fn single_or_list<T: Copy, U>(
    values: &[T],
    convert: impl Fn(T) -> U,
    one: impl FnOnce(U) -> TagValue,
    many: impl FnOnce(Vec<U>) -> TagValue,
) -> Option<TagValue> {
    match values {
        [] => None,
        [v] => Some(one(convert(*v))),
        _ => Some(many(values.iter().map(|v| convert(*v)).collect())),
    }
}

fn ascii(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}

fn convert_value(tag: exif::Tag, value: &exif::Value) -> Option<TagValue> {
    use exif::Value;

    match value {
        Value::Ascii(strings) => {
            let strings: Vec<String> = strings
                .iter()
                .map(|s| ascii(s))
                .filter(|s| !s.is_empty())
                .collect();
            match strings.len() {
                0 => None,
                1 => strings.into_iter().next().map(TagValue::Text),
                _ => Some(TagValue::TextList(strings)),
            }
        }
        Value::Byte(v) => single_or_list(v, i64::from, TagValue::Int, TagValue::IntList),
        Value::Short(v) => single_or_list(v, i64::from, TagValue::Int, TagValue::IntList),
        Value::Long(v) => single_or_list(v, i64::from, TagValue::Int, TagValue::IntList),
        Value::SByte(v) => single_or_list(v, i64::from, TagValue::Int, TagValue::IntList),
        Value::SShort(v) => single_or_list(v, i64::from, TagValue::Int, TagValue::IntList),
        Value::SLong(v) => single_or_list(v, i64::from, TagValue::Int, TagValue::IntList),
        Value::Rational(v) => single_or_list(
            v,
            |r| r.to_f64(),
            TagValue::Rational,
            TagValue::RationalList,
        ),
        Value::SRational(v) => single_or_list(
            v,
            |r| r.to_f64(),
            TagValue::Rational,
            TagValue::RationalList,
        ),
        Value::Float(v) => single_or_list(v, f64::from, TagValue::Float, TagValue::FloatList),
        Value::Double(v) => single_or_list(v, |d| d, TagValue::Float, TagValue::FloatList),
        Value::Undefined(bytes, _) if tag == exif::Tag::UserComment => {
            decode_user_comment(bytes).map(TagValue::Text)
        }
        Value::Undefined(bytes, _) => {
            if !bytes.is_empty() && bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
                Some(TagValue::Text(ascii(bytes)))
            } else {
                Some(TagValue::Bytes(bytes.clone()))
            }
        }
        _ => None,
    }
}

/// UserComment carries an 8-byte character-code header before the text
fn decode_user_comment(bytes: &[u8]) -> Option<String> {
    if bytes.len() <= 8 {
        return None;
    }
    let (header, body) = bytes.split_at(8);
    let text = if header.starts_with(b"UNICODE") {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(body).into_owned()
    };
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace()).to_string();
    (!text.is_empty()).then_some(text)
}

/// Scan the head of the file for an XMP packet and lift known properties
fn read_xmp(path: &Path) -> Result<Vec<RawTag>, MetadataError> {
    let mut head = Vec::new();
    File::open(path)?.take(XMP_SCAN_LIMIT).read_to_end(&mut head)?;

    let Some(packet) = find_packet(&head) else {
        return Ok(Vec::new());
    };
    Ok(parse_xmp(packet))
}

/// Slice of `head` holding the `x:xmpmeta` element
fn find_packet(head: &[u8]) -> Option<&[u8]> {
    const OPEN: &[u8] = b"<x:xmpmeta";
    const CLOSE: &[u8] = b"</x:xmpmeta>";

    let start = head.windows(OPEN.len()).position(|w| w == OPEN)?;
    let end = head[start..]
        .windows(CLOSE.len())
        .position(|w| w == CLOSE)
        .map_or(head.len(), |e| start + e + CLOSE.len());
    Some(&head[start..end])
}

fn match_property(resolved: &ResolveResult, local: &[u8]) -> Option<usize> {
    XMP_PROPERTIES.iter().position(|p| {
        p.local.as_bytes() == local
            && match resolved {
                ResolveResult::Bound(Namespace(ns)) => *ns == p.namespace.as_bytes(),
                ResolveResult::Unknown(prefix) => prefix.as_slice() == p.prefix.as_bytes(),
                ResolveResult::Unbound => false,
            }
    })
}

fn is_rdf(resolved: &ResolveResult, local: &[u8], name: &[u8]) -> bool {
    matches!(resolved, ResolveResult::Bound(Namespace(ns)) if *ns == RDF_NAMESPACE) && local == name
}

/// Property element being read, with the text of its `rdf:li` items
struct OpenProperty {
    index: usize,
    depth: usize,
    texts: Vec<String>,
    alternative: bool,
    list: bool,
}

impl OpenProperty {
    fn into_tag(self) -> Option<RawTag> {
        if self.texts.is_empty() {
            return None;
        }
        let value = if self.list {
            TagValue::TextList(self.texts)
        } else if self.alternative {
            text_value(self.texts.into_iter().next()?)
        } else {
            text_value(self.texts.join(" "))
        };
        Some(RawTag::new("Xmp", XMP_PROPERTIES[self.index].tag, value))
    }
}

fn text_value(raw: String) -> TagValue {
    match raw.parse::<i64>() {
        Ok(i) => TagValue::Int(i),
        Err(_) => TagValue::Text(raw),
    }
}

/// Known properties from an XMP packet
///
/// Properties may be attributes of `rdf:Description` or child elements, with
/// `rdf:Alt` taking its first item and `rdf:Bag`/`rdf:Seq` becoming a list.
/// Malformed XML ends the read with whatever was collected so far.
fn parse_xmp(packet: &[u8]) -> Vec<RawTag> {
    let mut reader = NsReader::from_reader(packet);
    let mut buf = Vec::new();
    let mut tags = Vec::new();
    let mut depth = 0usize;
    let mut open: Option<OpenProperty> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                depth += 1;
                let (resolved, local) = reader.resolve_element(e.name());
                match open.as_mut() {
                    Some(prop) => {
                        if is_rdf(&resolved, local.as_ref(), b"Alt") {
                            prop.alternative = true;
                        } else if is_rdf(&resolved, local.as_ref(), b"Bag")
                            || is_rdf(&resolved, local.as_ref(), b"Seq")
                        {
                            prop.list = true;
                        }
                    }
                    None => {
                        if let Some(index) = match_property(&resolved, local.as_ref()) {
                            open = Some(OpenProperty {
                                index,
                                depth,
                                texts: Vec::new(),
                                alternative: false,
                                list: false,
                            });
                        } else {
                            tags.extend(attribute_tags(&reader, &e));
                        }
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if open.is_none() {
                    tags.extend(attribute_tags(&reader, &e));
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(prop) = open.as_mut() {
                    match t.unescape() {
                        Ok(text) if !text.trim().is_empty() => {
                            prop.texts.push(text.trim().to_string())
                        }
                        Ok(_) => {}
                        Err(e) => debug!(error = %e, "Unreadable XMP text"),
                    }
                }
            }
            Ok(Event::End(_)) => {
                if open.as_ref().is_some_and(|p| p.depth == depth) {
                    tags.extend(open.take().and_then(OpenProperty::into_tag));
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "Malformed XMP packet");
                break;
            }
        }
        buf.clear();
    }
    tags
}

/// Properties written as attributes of a description element
fn attribute_tags(reader: &NsReader<&[u8]>, element: &BytesStart) -> Vec<RawTag> {
    element
        .attributes()
        .flatten()
        .filter_map(|attr| {
            let (resolved, local) = reader.resolve_attribute(attr.key);
            let index = match_property(&resolved, local.as_ref())?;
            let value = attr.unescape_value().ok()?;
            let value = value.trim();
            (!value.is_empty()).then(|| {
                RawTag::new("Xmp", XMP_PROPERTIES[index].tag, text_value(value.to_string()))
            })
        })
        .collect()
}

/// `File.*` tags from filesystem metadata
pub fn file_tags(path: &Path) -> Result<Vec<RawTag>, MetadataError> {
    let meta = std::fs::metadata(path)?;
    let mut tags = vec![RawTag::new(
        "File",
        "FileSize",
        TagValue::Int(i64::try_from(meta.len()).unwrap_or(i64::MAX)),
    )];
    if let Some(name) = path.file_name() {
        tags.push(RawTag::new(
            "File",
            "FileName",
            TagValue::Text(name.to_string_lossy().into_owned()),
        ));
    }
    if let Ok(modified) = meta.modified() {
        tags.push(RawTag::new(
            "File",
            "FileModifiedDate",
            TagValue::Date(DateTime::<Utc>::from(modified)),
        ));
    }
    Ok(tags)
}
