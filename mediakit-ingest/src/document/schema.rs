//! Typed schema variants for the well-known namespaces
//!
//! Each schema owns one namespace. Writing a schema merges its fields into the
//! namespace map (fields the schema leaves unset are untouched), reading one
//! deserializes the namespace and ignores extension fields it does not know.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A schema bound to a fixed namespace
pub trait TypedSchema: Serialize + DeserializeOwned {
    const NAMESPACE: &'static str;
}

/// `source`: identity and filesystem facts about the input file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSchema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    /// Milliseconds since the Unix epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_modified: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub super_type: Option<String>,
    /// Canonical capture date chosen by best-date selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

impl TypedSchema for SourceSchema {
    const NAMESPACE: &'static str = "source";
}

/// `image`: displayed dimensions (extracted tags live beside them)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageSchema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl TypedSchema for ImageSchema {
    const NAMESPACE: &'static str = "image";
}

/// One stored rendition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proxy {
    pub width: u32,
    pub height: u32,
    /// `jpg` or `png`
    pub format: String,
    /// Encoder quality in (0, 1]
    pub quality: f64,
    /// Object-store name
    pub name: String,
    /// Retrievable URI returned by the object store
    pub uri: String,
}

impl Proxy {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// `proxies`: rendition cascade, ascending by area
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxySchema {
    #[serde(default)]
    pub items: Vec<Proxy>,
    /// Nine `#rrggbb` colors
    #[serde(default)]
    pub tiny_proxy: Vec<String>,
}

impl TypedSchema for ProxySchema {
    const NAMESPACE: &'static str = "proxies";
}

/// `location`: signed decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSchema {
    pub lon: f64,
    pub lat: f64,
}

impl TypedSchema for LocationSchema {
    const NAMESPACE: &'static str = "location";
}

/// `links`: secondary representations found next to the source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkSchema {
    #[serde(default)]
    pub secondary: Vec<String>,
}

impl TypedSchema for LinkSchema {
    const NAMESPACE: &'static str = "links";
}

/// `user`: values a person may edit after ingest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSchema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<i64>,
}

impl TypedSchema for UserSchema {
    const NAMESPACE: &'static str = "user";
}

/// Closed set of typed schemas accepted by `AssetDocument::set_schema`
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Source(SourceSchema),
    Image(ImageSchema),
    Proxies(ProxySchema),
    Location(LocationSchema),
    Links(LinkSchema),
    User(UserSchema),
}

impl Schema {
    pub fn namespace(&self) -> &'static str {
        match self {
            Schema::Source(_) => SourceSchema::NAMESPACE,
            Schema::Image(_) => ImageSchema::NAMESPACE,
            Schema::Proxies(_) => ProxySchema::NAMESPACE,
            Schema::Location(_) => LocationSchema::NAMESPACE,
            Schema::Links(_) => LinkSchema::NAMESPACE,
            Schema::User(_) => UserSchema::NAMESPACE,
        }
    }

    pub(crate) fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Schema::Source(s) => serde_json::to_value(s),
            Schema::Image(s) => serde_json::to_value(s),
            Schema::Proxies(s) => serde_json::to_value(s),
            Schema::Location(s) => serde_json::to_value(s),
            Schema::Links(s) => serde_json::to_value(s),
            Schema::User(s) => serde_json::to_value(s),
        }
    }
}

macro_rules! impl_into_schema {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Schema {
                fn from(s: $ty) -> Self {
                    Schema::$variant(s)
                }
            }
        )*
    };
}

impl_into_schema! {
    SourceSchema => Source,
    ImageSchema => Image,
    ProxySchema => Proxies,
    LocationSchema => Location,
    LinkSchema => Links,
    UserSchema => User,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_schema_uses_camel_case_and_skips_unset() {
        let schema = SourceSchema {
            file_size: Some(1024),
            mime_type: Some("image/png".to_string()),
            ..Default::default()
        };
        let json = Schema::from(schema).to_json().unwrap();
        assert_eq!(json["fileSize"], 1024);
        assert_eq!(json["mimeType"], "image/png");
        assert!(json.get("path").is_none());
    }

    #[test]
    fn test_schema_namespaces() {
        assert_eq!(Schema::from(ProxySchema::default()).namespace(), "proxies");
        assert_eq!(
            Schema::from(LocationSchema { lon: 1.0, lat: 2.0 }).namespace(),
            "location"
        );
    }

    #[test]
    fn test_proxy_area() {
        let proxy = Proxy {
            width: 128,
            height: 85,
            format: "jpg".to_string(),
            quality: 0.5,
            name: "a/128x85.jpg".to_string(),
            uri: "file:///tmp/a/128x85.jpg".to_string(),
        };
        assert_eq!(proxy.area(), 128 * 85);
    }
}
