//! Payload and descriptor types exchanged with the file service.
//!
//! Directory listings arrive as JSON of the form
//! `{"method":"GET","result":"OK","name":"/dir/","content":[{...},...,{}]}`.
//! The service terminates `content` with an empty object, which is dropped
//! while decoding.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// File type code the service reports for directories (`S_IFDIR >> 12`).
pub const ENTRY_TYPE_DIRECTORY: u32 = 0o04;

/// File type code the service reports for regular files (`S_IFREG >> 12`).
pub const ENTRY_TYPE_FILE: u32 = 0o10;

/// Content type the service uses for JSON bodies.
pub const CONTENT_TYPE_JSON: &str = "text/json";

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Human-readable size, e.g. `"12 B"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// File type code (upper bits of `st_mode`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<u32>,
    /// MIME type guessed by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
}

impl DirEntry {
    pub fn is_directory(&self) -> bool {
        self.kind == Some(ENTRY_TYPE_DIRECTORY)
    }
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    size: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<u32>,
    #[serde(default)]
    mime: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawListing {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    content: Vec<RawEntry>,
}

/// A decoded directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Listing {
    /// Directory path as echoed by the service, when present.
    pub directory: Option<String>,
    /// Entries in service order.
    pub entries: Vec<DirEntry>,
}

impl Listing {
    /// Decode a listing body, discarding entries that carry no name.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let raw: RawListing = serde_json::from_slice(body)?;
        let entries = raw
            .content
            .into_iter()
            .filter_map(|entry| {
                let name = entry.name?;
                Some(DirEntry {
                    name,
                    size: entry.size,
                    kind: entry.kind,
                    mime: entry.mime,
                })
            })
            .collect();

        Ok(Self {
            directory: raw.name,
            entries,
        })
    }

    /// Encode a listing the way the service does, trailing sentinel included.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let mut content: Vec<serde_json::Value> = self
            .entries
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<_, _>>()?;
        content.push(serde_json::json!({}));

        let body = serde_json::json!({
            "method": "GET",
            "result": "OK",
            "name": self.directory.clone().unwrap_or_default(),
            "content": content,
        });
        Ok(serde_json::to_vec(&body)?)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.name == name)
    }
}

/// A request or response body with its declared content type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload {
    pub data: Bytes,
    pub content_type: Option<String>,
}

impl Payload {
    pub fn new(data: impl Into<Bytes>, content_type: Option<String>) -> Self {
        Self {
            data: data.into(),
            content_type,
        }
    }

    /// Raw bytes with no declared type.
    pub fn bytes(data: impl Into<Bytes>) -> Self {
        Self::new(data, None)
    }

    /// A JSON value serialized with the service's JSON content type.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::new(
            serde_json::to_vec(value)?,
            Some(CONTENT_TYPE_JSON.to_string()),
        ))
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.contains("json"))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Identity reported by the service after a successful authorization probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Authenticated principal (`X-Remote-User`).
    pub principal: String,
    /// Primary group (`X-Remote-Group`).
    pub group: Option<String>,
    /// Home directory (`X-Remote-Home`).
    pub home: Option<String>,
}

/// One file or directory targeted by an operation.
///
/// `new_name`, `old_name`, `source_dir` and `cut` only carry meaning while a
/// copy, move or cut/paste sequence is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileDescriptor {
    pub name: String,
    pub new_name: Option<String>,
    pub old_name: Option<String>,
    /// Directory the content was read from.
    pub source_dir: Option<String>,
    pub cut: bool,
    pub payload: Option<Payload>,
}

impl FileDescriptor {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
