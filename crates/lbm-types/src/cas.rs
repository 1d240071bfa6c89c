//! Content-addressed object metadata.

use serde::{Deserialize, Serialize};

/// Default maximum accepted blob size (100 MiB).
pub const DEFAULT_MAX_OBJECT_SIZE: u64 = 100 * 1024 * 1024;

/// Who may read an object: everyone, or members of one specific group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Visibility {
    /// Readable by any authenticated peer.
    Public,
    /// Readable only by members of the named group.
    Group(String),
}

impl From<Visibility> for String {
    fn from(v: Visibility) -> Self {
        match v {
            Visibility::Public => "public".to_string(),
            Visibility::Group(gid) => format!("group:{gid}"),
        }
    }
}

impl TryFrom<String> for Visibility {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s == "public" {
            Ok(Visibility::Public)
        } else if let Some(gid) = s.strip_prefix("group:") {
            Ok(Visibility::Group(gid.to_string()))
        } else {
            Err(format!("invalid visibility: {s}"))
        }
    }
}

/// Side-channel metadata carried alongside a CAS object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CasMeta {
    /// Read visibility.
    pub visibility: Visibility,
    /// Application-level kind tag (`"claim"`, `"package"`, `"unknown"`, ...).
    pub kind: String,
    /// Owning group, when `visibility` is group-scoped.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub group_id: Option<String>,
    /// Creation time in Unix milliseconds.
    pub created_ms: i64,
    /// Blob size in bytes.
    pub size: u64,
}

/// Aggregate CAS statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CasStats {
    /// Total number of stored objects.
    pub object_count: u64,
    /// Sum of all object sizes in bytes.
    pub total_size_bytes: u64,
    /// Object count grouped by `kind`.
    pub by_kind: std::collections::BTreeMap<String, u64>,
}
