//! # File Abstraction Layer Contract
//!
//! The host content-management system sees storages through a narrow, read-only capability
//! interface: list, stat, materialize, exists. [`StorageDriver`] is that interface, and
//! [`crate::driver::DamDriver`] is the DAM-backed implementation.
//!
//! Identifiers cross this boundary as plain tokens (`image#abc`, `folder#ROOT`). The host
//! hands them over without knowing which driver minted them, so every method accepts
//! arbitrary strings and decides for itself whether they belong to it.
//!
//! ## Metadata Shapes
//!
//! [`FileInfo`] and [`FolderInfo`] are the stat results. File info is usually consumed as a
//! key/value projection; [`project`] turns it into a `serde_json` map restricted to the
//! fields the host asked for.

use crate::error::{DamError, Result};
use crate::identifier::CombinedIdentifier;
use serde::Serialize;
use serde_json::{Map, Value};
use std::ops::BitAnd;
use std::path::PathBuf;

/// Capability bits a storage advertises to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Capabilities = Capabilities(0);
    pub const BROWSABLE: Capabilities = Capabilities(1);
    pub const PUBLIC: Capabilities = Capabilities(1 << 1);
    pub const WRITABLE: Capabilities = Capabilities(1 << 2);
    pub const HIERARCHICAL_IDENTIFIERS: Capabilities = Capabilities(1 << 3);

    pub fn contains(&self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: Capabilities) -> Capabilities {
        Capabilities(self.0 | other.0)
    }
}

impl BitAnd for Capabilities {
    type Output = Capabilities;

    fn bitand(self, rhs: Self) -> Self::Output {
        Capabilities(self.0 & rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Permissions {
    #[serde(rename = "r")]
    pub read: bool,
    #[serde(rename = "w")]
    pub write: bool,
}

impl Permissions {
    pub const READ_ONLY: Permissions = Permissions {
        read: true,
        write: false,
    };
}

/// Stat result for an asset. Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub size: u64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub mimetype: String,
    pub name: String,
    pub extension: String,
    pub identifier: String,
    pub identifier_hash: String,
    pub storage: u32,
    /// Assets have no single parent folder, so this is always empty.
    pub folder_hash: String,
    pub folder_identifiers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderInfo {
    pub identifier: String,
    pub name: String,
    pub mtime: i64,
    pub ctime: i64,
    pub storage: u32,
}

/// Serializes `value` into a map and keeps only the `requested` keys.
/// An empty request keeps everything.
pub fn project<T: Serialize>(value: &T, requested: &[&str]) -> Result<Map<String, Value>> {
    let full = match serde_json::to_value(value)? {
        Value::Object(map) => map,
        other => {
            return Err(DamError::Config(format!(
                "projection source is not an object: {}",
                other
            )))
        }
    };
    if requested.is_empty() {
        return Ok(full);
    }
    requested
        .iter()
        .map(|key| {
            full.get(*key)
                .cloned()
                .map(|value| (key.to_string(), value))
                .ok_or_else(|| DamError::MissingRequestedField(key.to_string()))
        })
        .collect()
}

/// Read-only storage driver as seen by the host.
///
/// Existence checks never fail: anything that cannot be resolved does not exist.
/// Listings recover from absent containers with empty results but let transport
/// failures through.
pub trait StorageDriver {
    /// Name the host registers this driver type under.
    fn driver_type(&self) -> &str;

    fn storage_id(&self) -> u32;

    fn capabilities(&self) -> Capabilities;

    fn root_level_folder(&self) -> String;

    fn default_folder(&self) -> String;

    fn file_exists(&self, identifier: &str) -> bool;

    fn folder_exists(&self, identifier: &str) -> bool;

    /// Full projection, or only `requested_fields` when non-empty.
    fn get_file_info(&self, identifier: &str, requested_fields: &[&str])
        -> Result<Map<String, Value>>;

    fn get_folder_info(&self, identifier: &str) -> Result<FolderInfo>;

    fn get_parent_identifier(&self, identifier: &str) -> Result<String>;

    fn get_public_url(&self, identifier: &str) -> Result<Option<String>>;

    /// `limit == 0` means one default page. `sort` is a host sort key
    /// (`name`, `fileext`, `size`, anything else sorts by time).
    fn get_files_in_folder(
        &self,
        identifier: &str,
        start: usize,
        limit: usize,
        recursive: bool,
        sort: &str,
        sort_reverse: bool,
    ) -> Result<Vec<CombinedIdentifier>>;

    /// `limit == 0` means unlimited.
    fn get_folders_in_folder(
        &self,
        identifier: &str,
        start: usize,
        limit: usize,
        recursive: bool,
        sort_reverse: bool,
    ) -> Result<Vec<CombinedIdentifier>>;

    fn count_files_in_folder(&self, identifier: &str) -> Result<usize>;

    fn count_folders_in_folder(&self, identifier: &str, recursive: bool) -> Result<usize> {
        Ok(self
            .get_folders_in_folder(identifier, 0, 0, recursive, false)?
            .len())
    }

    fn is_folder_empty(&self, identifier: &str) -> Result<bool> {
        let files = self.count_files_in_folder(identifier)?;
        let folders = self.count_folders_in_folder(identifier, false)?;
        Ok(files + folders == 0)
    }

    /// True if `candidate` lives somewhere below `container`. Never fails,
    /// foreign or malformed tokens are simply not within.
    fn is_within(&self, container: &str, candidate: &str) -> bool;

    /// Path to a local copy of the asset, valid until the driver is dropped.
    /// The driver is read-only, so `writable` is accepted and ignored.
    fn get_file_for_local_processing(&self, identifier: &str, writable: bool) -> Result<PathBuf>;

    fn get_permissions(&self, _identifier: &str) -> Permissions {
        Permissions::READ_ONLY
    }
}

/// A host file reference: the identifier plus the driver type of its storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub driver_type: String,
    pub identifier: String,
}

impl FileRef {
    pub fn new(driver_type: &str, identifier: &str) -> Self {
        Self {
            driver_type: driver_type.to_string(),
            identifier: identifier.to_string(),
        }
    }
}

/// Something the host wants a public URL for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    File(FileRef),
    /// A derivative (thumbnail, crop) the host generated from an original file.
    Processed { original: FileRef },
}

impl Resource {
    pub fn original(&self) -> &FileRef {
        match self {
            Resource::File(file) => file,
            Resource::Processed { original } => original,
        }
    }
}

/// Public URL for a host resource, if `driver` is responsible for it.
///
/// Processed resources resolve through their original. Resources of other storage types
/// yield `None` so the host falls back to its own URL. A malformed identifier is logged and
/// yields `None` as well.
pub fn resolve_public_url<D: StorageDriver + ?Sized>(
    resource: &Resource,
    driver: &D,
) -> Result<Option<String>> {
    let file = resource.original();
    if file.driver_type != driver.driver_type() {
        return Ok(None);
    }
    match driver.get_public_url(&file.identifier) {
        Err(DamError::MalformedIdentifier(token)) => {
            tracing::warn!(identifier = %token, "cannot build public url for malformed identifier");
            Ok(None)
        }
        other => other,
    }
}
