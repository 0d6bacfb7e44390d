//! # The DAM Driver
//!
//! [`DamDriver`] implements the read-only [`StorageDriver`] contract on top of a
//! [`Repository`]. It owns no remote data itself: every call decodes the combined identifier,
//! asks the repository (which memoizes), and projects the answer into the host's shapes.
//!
//! ## Lifecycle
//!
//! ```text
//! new(repository, config)
//!   ├── config incomplete ──────────────► Misconfigured (remote never touched)
//!   ├── repository.initialize() fails ──► Misconfigured (logged at error level)
//!   └── ok ─────────────────────────────► Ready
//! ...
//! drop ──► transient local copies swept
//! ```
//!
//! A misconfigured driver does not crash the host. Existence checks answer `false`, listings
//! and counts come back empty with a warning, and everything that has to return data fails
//! with [`DamError::Misconfigured`] naming the reason, so an operator can see why the storage
//! looks empty.
//!
//! ## Containers
//!
//! The DAM nests strictly: folders hold folders and albums, albums hold assets. The driver
//! leans on that everywhere. File listings of folders are empty without asking the remote,
//! folder listings of albums likewise, and a container identifier is never a file.
//!
//! ## The Root
//!
//! `folder#ROOT` (any scheme with the remote id `ROOT`, really) is answered locally: it
//! exists, it is its own parent, and its info is synthesized. Storages may be configured to
//! start at a sub-folder instead; that only changes what [`StorageDriver::root_level_folder`]
//! reports, the sentinel keeps working.

use crate::config::DriverConfig;
use crate::error::{DamError, Result};
use crate::fal::{project, Capabilities, FileInfo, FolderInfo, StorageDriver};
use crate::identifier::{decode, validate, CombinedIdentifier, Scheme, ROOT_ID};
use crate::mdc::{decode_url, MdcConfiguration, MdcUrlGenerator, ProcessingTask, SuffixHook};
use crate::model::{flatten, remote_timestamp, AssetRecord, AssetSearch, SortBy, SortDirection};
use crate::repository::{Repository, MAX_PAGE_SIZE};
use crate::transient::{LocalCopy, TransientFiles};
use chrono::Utc;
use serde_json::{Map, Value};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use std::path::PathBuf;

pub const DRIVER_NAME: &str = "Canto";

/// Display name of the synthesized root folder.
pub const ROOT_FOLDER_NAME: &str = "Canto";

#[derive(Debug, Clone, PartialEq, Eq)]
enum DriverState {
    Ready,
    Misconfigured(String),
}

pub struct DamDriver<R: Repository> {
    repository: R,
    config: DriverConfig,
    root_identifier: CombinedIdentifier,
    capabilities: Capabilities,
    state: DriverState,
    transient: TransientFiles,
    mdc: MdcUrlGenerator,
}

impl<R: Repository> DamDriver<R> {
    /// Validates `config` and initializes the repository. Never fails: problems
    /// leave the driver in the misconfigured state.
    pub fn new(repository: R, config: DriverConfig) -> Self {
        let state = match config.validate() {
            Err(e) => {
                tracing::warn!(storage = config.storage_id, error = %e, "storage configuration incomplete");
                DriverState::Misconfigured(e.to_string())
            }
            Ok(()) => match repository.initialize(&config) {
                Ok(()) => DriverState::Ready,
                Err(e) => {
                    tracing::error!(storage = config.storage_id, error = %e, "repository initialization failed");
                    DriverState::Misconfigured(e.to_string())
                }
            },
        };

        Self {
            root_identifier: config.root_identifier(),
            mdc: MdcUrlGenerator::new(config.master_image_size),
            capabilities: Capabilities::BROWSABLE,
            transient: TransientFiles::new(),
            repository,
            config,
            state,
        }
    }

    /// Replaces the suffix hook used for every MDC URL this driver builds.
    pub fn with_suffix_hook(mut self, hook: impl SuffixHook + 'static) -> Self {
        self.mdc = MdcUrlGenerator::new(self.config.master_image_size).with_hook(hook);
        self
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn is_ready(&self) -> bool {
        self.state == DriverState::Ready
    }

    /// Why the driver refuses remote operations, if it does.
    pub fn misconfiguration(&self) -> Option<&str> {
        match &self.state {
            DriverState::Ready => None,
            DriverState::Misconfigured(reason) => Some(reason),
        }
    }

    /// Keeps only the capabilities both sides support.
    pub fn merge_configuration_capabilities(&mut self, capabilities: Capabilities) -> Capabilities {
        self.capabilities = self.capabilities & capabilities;
        self.capabilities
    }

    pub fn root_identifier(&self) -> &CombinedIdentifier {
        &self.root_identifier
    }

    fn ready(&self) -> Result<&R> {
        match &self.state {
            DriverState::Ready => Ok(&self.repository),
            DriverState::Misconfigured(reason) => Err(DamError::Misconfigured(reason.clone())),
        }
    }

    /// Repository for listings: `None` (with a warning) when misconfigured.
    fn ready_for_listing(&self, identifier: &str) -> Option<&R> {
        match &self.state {
            DriverState::Ready => Some(&self.repository),
            DriverState::Misconfigured(reason) => {
                tracing::warn!(identifier, reason = %reason, "listing unavailable, driver is misconfigured");
                None
            }
        }
    }

    fn root_folder_info(&self) -> FolderInfo {
        let now = Utc::now().timestamp();
        FolderInfo {
            identifier: CombinedIdentifier::root().to_string(),
            name: ROOT_FOLDER_NAME.to_string(),
            mtime: now,
            ctime: now,
            storage: self.config.storage_id,
        }
    }

    fn file_info(&self, token: &str, record: &AssetRecord) -> FileInfo {
        FileInfo {
            size: record.defaults.size.unwrap_or(0),
            atime: Utc::now().timestamp(),
            mtime: remote_timestamp(record.defaults.date_modified.as_deref()),
            ctime: remote_timestamp(record.defaults.date_uploaded.as_deref()),
            mimetype: record.defaults.content_type.clone().unwrap_or_default(),
            name: record.name.clone(),
            extension: record.extension(),
            identifier: token.to_string(),
            identifier_hash: self.hash_identifier(token),
            storage: self.config.storage_id,
            folder_hash: String::new(),
            folder_identifiers: record
                .related_folder_identifiers()
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    /// A local copy the caller owns; the file is gone when the handle drops.
    pub fn materialize(&self, identifier: &str) -> Result<LocalCopy> {
        let identifier = decode(identifier)?;
        if identifier.is_container() {
            return Err(DamError::NotFound {
                scheme: identifier.scheme.to_string(),
                id: identifier.remote_id,
            });
        }
        self.ready()?.get_file_for_local_processing(&identifier)
    }

    /// Original bytes of an asset. The local copy is released before returning.
    pub fn get_file_contents(&self, identifier: &str) -> Result<Vec<u8>> {
        let copy = self.materialize(identifier)?;
        copy.read()
    }

    /// Hex digest of the identifier string itself, not of the file content.
    pub fn hash(&self, identifier: &str, algorithm: &str) -> Result<String> {
        match algorithm.to_ascii_lowercase().as_str() {
            "sha1" => Ok(hex::encode(Sha1::digest(identifier.as_bytes()))),
            "sha256" => Ok(hex::encode(Sha256::digest(identifier.as_bytes()))),
            other => Err(DamError::UnsupportedHashAlgorithm(other.to_string())),
        }
    }

    /// Stable sha1 key for an identifier.
    pub fn hash_identifier(&self, identifier: &str) -> String {
        let canonical = canonicalize(identifier);
        hex::encode(Sha1::digest(canonical.as_bytes()))
    }

    /// Identifiers are global, so the folder plays no part.
    pub fn get_file_in_folder(&self, name: &str, _folder: &str) -> String {
        name.to_string()
    }

    pub fn get_folder_in_folder(&self, name: &str, _folder: &str) -> String {
        name.to_string()
    }

    /// True if `name_or_id` is `container` itself or one of its ancestors.
    ///
    /// Only the remote id part of `name_or_id` is compared against the container's id path.
    pub fn folder_exists_in_folder(&self, name_or_id: &str, container: &str) -> bool {
        if name_or_id == container {
            return true;
        }
        let Ok(container) = decode(container) else {
            return false;
        };
        let Ok(repository) = self.ready() else {
            return false;
        };
        let record = match repository.get_folder_details(container.scheme, &container.remote_id) {
            Ok(record) => record,
            Err(e) => {
                if !e.is_not_found() {
                    tracing::warn!(container = %container, error = %e, "folder lookup failed");
                }
                return false;
            }
        };
        let remote_id = decode(name_or_id)
            .map(|id| id.remote_id)
            .unwrap_or_else(|_| name_or_id.to_string());
        record.id_path_segments().contains(&remote_id.as_str())
    }

    /// True if the asset is filed in `folder` (directly, albums are flat).
    pub fn file_exists_in_folder(&self, file: &str, folder: &str) -> bool {
        let (Ok(file), Ok(folder)) = (decode(file), decode(folder)) else {
            return false;
        };
        if file.is_container() {
            return false;
        }
        let Ok(repository) = self.ready() else {
            return false;
        };
        match repository.get_file_details(file.scheme, &file.remote_id, file.mdc) {
            Ok(record) => record
                .related_albums
                .iter()
                .any(|album| album.scheme == folder.scheme && album.id == folder.remote_id),
            Err(e) => {
                if !e.is_not_found() {
                    tracing::warn!(file = %file, error = %e, "file lookup failed");
                }
                false
            }
        }
    }

    /// True if the asset is filed in `container` or in an album anywhere below it.
    fn asset_within(&self, file: &CombinedIdentifier, container: &CombinedIdentifier) -> bool {
        let Ok(repository) = self.ready() else {
            return false;
        };
        let record = match repository.get_file_details(file.scheme, &file.remote_id, file.mdc) {
            Ok(record) => record,
            Err(e) => {
                if !e.is_not_found() {
                    tracing::warn!(file = %file, error = %e, "file lookup failed");
                }
                return false;
            }
        };
        if container.is_root() {
            return true;
        }
        record.related_albums.iter().any(|album| {
            if album.scheme == container.scheme && album.id == container.remote_id {
                return true;
            }
            if container.scheme != Scheme::Folder {
                return false;
            }
            match repository.get_folder_details(album.scheme, &album.id) {
                Ok(folder) => folder
                    .id_path_segments()
                    .contains(&container.remote_id.as_str()),
                Err(e) => {
                    if !e.is_not_found() {
                        tracing::warn!(album = %album.id, error = %e, "album lookup failed");
                    }
                    false
                }
            }
        })
    }

    /// Keyword search over approved assets.
    pub fn search(&self, search: &AssetSearch) -> Result<Vec<AssetRecord>> {
        self.ready()?.search(search)
    }

    /// Delivery URL for a processing task.
    pub fn generate_mdc_url(&self, task: &ProcessingTask) -> Result<String> {
        self.mdc.generate(self.ready()?, task)
    }

    pub fn resolve_display_dimensions(&self, task: &ProcessingTask) -> Result<(u64, u64)> {
        self.mdc.resolve_display_dimensions(self.ready()?, task)
    }

    /// Deletes the local copies handed out so far. Also runs on drop.
    pub fn sweep_transient_files(&self) -> usize {
        self.transient.sweep()
    }

    pub fn transient_file_count(&self) -> usize {
        self.transient.len()
    }
}

/// Identifier canonicalization. Tokens are already canonical.
fn canonicalize(identifier: &str) -> &str {
    identifier
}

impl<R: Repository> StorageDriver for DamDriver<R> {
    fn driver_type(&self) -> &str {
        DRIVER_NAME
    }

    fn storage_id(&self) -> u32 {
        self.config.storage_id
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn root_level_folder(&self) -> String {
        self.root_identifier.to_string()
    }

    fn default_folder(&self) -> String {
        self.root_identifier.to_string()
    }

    fn file_exists(&self, identifier: &str) -> bool {
        let Ok(id) = decode(identifier) else {
            return false;
        };
        if id.is_container() {
            return false;
        }
        let Ok(repository) = self.ready() else {
            return false;
        };
        match repository.get_file_details(id.scheme, &id.remote_id, id.mdc) {
            Ok(_) => true,
            Err(e) => {
                if !e.is_not_found() {
                    tracing::warn!(identifier, error = %e, "file existence check failed");
                }
                false
            }
        }
    }

    fn folder_exists(&self, identifier: &str) -> bool {
        let Ok(id) = decode(identifier) else {
            return false;
        };
        if id.is_root() {
            return true;
        }
        if !id.is_container() {
            return false;
        }
        let Ok(repository) = self.ready() else {
            return false;
        };
        match repository.get_folder_details(id.scheme, &id.remote_id) {
            Ok(_) => true,
            Err(e) => {
                if !e.is_not_found() {
                    tracing::warn!(identifier, error = %e, "folder existence check failed");
                }
                false
            }
        }
    }

    fn get_file_info(
        &self,
        identifier: &str,
        requested_fields: &[&str],
    ) -> Result<Map<String, Value>> {
        let id = decode(identifier)?;
        if id.is_container() {
            return project(&self.get_folder_info(identifier)?, &[]);
        }
        let record = self
            .ready()?
            .get_file_details(id.scheme, &id.remote_id, id.mdc)?;
        project(&self.file_info(identifier, &record), requested_fields)
    }

    fn get_folder_info(&self, identifier: &str) -> Result<FolderInfo> {
        if identifier.is_empty() || identifier == ROOT_ID {
            return Ok(self.root_folder_info());
        }
        let id = decode(identifier)?;
        if id.is_root() {
            return Ok(self.root_folder_info());
        }
        if !id.is_container() {
            return Err(DamError::FolderDoesNotExist(identifier.to_string()));
        }
        let record = self
            .ready()?
            .get_folder_details(id.scheme, &id.remote_id)?;
        let tag = match id.scheme {
            Scheme::Album => "A",
            _ => "F",
        };
        Ok(FolderInfo {
            identifier: identifier.to_string(),
            name: format!("{}: {}", tag, record.name),
            mtime: remote_timestamp(record.time.as_deref()),
            ctime: remote_timestamp(record.created.as_deref()),
            storage: self.config.storage_id,
        })
    }

    fn get_parent_identifier(&self, identifier: &str) -> Result<String> {
        if identifier.is_empty() {
            return Ok(String::new());
        }
        let id = decode(identifier)?;
        if id.is_root() {
            return Ok(identifier.to_string());
        }
        if !id.is_container() {
            // Assets can be filed in several albums.
            return Ok(String::new());
        }
        let record = self
            .ready()?
            .get_folder_details(id.scheme, &id.remote_id)?;
        let segments = record.id_path_segments();
        match segments.len() {
            0 | 1 => Ok(self.root_identifier.to_string()),
            n => Ok(CombinedIdentifier::new(Scheme::Folder, segments[n - 2]).to_string()),
        }
    }

    fn get_public_url(&self, identifier: &str) -> Result<Option<String>> {
        let id = decode(identifier)?;
        let repository = self.ready()?;
        let record = repository.get_file_details(id.scheme, &id.remote_id, id.mdc)?;
        if id.mdc {
            let base = repository.generate_mdc_base_url(&id.remote_id)?;
            let configuration = match record.native_dimensions() {
                Some((width, height)) => MdcConfiguration::scaled(width, height),
                None => MdcConfiguration::default(),
            };
            let url = format!("{}{}", base, self.mdc.compose_suffix(&configuration));
            return Ok(Some(decode_url(&url)));
        }
        Ok(record
            .url
            .direct_url_original
            .as_deref()
            .filter(|url| !url.is_empty())
            .map(decode_url))
    }

    fn get_files_in_folder(
        &self,
        identifier: &str,
        start: usize,
        limit: usize,
        _recursive: bool,
        sort: &str,
        sort_reverse: bool,
    ) -> Result<Vec<CombinedIdentifier>> {
        let id = decode(identifier)?;
        // Only albums hold assets, and albums are flat.
        if id.scheme != Scheme::Album || id.is_root() {
            return Ok(Vec::new());
        }
        let Some(repository) = self.ready_for_listing(identifier) else {
            return Ok(Vec::new());
        };

        let limit = if limit > 0 {
            limit.min(MAX_PAGE_SIZE)
        } else {
            MAX_PAGE_SIZE
        };
        let records = match repository.get_files_in_folder(
            &id.remote_id,
            start,
            limit,
            SortBy::from_host_key(sort),
            SortDirection::from_reverse(sort_reverse),
        ) {
            Ok(records) => records,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        Ok(records
            .into_iter()
            .map(|record| {
                let file = record.identifier();
                repository.set_file_cache(&file, record);
                file
            })
            .collect())
    }

    fn get_folders_in_folder(
        &self,
        identifier: &str,
        start: usize,
        limit: usize,
        recursive: bool,
        sort_reverse: bool,
    ) -> Result<Vec<CombinedIdentifier>> {
        let id = decode(identifier)?;
        if !id.is_container() || id.scheme == Scheme::Album {
            return Ok(Vec::new());
        }
        let Some(repository) = self.ready_for_listing(identifier) else {
            return Ok(Vec::new());
        };

        let tree = repository
            .get_folder_identifier_tree(SortBy::Name, SortDirection::from_reverse(sort_reverse))?;

        let nodes = if id.is_root() {
            &tree.nodes[..]
        } else {
            let record = match repository.get_folder_details(id.scheme, &id.remote_id) {
                Ok(record) => record,
                Err(e) if e.is_not_found() => return Ok(Vec::new()),
                Err(e) => return Err(e),
            };
            let segments = record.id_path_segments();
            let last = segments.len().saturating_sub(1);
            // Ancestors can only be folders; the container itself keeps its scheme.
            let path: Vec<CombinedIdentifier> = segments
                .iter()
                .enumerate()
                .map(|(i, segment)| {
                    let scheme = if i == last { record.scheme } else { Scheme::Folder };
                    CombinedIdentifier::new(scheme, *segment)
                })
                .collect();
            match tree.subtree(&path) {
                Some(nodes) => nodes,
                None => {
                    tracing::debug!(identifier, id_path = %record.id_path, "container not found in tree");
                    return Ok(Vec::new());
                }
            }
        };

        let identifiers = if recursive {
            flatten(nodes)
        } else {
            nodes.iter().map(|node| node.identifier.clone()).collect()
        };
        let take = if limit > 0 { limit } else { usize::MAX };
        Ok(identifiers.into_iter().skip(start).take(take).collect())
    }

    fn count_files_in_folder(&self, identifier: &str) -> Result<usize> {
        let id = decode(identifier)?;
        if id.scheme != Scheme::Album || id.is_root() {
            return Ok(0);
        }
        let Some(repository) = self.ready_for_listing(identifier) else {
            return Ok(0);
        };
        match repository.count_files_in_folder(&id.remote_id) {
            Ok(count) => Ok(count),
            Err(e) if e.is_not_found() => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn is_within(&self, container: &str, candidate: &str) -> bool {
        // The host probes with identifiers of unrelated storages.
        if !validate(container) || !validate(candidate) {
            return false;
        }
        let (Ok(container_id), Ok(candidate_id)) = (decode(container), decode(candidate)) else {
            return false;
        };
        if !container_id.is_container() {
            return false;
        }
        if candidate_id.is_container() {
            if container_id.is_root() {
                return true;
            }
            // The container is an ancestor (or self) of the candidate folder.
            return self.folder_exists_in_folder(container, candidate);
        }
        self.asset_within(&candidate_id, &container_id)
    }

    fn get_file_for_local_processing(&self, identifier: &str, _writable: bool) -> Result<PathBuf> {
        let copy = self.materialize(identifier)?;
        Ok(self.transient.register(copy))
    }
}

impl<R: Repository> Drop for DamDriver<R> {
    fn drop(&mut self) {
        let removed = self.transient.sweep();
        if removed > 0 {
            tracing::debug!(storage = self.config.storage_id, removed, "driver teardown removed local copies");
        }
    }
}
