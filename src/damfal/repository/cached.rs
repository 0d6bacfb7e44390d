use super::{RemoteApi, Repository, MAX_PAGE_SIZE};
use crate::config::DriverConfig;
use crate::error::{DamError, Result};
use crate::identifier::{CombinedIdentifier, Scheme};
use crate::model::{AssetRecord, AssetSearch, FolderRecord, FolderTree, SortBy, SortDirection};
use crate::transient::LocalCopy;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;

type FileKey = (Scheme, String, bool);
type FolderKey = (Scheme, String);

/// The production [`Repository`]: memoizes lookups on top of a [`RemoteApi`].
///
/// Caches live as long as the instance and are never evicted. A fresh instance
/// per request is what keeps them from going stale.
pub struct CachedRepository<A: RemoteApi> {
    remote: A,
    files: RefCell<HashMap<FileKey, AssetRecord>>,
    folders: RefCell<HashMap<FolderKey, FolderRecord>>,
    trees: RefCell<HashMap<(SortBy, SortDirection), FolderTree>>,
    temp_dir: Option<PathBuf>,
}

impl<A: RemoteApi> CachedRepository<A> {
    pub fn new(remote: A) -> Self {
        Self {
            remote,
            files: RefCell::new(HashMap::new()),
            folders: RefCell::new(HashMap::new()),
            trees: RefCell::new(HashMap::new()),
            temp_dir: None,
        }
    }

    /// Local copies are created in `dir` instead of the system temp dir.
    pub fn with_temp_dir(mut self, dir: PathBuf) -> Self {
        self.temp_dir = Some(dir);
        self
    }

    pub fn remote(&self) -> &A {
        &self.remote
    }
}

impl<A: RemoteApi> Repository for CachedRepository<A> {
    fn initialize(&self, config: &DriverConfig) -> Result<()> {
        tracing::debug!(storage = config.storage_id, tenant = %config.base_url(), "authorizing");
        self.remote.authorize(config)
    }

    fn get_file_details(&self, scheme: Scheme, id: &str, use_mdc: bool) -> Result<AssetRecord> {
        let key = (scheme, id.to_string(), use_mdc);
        if let Some(record) = self.files.borrow().get(&key) {
            tracing::trace!(%scheme, id, "file details cache hit");
            return Ok(record.clone());
        }

        tracing::debug!(%scheme, id, use_mdc, "fetching file details");
        let record = self
            .remote
            .fetch_asset(scheme, id, use_mdc)?
            .ok_or_else(|| DamError::NotFound {
                scheme: scheme.to_string(),
                id: id.to_string(),
            })?;
        self.files.borrow_mut().insert(key, record.clone());
        Ok(record)
    }

    fn get_folder_details(&self, scheme: Scheme, id: &str) -> Result<FolderRecord> {
        let key = (scheme, id.to_string());
        if let Some(record) = self.folders.borrow().get(&key) {
            tracing::trace!(%scheme, id, "folder details cache hit");
            return Ok(record.clone());
        }

        tracing::debug!(%scheme, id, "fetching folder details");
        let record = self.remote.fetch_folder(scheme, id)?.ok_or_else(|| {
            DamError::FolderDoesNotExist(CombinedIdentifier::new(scheme, id).to_string())
        })?;
        self.folders.borrow_mut().insert(key, record.clone());
        Ok(record)
    }

    fn get_folder_identifier_tree(
        &self,
        sort_by: SortBy,
        direction: SortDirection,
    ) -> Result<FolderTree> {
        if let Some(tree) = self.trees.borrow().get(&(sort_by, direction)) {
            tracing::trace!(?sort_by, ?direction, "folder tree cache hit");
            return Ok(tree.clone());
        }

        tracing::debug!(?sort_by, ?direction, "fetching folder tree");
        let tree = self.remote.fetch_tree(sort_by, direction)?;
        self.trees
            .borrow_mut()
            .insert((sort_by, direction), tree.clone());
        Ok(tree)
    }

    fn get_files_in_folder(
        &self,
        album_id: &str,
        start: usize,
        limit: usize,
        sort_by: SortBy,
        direction: SortDirection,
    ) -> Result<Vec<AssetRecord>> {
        let limit = limit.min(MAX_PAGE_SIZE);
        tracing::debug!(album_id, start, limit, ?sort_by, ?direction, "listing album");
        self.remote
            .list_album(album_id, start, limit, sort_by, direction)
    }

    fn count_files_in_folder(&self, album_id: &str) -> Result<usize> {
        tracing::debug!(album_id, "counting album");
        self.remote.count_album(album_id)
    }

    fn get_file_for_local_processing(&self, identifier: &CombinedIdentifier) -> Result<LocalCopy> {
        let record = self.get_file_details(identifier.scheme, &identifier.remote_id, identifier.mdc)?;
        tracing::debug!(%identifier, "downloading for local processing");
        LocalCopy::create(self.temp_dir.as_deref(), &record.extension(), |out| {
            self.remote
                .download(identifier.scheme, &identifier.remote_id, out)
        })
    }

    fn generate_mdc_base_url(&self, id: &str) -> Result<String> {
        self.remote.mdc_base_url(id)
    }

    fn set_file_cache(&self, identifier: &CombinedIdentifier, record: AssetRecord) {
        let key = (identifier.scheme, identifier.remote_id.clone(), identifier.mdc);
        self.files.borrow_mut().insert(key, record);
    }

    fn search(&self, search: &AssetSearch) -> Result<Vec<AssetRecord>> {
        tracing::debug!(keyword = %search.keyword, start = search.start, limit = search.limit, status = search.status(), "searching assets");
        let records = self.remote.search(search)?;
        for record in &records {
            self.set_file_cache(&record.identifier(), record.clone());
        }
        Ok(records)
    }
}
