//! A [`RemoteApi`] backed by a DAM library exported to disk.
//!
//! ```text
//! library/
//! ├── library.json        # tree, folder records, asset records
//! └── files/              # original bytes, referenced per asset
//! ```
//!
//! `library.json`:
//!
//! ```json
//! {
//!   "tenant": "acme",
//!   "mdcBaseUrl": "https://acme.canto.com/direct/image",
//!   "tree": [{"id": "F1", "scheme": "folder", "name": "Marketing", "children": []}],
//!   "folders": [{"id": "F1", "scheme": "folder", "name": "Marketing", "idPath": "F1"}],
//!   "assets": [{"record": {"id": "a1", "scheme": "image", "name": "a.jpg"}, "file": "files/a.jpg"}]
//! }
//! ```
//!
//! The snapshot is read once at open time; it is never written.

use super::RemoteApi;
use crate::config::DriverConfig;
use crate::error::{DamError, Result};
use crate::identifier::Scheme;
use crate::model::{
    sort_assets, AssetRecord, AssetSearch, FolderRecord, FolderTree, SortBy, SortDirection,
};
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const SNAPSHOT_FILENAME: &str = "library.json";

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotAsset {
    pub record: AssetRecord,
    /// Path of the original bytes, relative to the snapshot directory.
    #[serde(default)]
    pub file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Library {
    #[serde(default)]
    tenant: Option<String>,
    mdc_base_url: String,
    #[serde(default)]
    tree: FolderTree,
    #[serde(default)]
    folders: Vec<FolderRecord>,
    #[serde(default)]
    assets: Vec<SnapshotAsset>,
}

pub struct SnapshotRemote {
    root: PathBuf,
    library: Library,
}

impl SnapshotRemote {
    /// Opens `library.json` in `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let data_file = root.join(SNAPSHOT_FILENAME);
        if !data_file.exists() {
            return Err(DamError::RemoteUnavailable(format!(
                "no library snapshot at {}",
                data_file.display()
            )));
        }
        let content = fs::read_to_string(&data_file).map_err(DamError::Io)?;
        let library: Library = serde_json::from_str(&content).map_err(DamError::Serialization)?;
        tracing::debug!(
            path = %data_file.display(),
            folders = library.folders.len(),
            assets = library.assets.len(),
            "opened library snapshot"
        );
        Ok(Self { root, library })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn find_asset(&self, scheme: Scheme, id: &str) -> Option<&SnapshotAsset> {
        self.library
            .assets
            .iter()
            .find(|asset| asset.record.scheme == scheme && asset.record.id == id)
    }

    fn album_assets(&self, album_id: &str) -> Vec<AssetRecord> {
        self.library
            .assets
            .iter()
            .map(|asset| &asset.record)
            .filter(|record| {
                record
                    .related_albums
                    .iter()
                    .any(|album| album.scheme == Scheme::Album && album.id == album_id)
            })
            .cloned()
            .collect()
    }
}

impl RemoteApi for SnapshotRemote {
    fn authorize(&self, config: &DriverConfig) -> Result<()> {
        match &self.library.tenant {
            Some(tenant) if tenant != &config.canto_name => Err(DamError::AuthorizationFailed(
                format!("snapshot belongs to tenant {:?}", tenant),
            )),
            _ => Ok(()),
        }
    }

    fn fetch_asset(&self, scheme: Scheme, id: &str, _use_mdc: bool) -> Result<Option<AssetRecord>> {
        Ok(self.find_asset(scheme, id).map(|asset| asset.record.clone()))
    }

    fn fetch_folder(&self, scheme: Scheme, id: &str) -> Result<Option<FolderRecord>> {
        Ok(self
            .library
            .folders
            .iter()
            .find(|folder| folder.scheme == scheme && folder.id == id)
            .cloned())
    }

    fn fetch_tree(&self, _sort_by: SortBy, direction: SortDirection) -> Result<FolderTree> {
        let mut tree = self.library.tree.clone();
        tree.sort_by_name(direction);
        Ok(tree)
    }

    fn list_album(
        &self,
        album_id: &str,
        start: usize,
        limit: usize,
        sort_by: SortBy,
        direction: SortDirection,
    ) -> Result<Vec<AssetRecord>> {
        let mut assets = self.album_assets(album_id);
        sort_assets(&mut assets, sort_by, direction);
        Ok(assets.into_iter().skip(start).take(limit).collect())
    }

    fn count_album(&self, album_id: &str) -> Result<usize> {
        Ok(self.album_assets(album_id).len())
    }

    fn download(&self, scheme: Scheme, id: &str, out: &mut dyn Write) -> Result<u64> {
        let not_found = || DamError::NotFound {
            scheme: scheme.to_string(),
            id: id.to_string(),
        };
        let relative = self
            .find_asset(scheme, id)
            .and_then(|asset| asset.file.as_deref())
            .ok_or_else(not_found)?;
        let mut file = File::open(self.root.join(relative)).map_err(DamError::Io)?;
        let copied = io::copy(&mut file, out).map_err(DamError::Io)?;
        Ok(copied)
    }

    fn mdc_base_url(&self, id: &str) -> Result<String> {
        Ok(format!(
            "{}/{}",
            self.library.mdc_base_url.trim_end_matches('/'),
            id
        ))
    }

    fn search(&self, search: &AssetSearch) -> Result<Vec<AssetRecord>> {
        Ok(self
            .library
            .assets
            .iter()
            .map(|asset| &asset.record)
            .filter(|record| search.matches(record))
            .skip(search.start)
            .take(search.limit)
            .cloned()
            .collect())
    }
}
