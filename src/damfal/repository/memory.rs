use super::RemoteApi;
use crate::config::DriverConfig;
use crate::error::{DamError, Result};
use crate::identifier::Scheme;
use crate::model::{
    sort_assets, AssetRecord, AssetSearch, FolderRecord, FolderTree, SortBy, SortDirection,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;

/// In-memory DAM for testing.
///
/// Uses `RefCell` for interior mutability since the driver is single-threaded.
/// Every trait call is counted, so tests can assert how many round-trips a code
/// path made.
pub struct MemRemote {
    assets: RefCell<Vec<AssetRecord>>,
    folders: RefCell<HashMap<(Scheme, String), FolderRecord>>,
    tree: RefCell<FolderTree>,
    content: RefCell<HashMap<String, Vec<u8>>>,
    base_url: String,
    calls: RefCell<HashMap<&'static str, usize>>,
    simulate_unavailable: RefCell<bool>,
    reject_authorization: RefCell<bool>,
}

impl Default for MemRemote {
    fn default() -> Self {
        Self {
            assets: RefCell::new(Vec::new()),
            folders: RefCell::new(HashMap::new()),
            tree: RefCell::new(FolderTree::default()),
            content: RefCell::new(HashMap::new()),
            base_url: "https://acme.canto.com/direct/image".to_string(),
            calls: RefCell::new(HashMap::new()),
            simulate_unavailable: RefCell::new(false),
            reject_authorization: RefCell::new(false),
        }
    }
}

impl MemRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tree(self, tree: FolderTree) -> Self {
        *self.tree.borrow_mut() = tree;
        self
    }

    pub fn with_folder(self, record: FolderRecord) -> Self {
        self.folders
            .borrow_mut()
            .insert((record.scheme, record.id.clone()), record);
        self
    }

    /// Album membership comes from the record's `related_albums`.
    pub fn with_asset(self, record: AssetRecord) -> Self {
        self.assets.borrow_mut().push(record);
        self
    }

    pub fn with_content(self, id: &str, bytes: &[u8]) -> Self {
        self.content
            .borrow_mut()
            .insert(id.to_string(), bytes.to_vec());
        self
    }

    /// Every call fails with `RemoteUnavailable` while set.
    pub fn set_simulate_unavailable(&self, simulate: bool) {
        *self.simulate_unavailable.borrow_mut() = simulate;
    }

    pub fn set_reject_authorization(&self, reject: bool) {
        *self.reject_authorization.borrow_mut() = reject;
    }

    /// Number of calls made to the named trait method.
    pub fn calls(&self, method: &str) -> usize {
        self.calls.borrow().get(method).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.borrow().values().sum()
    }

    fn record(&self, method: &'static str) -> Result<()> {
        *self.calls.borrow_mut().entry(method).or_insert(0) += 1;
        if *self.simulate_unavailable.borrow() {
            return Err(DamError::RemoteUnavailable(format!(
                "simulated outage in {}",
                method
            )));
        }
        Ok(())
    }

    fn album_assets(&self, album_id: &str) -> Vec<AssetRecord> {
        self.assets
            .borrow()
            .iter()
            .filter(|asset| {
                asset
                    .related_albums
                    .iter()
                    .any(|album| album.scheme == Scheme::Album && album.id == album_id)
            })
            .cloned()
            .collect()
    }
}

impl RemoteApi for MemRemote {
    fn authorize(&self, _config: &DriverConfig) -> Result<()> {
        self.record("authorize")?;
        if *self.reject_authorization.borrow() {
            return Err(DamError::AuthorizationFailed("invalid app secret".into()));
        }
        Ok(())
    }

    fn fetch_asset(&self, scheme: Scheme, id: &str, _use_mdc: bool) -> Result<Option<AssetRecord>> {
        self.record("fetch_asset")?;
        Ok(self
            .assets
            .borrow()
            .iter()
            .find(|asset| asset.scheme == scheme && asset.id == id)
            .cloned())
    }

    fn fetch_folder(&self, scheme: Scheme, id: &str) -> Result<Option<FolderRecord>> {
        self.record("fetch_folder")?;
        Ok(self.folders.borrow().get(&(scheme, id.to_string())).cloned())
    }

    fn fetch_tree(&self, _sort_by: SortBy, direction: SortDirection) -> Result<FolderTree> {
        self.record("fetch_tree")?;
        let mut tree = self.tree.borrow().clone();
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
        self.record("list_album")?;
        let mut assets = self.album_assets(album_id);
        sort_assets(&mut assets, sort_by, direction);
        Ok(assets.into_iter().skip(start).take(limit).collect())
    }

    fn count_album(&self, album_id: &str) -> Result<usize> {
        self.record("count_album")?;
        Ok(self.album_assets(album_id).len())
    }

    fn download(&self, scheme: Scheme, id: &str, out: &mut dyn Write) -> Result<u64> {
        self.record("download")?;
        let content = self.content.borrow();
        let bytes = content.get(id).ok_or_else(|| DamError::NotFound {
            scheme: scheme.to_string(),
            id: id.to_string(),
        })?;
        out.write_all(bytes)?;
        Ok(bytes.len() as u64)
    }

    fn mdc_base_url(&self, id: &str) -> Result<String> {
        self.record("mdc_base_url")?;
        Ok(format!("{}/{}", self.base_url, id))
    }

    fn search(&self, search: &AssetSearch) -> Result<Vec<AssetRecord>> {
        self.record("search")?;
        Ok(self
            .assets
            .borrow()
            .iter()
            .filter(|asset| search.matches(asset))
            .skip(search.start)
            .take(search.limit)
            .cloned()
            .collect())
    }
}

// --- Test Fixtures ---

pub mod fixtures {
    //! A small library shared by the unit tests:
    //!
    //! ```text
    //! folder#F1 Marketing
    //! ├── album#A1 Campaign      image#img1 .. image#img6
    //! └── folder#F2 Events
    //!     └── album#A2 Fair      document#doc1
    //! album#A3 Logos             image#logo (4000x3000, direct url)
    //! ```

    use super::*;
    use crate::identifier::CombinedIdentifier;
    use crate::model::{FolderNode, RelatedAlbum};

    pub fn folder(scheme: Scheme, id: &str, name: &str, id_path: &str) -> FolderRecord {
        FolderRecord {
            id: id.to_string(),
            scheme,
            name: name.to_string(),
            id_path: id_path.to_string(),
            time: Some("20230102030405".to_string()),
            created: Some("20220101000000".to_string()),
        }
    }

    pub fn asset(scheme: Scheme, id: &str, name: &str, album: &str) -> AssetRecord {
        let mut record = AssetRecord::new(scheme, id, name);
        record.related_albums.push(RelatedAlbum {
            scheme: Scheme::Album,
            id: album.to_string(),
        });
        record.defaults.content_type = Some("image/jpeg".to_string());
        record.defaults.date_uploaded = Some("20220301000000".to_string());
        record
    }

    fn node(scheme: Scheme, id: &str, name: &str, children: Vec<FolderNode>) -> FolderNode {
        FolderNode::new(CombinedIdentifier::new(scheme, id), name).with_children(children)
    }

    pub fn tree() -> FolderTree {
        FolderTree::new(vec![
            node(
                Scheme::Folder,
                "F1",
                "Marketing",
                vec![
                    node(Scheme::Album, "A1", "Campaign", vec![]),
                    node(
                        Scheme::Folder,
                        "F2",
                        "Events",
                        vec![node(Scheme::Album, "A2", "Fair", vec![])],
                    ),
                ],
            ),
            node(Scheme::Album, "A3", "Logos", vec![]),
        ])
    }

    pub fn library() -> MemRemote {
        let mut remote = MemRemote::new()
            .with_tree(tree())
            .with_folder(folder(Scheme::Folder, "F1", "Marketing", "F1"))
            .with_folder(folder(Scheme::Album, "A1", "Campaign", "F1/A1"))
            .with_folder(folder(Scheme::Folder, "F2", "Events", "F1/F2"))
            .with_folder(folder(Scheme::Album, "A2", "Fair", "F1/F2/A2"))
            .with_folder(folder(Scheme::Album, "A3", "Logos", "A3"));

        for i in 1..=6 {
            let mut photo = asset(
                Scheme::Image,
                &format!("img{}", i),
                &format!("photo-{}.jpg", i),
                "A1",
            );
            photo.defaults.size = Some(1000 * i as u64);
            photo.defaults.date_modified = Some(format!("2023010{}120000", i));
            remote = remote.with_asset(photo);
        }

        let mut brochure = asset(Scheme::Document, "doc1", "brochure.pdf", "A2");
        brochure.defaults.content_type = Some("application/pdf".to_string());
        brochure.defaults.size = Some(52_000);

        let mut logo = asset(Scheme::Image, "logo", "logo.png", "A3");
        logo.width = Some(4000);
        logo.height = Some(3000);
        logo.defaults.size = Some(123_456);
        logo.defaults.content_type = Some("image/png".to_string());
        logo.defaults.date_modified = Some("20230601101500000".to_string());
        logo.url.direct_url_original = Some("https://cdn.acme.test/logo%20final.png".to_string());

        remote
            .with_asset(brochure)
            .with_asset(logo)
            .with_content("logo", b"\x89PNG fake")
            .with_content("doc1", b"%PDF-1.7")
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::library;
    use super::*;

    #[test]
    fn test_list_album_paginates_and_sorts() {
        let remote = library();
        let page = remote
            .list_album("A1", 2, 3, SortBy::Name, SortDirection::Ascending)
            .unwrap();
        let names: Vec<_> = page.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["photo-3.jpg", "photo-4.jpg", "photo-5.jpg"]);

        let newest = remote
            .list_album("A1", 0, 1, SortBy::Time, SortDirection::Descending)
            .unwrap();
        assert_eq!(newest[0].id, "img6");
    }

    #[test]
    fn test_count_album() {
        let remote = library();
        assert_eq!(remote.count_album("A1").unwrap(), 6);
        assert_eq!(remote.count_album("A2").unwrap(), 1);
        assert_eq!(remote.count_album("nope").unwrap(), 0);
    }

    #[test]
    fn test_missing_records_are_none() {
        let remote = library();
        assert!(remote.fetch_asset(Scheme::Image, "nope", false).unwrap().is_none());
        assert!(remote.fetch_folder(Scheme::Album, "F1").unwrap().is_none());
        assert!(remote.fetch_folder(Scheme::Folder, "F1").unwrap().is_some());
    }

    #[test]
    fn test_calls_are_counted() {
        let remote = library();
        remote.fetch_asset(Scheme::Image, "logo", false).unwrap();
        remote.fetch_asset(Scheme::Image, "logo", false).unwrap();
        assert_eq!(remote.calls("fetch_asset"), 2);
        assert_eq!(remote.calls("fetch_folder"), 0);
        assert_eq!(remote.total_calls(), 2);
    }

    #[test]
    fn test_simulated_outage() {
        let remote = library();
        remote.set_simulate_unavailable(true);
        assert!(matches!(
            remote.fetch_tree(SortBy::Name, SortDirection::Ascending),
            Err(DamError::RemoteUnavailable(_))
        ));
        remote.set_simulate_unavailable(false);
        assert!(remote.fetch_tree(SortBy::Name, SortDirection::Ascending).is_ok());
    }

    #[test]
    fn test_download() {
        let remote = library();
        let mut out = Vec::new();
        let n = remote.download(Scheme::Image, "logo", &mut out).unwrap();
        assert_eq!(n, out.len() as u64);
        assert!(out.starts_with(b"\x89PNG"));
        assert!(remote
            .download(Scheme::Image, "img1", &mut Vec::new())
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_search() {
        let remote = library();
        let hits = remote.search(&AssetSearch::new("PHOTO").with_limit(4)).unwrap();
        assert_eq!(hits.len(), 4);
        let docs = remote
            .search(&AssetSearch::new("").with_schemes(vec![Scheme::Document]))
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "doc1");
    }
}
