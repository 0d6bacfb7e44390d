//! # Repository Layer
//!
//! The driver never talks to the DAM directly. It goes through the [`Repository`] trait, the
//! gateway contract, which in turn sits on top of a [`RemoteApi`], the raw transport.
//!
//! ```text
//! DamDriver<R: Repository>
//!        │
//!        ▼
//! CachedRepository<A: RemoteApi>      memoization, pagination caps, local copies
//!        │
//!        ▼
//! RemoteApi                           HTTP client, snapshot file, in-memory fake
//! ```
//!
//! ## Why Two Traits
//!
//! The split mirrors the difference between "what" and "how":
//! - [`RemoteApi`] answers raw questions (does this asset exist, what are the bytes) and
//!   knows nothing about caching. Absence is `Ok(None)`, only transport problems are errors.
//! - [`Repository`] is what the driver is written against. It turns absence into
//!   [`DamError::NotFound`] / [`DamError::FolderDoesNotExist`], memoizes lookups for the
//!   lifetime of the instance, and owns temp-file creation for local processing.
//!
//! Tests substitute either layer: `memory::MemRemote` under a real `CachedRepository` to
//! check caching, or a hand-rolled `Repository` when only driver logic matters.
//!
//! ## Implementations
//!
//! - [`cached::CachedRepository`]: the production gateway.
//! - `memory::MemRemote` (tests and the `test_utils` feature): in-memory remote with call counters and failure injection.
//! - [`snapshot::SnapshotRemote`]: serves a DAM library exported as JSON from disk.
//!
//! [`DamError::NotFound`]: crate::error::DamError::NotFound
//! [`DamError::FolderDoesNotExist`]: crate::error::DamError::FolderDoesNotExist

use crate::config::DriverConfig;
use crate::error::Result;
use crate::identifier::{CombinedIdentifier, Scheme};
use crate::model::{AssetRecord, AssetSearch, FolderRecord, FolderTree, SortBy, SortDirection};
use crate::transient::LocalCopy;
use std::io::Write;

pub mod cached;
#[cfg(any(test, feature = "test_utils"))]
pub mod memory;
pub mod snapshot;

pub use cached::CachedRepository;

/// Largest page the remote listing endpoint serves.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Raw access to a DAM library.
pub trait RemoteApi {
    /// Authenticate against the tenant described by `config`.
    fn authorize(&self, config: &DriverConfig) -> Result<()>;

    /// Asset details, `None` if the asset does not exist.
    fn fetch_asset(&self, scheme: Scheme, id: &str, use_mdc: bool) -> Result<Option<AssetRecord>>;

    /// Folder or album details, `None` if the container does not exist.
    fn fetch_folder(&self, scheme: Scheme, id: &str) -> Result<Option<FolderRecord>>;

    /// The complete container hierarchy.
    fn fetch_tree(&self, sort_by: SortBy, direction: SortDirection) -> Result<FolderTree>;

    /// One page of the assets filed in an album.
    fn list_album(
        &self,
        album_id: &str,
        start: usize,
        limit: usize,
        sort_by: SortBy,
        direction: SortDirection,
    ) -> Result<Vec<AssetRecord>>;

    fn count_album(&self, album_id: &str) -> Result<usize>;

    /// Streams the original bytes of an asset into `out`, returning the byte count.
    fn download(&self, scheme: Scheme, id: &str, out: &mut dyn Write) -> Result<u64>;

    /// Delivery URL of an asset, without transformation suffixes.
    fn mdc_base_url(&self, id: &str) -> Result<String>;

    fn search(&self, search: &AssetSearch) -> Result<Vec<AssetRecord>>;
}

/// Gateway contract the driver is written against.
///
/// All methods take `&self`; implementations handle caching through interior
/// mutability, since the driver is single-threaded.
pub trait Repository {
    fn initialize(&self, config: &DriverConfig) -> Result<()>;

    /// Memoized per `(scheme, id, use_mdc)`.
    fn get_file_details(&self, scheme: Scheme, id: &str, use_mdc: bool) -> Result<AssetRecord>;

    /// Memoized per `(scheme, id)`. Fails with `FolderDoesNotExist`.
    fn get_folder_details(&self, scheme: Scheme, id: &str) -> Result<FolderRecord>;

    fn get_folder_identifier_tree(
        &self,
        sort_by: SortBy,
        direction: SortDirection,
    ) -> Result<FolderTree>;

    /// At most [`MAX_PAGE_SIZE`] records, no automatic pagination.
    fn get_files_in_folder(
        &self,
        album_id: &str,
        start: usize,
        limit: usize,
        sort_by: SortBy,
        direction: SortDirection,
    ) -> Result<Vec<AssetRecord>>;

    fn count_files_in_folder(&self, album_id: &str) -> Result<usize>;

    /// Downloads the asset exactly once per call into a fresh local copy.
    fn get_file_for_local_processing(&self, identifier: &CombinedIdentifier) -> Result<LocalCopy>;

    fn generate_mdc_base_url(&self, id: &str) -> Result<String>;

    /// Seeds the file-details cache with a record the caller already holds.
    fn set_file_cache(&self, identifier: &CombinedIdentifier, record: AssetRecord);

    fn search(&self, search: &AssetSearch) -> Result<Vec<AssetRecord>>;
}
