//! # damfal Architecture
//!
//! damfal exposes a remote Digital Asset Management (DAM) library as a **read-only storage**
//! for a host content-management system. Folders, albums and assets live in the DAM; the host
//! browses them through the same file-abstraction-layer (FAL) contract it uses for local
//! disks, and never keeps asset bytes around except transiently for processing.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI (main.rs, args.rs)                                     │
//! │  - Browses a library through the driver, formats output     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Driver (driver.rs, implements fal::StorageDriver)          │
//! │  - Decodes identifiers, projects remote records             │
//! │  - Listings, existence checks, local copies, public URLs    │
//! └─────────────────────────────────────────────────────────────┘
//!                   │                          │
//!                   ▼                          ▼
//! ┌──────────────────────────────┐  ┌──────────────────────────┐
//! │  Repository (repository/)    │  │  MDC URLs (mdc.rs)       │
//! │  - Memoizing gateway         │◄─│  - resize/crop/format    │
//! │  - RemoteApi transports      │  │    suffixes              │
//! └──────────────────────────────┘  └──────────────────────────┘
//! ```
//!
//! ## Identifiers
//!
//! Every file and folder is addressed by a combined identifier, `scheme#remote-id[#mdc]`.
//! See [`identifier`] for the grammar. The driver never needs a remote call to tell a folder
//! from an asset.
//!
//! ## Testing Strategy
//!
//! 1. **Driver and MDC logic**: unit tests against `repository::memory::MemRemote`, an
//!    in-memory DAM with call counters and failure injection, wrapped in the real
//!    [`repository::CachedRepository`].
//! 2. **Caching**: the same fake, counting remote round-trips.
//! 3. **End to end**: `tests/` writes a library snapshot into a temp dir and drives both the
//!    library and the `damfal` binary against it.
//!
//! ## Module Overview
//!
//! - [`identifier`]: combined identifier codec
//! - [`model`]: remote record shapes, folder tree, sorting, remote dates
//! - [`repository`]: gateway trait, caching implementation, transports
//! - [`driver`]: the read-only storage driver
//! - [`fal`]: the host-facing capability contract
//! - [`mdc`]: on-the-fly image transformation URLs
//! - [`transient`]: local copies and their cleanup
//! - [`config`]: storage configuration
//! - [`error`]: error types

pub mod config;
pub mod driver;
pub mod error;
pub mod fal;
pub mod identifier;
pub mod mdc;
pub mod model;
pub mod repository;
pub mod transient;
