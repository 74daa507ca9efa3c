// SPDX-License-Identifier: MPL-2.0
//! Synchronous object API over an asynchronous photo-library framework.
//!
//! The native framework answers every data request and change transaction
//! through callbacks invoked on its own threads. This crate turns that
//! surface into ordinary blocking calls: [`PhotoLibrary`] opens a library,
//! [`Asset`] and [`Album`] wrap fetched records, and every operation returns
//! a [`Result`] once the framework has actually finished.
//!
//! ```no_run
//! use std::sync::Arc;
//! use photobridge::{framework::simulated::SimulatedFramework, PhotoLibrary};
//!
//! let framework = Arc::new(SimulatedFramework::new());
//! let library = PhotoLibrary::new(framework)?;
//! for asset in library.assets()? {
//!     println!("{} ({})", asset.original_filename(), asset.uuid());
//! }
//! # Ok::<(), photobridge::Error>(())
//! ```
//!
//! Callbacks cross threads through the completion bridge in [`bridge`];
//! mutations batch through [`transactions`]; change notifications resolve to
//! diffs in [`observer`]. The [`framework`] module defines the port traits
//! the engines run against, along with a fully asynchronous in-process
//! adapter used by the test suite.

pub mod album;
pub mod asset;
pub mod bridge;
pub mod domain;
pub mod error;
pub mod framework;
pub mod library;
pub mod metadata_store;
pub mod observer;
pub mod pathutil;
pub mod requests;
pub mod transactions;
pub mod uti;

pub use album::Album;
pub use asset::{Asset, ExportOptions, LivePhotoAsset, PhotoAsset, VideoAsset};
pub use domain::{
    AccessLevel, AlbumMetadata, AssetMetadata, AssetVersion, LocalIdentifier, Location, MediaKind,
    MediaSubtypes, TimezoneInfo,
};
pub use error::{Error, Result};
pub use library::{library_mode, LibraryMode, PhotoLibrary};
pub use observer::{AssetChanges, ChangeMonitor};
