// SPDX-License-Identifier: MPL-2.0
//! Port to the native photo-library framework.
//!
//! The engines and facades talk to the framework exclusively through the
//! traits in this module. Asynchronous operations take boxed `Send`
//! callbacks and may invoke them from any framework-internal thread; the
//! completion bridge turns those invocations back into blocking calls.
//! Failure values on this seam are plain native description strings; the
//! engines convert them into typed [`crate::error::Error`] categories.
//!
//! [`simulated`] provides the in-process adapter used by tests.

pub mod simulated;

use crate::bridge::Completion;
use crate::domain::{
    AccessLevel, AlbumMetadata, AssetMetadata, AssetVersion, CompositionHandle, ImageRecord,
    LivePhotoResources, LocalIdentifier, Location, ResourceDescriptor, VideoRecord,
};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Library authorization status as reported by the framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    /// The user has not been asked yet.
    NotDetermined,
    Restricted,
    Denied,
    Authorized,
    /// Access limited to a user-selected subset of the library.
    Limited,
}

impl AuthorizationStatus {
    /// Whether this status permits the requested operations at all.
    pub fn is_granted(self) -> bool {
        matches!(
            self,
            AuthorizationStatus::Authorized | AuthorizationStatus::Limited
        )
    }
}

/// One result delivery of a live-photo request. The framework may deliver a
/// degraded preliminary result before the final one, so the handler is
/// invoked one or more times.
#[derive(Debug, Clone)]
pub struct LivePhotoDelivery {
    pub resources: LivePhotoResources,
    pub degraded: bool,
}

/// Terminal and non-terminal states of a composition export session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportStatus {
    Waiting,
    Exporting,
    Completed,
    Failed(String),
    Cancelled,
}

impl ExportStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExportStatus::Waiting | ExportStatus::Exporting)
    }
}

/// A running composition export. The framework exposes only a pollable
/// status for these; there is no completion callback.
pub trait ExportSession: Send {
    fn status(&self) -> ExportStatus;
    /// Destination file the session writes to.
    fn output_path(&self) -> &Path;
}

/// One source file of an asset-creation operation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewResource {
    pub resource_type: crate::domain::ResourceType,
    pub path: PathBuf,
}

/// One operation inside a change transaction. Collected by the transaction
/// engine's builder and submitted as a batch through
/// [`LibrarySession::perform_changes`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeOp {
    CreateAsset {
        placeholder: LocalIdentifier,
        resources: Vec<NewResource>,
    },
    DeleteAssets(Vec<LocalIdentifier>),
    CreateAlbum {
        placeholder: LocalIdentifier,
        title: String,
    },
    DeleteAlbum(LocalIdentifier),
    AddAlbumMembers {
        album: LocalIdentifier,
        assets: Vec<LocalIdentifier>,
    },
    RemoveAlbumMembers {
        album: LocalIdentifier,
        assets: Vec<LocalIdentifier>,
    },
    SetFavorite {
        asset: LocalIdentifier,
        value: bool,
    },
    SetCreationDate {
        asset: LocalIdentifier,
        value: Option<DateTime<Utc>>,
    },
    SetModificationDate {
        asset: LocalIdentifier,
        value: Option<DateTime<Utc>>,
    },
    SetLocation {
        asset: LocalIdentifier,
        value: Option<Location>,
    },
    SetKeywords {
        asset: LocalIdentifier,
        values: Vec<String>,
    },
    /// Explicit-path libraries only; written to the library database.
    SetDateAdded {
        asset: LocalIdentifier,
        value: DateTime<Utc>,
    },
    /// Explicit-path libraries only; written to the library database.
    SetTimezone {
        asset: LocalIdentifier,
        offset_secs: i32,
        name: String,
    },
}

/// Result handler of an image data request.
pub type ImageHandler = Box<dyn FnOnce(std::result::Result<ImageRecord, String>) + Send + 'static>;

/// Result handler of a video request.
pub type VideoHandler = Box<dyn FnOnce(std::result::Result<VideoRecord, String>) + Send + 'static>;

/// Streaming chunk handler of a resource data request. Invoked zero or more
/// times before the completion handler fires.
pub type ChunkHandler = Box<dyn FnMut(Vec<u8>) + Send + 'static>;

/// Result handler of a live-photo request; invoked per delivery.
pub type LivePhotoHandler =
    Box<dyn FnMut(std::result::Result<LivePhotoDelivery, String>) + Send + 'static>;

/// Raw library-changed notification. Carries no payload; observers re-fetch
/// and diff on their own.
pub type ObserverCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Opaque registration token returned by observer registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverToken(pub u64);

/// Entry point to the native framework.
pub trait PhotosFramework: Send + Sync {
    fn authorization_status(&self, level: AccessLevel) -> AuthorizationStatus;

    /// Prompts for authorization if not determined; the completion reports
    /// the resulting status from an arbitrary thread.
    fn request_authorization(
        &self,
        level: AccessLevel,
        completion: Box<dyn FnOnce(AuthorizationStatus) + Send + 'static>,
    );

    /// Opens the user's default (system) library.
    fn default_session(&self) -> std::result::Result<Arc<dyn LibrarySession>, String>;

    /// Opens the library rooted at `path`.
    fn session_at(&self, path: &Path) -> std::result::Result<Arc<dyn LibrarySession>, String>;

    /// Creates a new empty library at `path`. Asynchronous.
    fn create_library(&self, path: &Path, completion: Completion);

    fn system_library_path(&self) -> Option<PathBuf>;
}

/// One open library.
pub trait LibrarySession: Send + Sync {
    // --- synchronous accessors -------------------------------------------

    /// Fetches asset snapshots by durable UUID, in request order, skipping
    /// unknown UUIDs.
    fn fetch_assets(&self, uuids: &[&str]) -> Vec<AssetMetadata>;

    fn fetch_all_assets(&self) -> Vec<AssetMetadata>;

    /// Fetches album snapshots, optionally restricted to top-level albums.
    fn fetch_albums(&self, top_level: bool) -> Vec<AlbumMetadata>;

    fn fetch_assets_in_album(&self, album: &LocalIdentifier) -> Vec<AssetMetadata>;

    /// Fetches members of a burst. With `all` false, only representative
    /// (user-selected or automatically picked) members are returned.
    fn fetch_burst_assets(&self, burst_id: &str, all: bool) -> Vec<AssetMetadata>;

    /// Typed resources of one asset.
    fn resources(&self, asset: &LocalIdentifier) -> Vec<ResourceDescriptor>;

    /// Root directory of this library, when it is file-backed.
    fn library_path(&self) -> Option<PathBuf>;

    // --- asynchronous requests -------------------------------------------

    fn request_image_data(
        &self,
        asset: &LocalIdentifier,
        version: AssetVersion,
        handler: ImageHandler,
    );

    fn request_video(&self, asset: &LocalIdentifier, version: AssetVersion, handler: VideoHandler);

    /// Streams the bytes of one typed resource through `chunks`, then
    /// invokes `completion` exactly once.
    fn request_resource(
        &self,
        resource: &ResourceDescriptor,
        version: AssetVersion,
        chunks: ChunkHandler,
        completion: Completion,
    );

    /// Requests a live photo. The handler may first receive a degraded
    /// delivery, then the final one; it is never invoked again after a
    /// non-degraded delivery or an error.
    fn request_live_photo(
        &self,
        asset: &LocalIdentifier,
        version: AssetVersion,
        handler: LivePhotoHandler,
    );

    /// Submits one change transaction; all ops commit or none do.
    fn perform_changes(&self, ops: Vec<ChangeOp>, completion: Completion);

    // --- observation ------------------------------------------------------

    fn register_observer(&self, callback: ObserverCallback) -> ObserverToken;

    fn unregister_observer(&self, token: ObserverToken);

    // --- composition export ----------------------------------------------

    /// Starts exporting an in-memory composition to `dest`. Progress is
    /// observable only through the returned session's status.
    fn begin_composition_export(
        &self,
        handle: &CompositionHandle,
        dest: &Path,
    ) -> std::result::Result<Box<dyn ExportSession>, String>;
}
