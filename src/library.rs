// SPDX-License-Identifier: MPL-2.0
//! Library facade.
//!
//! [`PhotoLibrary`] is the synchronous entry point: it owns one open
//! framework session, the transaction queue that serializes mutations on it,
//! and, for libraries opened at an explicit path, the read-only metadata
//! store.
//!
//! The process can address libraries in one of two ways, and the choice is
//! one-way: it starts in default mode (the user's system library) and flips
//! to explicit-path mode on the first [`PhotoLibrary::open`] or
//! [`PhotoLibrary::create`]. Once flipped, default-mode construction fails
//! for the rest of the process. This mirrors the framework's own constraint
//! that the two addressing styles cannot be mixed in one process.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::album::Album;
use crate::asset::Asset;
use crate::bridge::{self, OneShot};
use crate::domain::{AccessLevel, LocalIdentifier};
use crate::error::{Error, Result};
use crate::framework::{AuthorizationStatus, LibrarySession, PhotosFramework};
use crate::metadata_store::MetadataStore;
use crate::observer::{AssetChanges, ChangeMonitor};
use crate::transactions::TransactionQueue;

/// How this process addresses photo libraries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryMode {
    /// The user's default (system) library.
    Default,
    /// Libraries opened at explicit filesystem paths.
    ExplicitPath,
}

static MODE: Mutex<LibraryMode> = Mutex::new(LibraryMode::Default);

/// The process-wide library mode.
pub fn library_mode() -> LibraryMode {
    *MODE.lock().expect("library mode poisoned")
}

fn claim_default_mode() -> Result<()> {
    let mode = MODE.lock().expect("library mode poisoned");
    match *mode {
        LibraryMode::Default => Ok(()),
        LibraryMode::ExplicitPath => Err(Error::Mode(
            "process already opened a library at an explicit path".to_string(),
        )),
    }
}

fn claim_explicit_mode() {
    *MODE.lock().expect("library mode poisoned") = LibraryMode::ExplicitPath;
}

/// Shared state behind every facade object of one library.
pub(crate) struct LibraryCore {
    pub(crate) session: Arc<dyn LibrarySession>,
    pub(crate) queue: TransactionQueue,
    store: Option<MetadataStore>,
    mode: LibraryMode,
}

impl LibraryCore {
    pub(crate) fn new(
        session: Arc<dyn LibrarySession>,
        store: Option<MetadataStore>,
        mode: LibraryMode,
    ) -> Self {
        Self {
            session,
            queue: TransactionQueue::new(),
            store,
            mode,
        }
    }

    pub(crate) fn refetch_asset(&self, uuid: &str) -> Result<crate::domain::AssetMetadata> {
        self.session
            .fetch_assets(&[uuid])
            .pop()
            .ok_or_else(|| Error::FetchFailed(format!("no asset with uuid {}", uuid)))
    }

    pub(crate) fn refetch_album(&self, uuid: &str) -> Result<crate::domain::AlbumMetadata> {
        self.session
            .fetch_albums(false)
            .into_iter()
            .find(|album| album.local_identifier.uuid() == uuid)
            .ok_or_else(|| Error::FetchFailed(format!("no album with uuid {}", uuid)))
    }

    /// The metadata store, available only for explicit-path libraries.
    pub(crate) fn metadata_store(&self) -> Result<&MetadataStore> {
        self.store.as_ref().ok_or_else(|| {
            Error::Mode("operation requires a library opened at an explicit path".to_string())
        })
    }
}

/// One open photo library.
pub struct PhotoLibrary {
    framework: Arc<dyn PhotosFramework>,
    core: Arc<LibraryCore>,
}

impl std::fmt::Debug for PhotoLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotoLibrary")
            .field("mode", &self.core.mode)
            .finish_non_exhaustive()
    }
}

impl PhotoLibrary {
    /// Opens the user's default library. Fails with a mode error if this
    /// process has already opened a library at an explicit path, and with an
    /// authorization error if access is not granted.
    pub fn new(framework: Arc<dyn PhotosFramework>) -> Result<Self> {
        claim_default_mode()?;
        ensure_authorized(framework.as_ref())?;
        let session = framework.default_session().map_err(Error::FetchFailed)?;
        Ok(Self {
            framework,
            core: Arc::new(LibraryCore::new(session, None, LibraryMode::Default)),
        })
    }

    /// Opens the library rooted at `path`, flipping the process into
    /// explicit-path mode.
    pub fn open(framework: Arc<dyn PhotosFramework>, path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        claim_explicit_mode();
        let session = framework.session_at(path).map_err(Error::FetchFailed)?;
        let store = MetadataStore::open(path)?;
        Ok(Self {
            framework,
            core: Arc::new(LibraryCore::new(
                session,
                Some(store),
                LibraryMode::ExplicitPath,
            )),
        })
    }

    /// Creates a new empty library at `path` and opens it. The path must not
    /// exist yet.
    pub fn create(framework: Arc<dyn PhotosFramework>, path: &Path) -> Result<Self> {
        if path.exists() {
            return Err(Error::FileExists(path.to_path_buf()));
        }
        bridge::run_blocking(|done| framework.create_library(path, done))
            .map_err(Error::CreateLibrary)?;
        Self::open(framework, path)
    }

    /// Filesystem path of the user's system photo library, if known.
    pub fn system_photo_library_path(framework: &dyn PhotosFramework) -> Option<PathBuf> {
        framework.system_library_path()
    }

    pub fn mode(&self) -> LibraryMode {
        self.core.mode
    }

    pub fn library_path(&self) -> Option<PathBuf> {
        self.core.session.library_path()
    }

    pub fn authorization_status(&self, level: AccessLevel) -> AuthorizationStatus {
        self.framework.authorization_status(level)
    }

    // --- assets ---------------------------------------------------------------

    /// Enumerates the library's assets. In explicit-path mode enumeration
    /// goes through the metadata database, which is the only complete source
    /// for such libraries; hidden, trashed, and non-representative burst
    /// assets are excluded.
    pub fn assets(&self) -> Result<Vec<Asset>> {
        let metadata = match self.core.store.as_ref() {
            Some(store) => {
                let uuids = store.asset_uuids(false, false, false)?;
                let refs: Vec<&str> = uuids.iter().map(String::as_str).collect();
                self.core.session.fetch_assets(&refs)
            }
            None => self.core.session.fetch_all_assets(),
        };
        metadata
            .into_iter()
            .map(|m| Asset::from_metadata(Arc::clone(&self.core), m))
            .collect()
    }

    /// Fetches one asset by UUID. Accepts a full local identifier; only the
    /// prefix before the first `/` is significant.
    pub fn asset(&self, uuid: &str) -> Result<Asset> {
        let uuid = uuid.split('/').next().unwrap_or(uuid);
        let metadata = self.core.refetch_asset(uuid)?;
        Asset::from_metadata(Arc::clone(&self.core), metadata)
    }

    /// Fetches assets by UUID, skipping identifiers with no match.
    pub fn assets_by_uuid(&self, uuids: &[&str]) -> Result<Vec<Asset>> {
        let prefixes: Vec<&str> = uuids
            .iter()
            .map(|uuid| uuid.split('/').next().unwrap_or(uuid))
            .collect();
        self.core
            .session
            .fetch_assets(&prefixes)
            .into_iter()
            .map(|m| Asset::from_metadata(Arc::clone(&self.core), m))
            .collect()
    }

    /// Fetches the members of a burst. With `all` false, only representative
    /// members are returned.
    pub fn fetch_burst(&self, burst_id: &str, all: bool) -> Result<Vec<Asset>> {
        self.core
            .session
            .fetch_burst_assets(burst_id, all)
            .into_iter()
            .map(|m| Asset::from_metadata(Arc::clone(&self.core), m))
            .collect()
    }

    /// Number of enumerable assets.
    pub fn count(&self) -> Result<usize> {
        match self.core.store.as_ref() {
            Some(store) => Ok(store.asset_uuids(false, false, false)?.len()),
            None => Ok(self.core.session.fetch_all_assets().len()),
        }
    }

    /// Imports a photo file, returning the new asset.
    pub fn add_photo(&self, path: &Path) -> Result<Asset> {
        self.import(|changes| changes.create_photo(path))
    }

    /// Imports a video file, returning the new asset.
    pub fn add_video(&self, path: &Path) -> Result<Asset> {
        self.import(|changes| changes.create_video(path))
    }

    /// Imports a live photo from its still and paired-video files.
    pub fn add_live_photo(&self, photo: &Path, video: &Path) -> Result<Asset> {
        self.import(|changes| changes.create_live_photo(photo, video))
    }

    /// Imports a RAW+JPEG pair as one asset with the JPEG as primary.
    pub fn add_raw_pair(&self, raw: &Path, jpeg: &Path) -> Result<Asset> {
        self.import(|changes| changes.create_raw_pair(raw, jpeg))
    }

    fn import(
        &self,
        build: impl FnOnce(&mut crate::transactions::ChangeSet) -> Result<LocalIdentifier>,
    ) -> Result<Asset> {
        let placeholders =
            self.core
                .queue
                .perform(self.core.session.as_ref(), Error::Import, |changes| {
                    build(changes)?;
                    Ok(())
                })?;
        let placeholder = placeholders
            .first()
            .ok_or_else(|| Error::Import("transaction allocated no placeholder".to_string()))?;
        self.asset(placeholder.uuid())
    }

    /// Deletes assets from the library in one transaction.
    pub fn delete_assets(&self, assets: &[Asset]) -> Result<()> {
        let ids: Vec<LocalIdentifier> = assets
            .iter()
            .map(|asset| asset.local_identifier().clone())
            .collect();
        self.core
            .queue
            .perform(self.core.session.as_ref(), Error::Mutation, |changes| {
                changes.delete_assets(&ids);
                Ok(())
            })?;
        Ok(())
    }

    // --- albums -----------------------------------------------------------------

    /// Enumerates user albums, optionally only top-level ones. In
    /// explicit-path mode the album set comes from the metadata database.
    pub fn albums(&self, top_level: bool) -> Result<Vec<Album>> {
        let metadata = match self.core.store.as_ref() {
            Some(store) => {
                let uuids = store.album_uuids(top_level)?;
                self.core
                    .session
                    .fetch_albums(false)
                    .into_iter()
                    .filter(|album| uuids.iter().any(|u| u == album.local_identifier.uuid()))
                    .collect()
            }
            None => self.core.session.fetch_albums(top_level),
        };
        Ok(metadata
            .into_iter()
            .map(|m| Album::new(Arc::clone(&self.core), m))
            .collect())
    }

    pub fn album_by_uuid(&self, uuid: &str) -> Result<Album> {
        let uuid = uuid.split('/').next().unwrap_or(uuid);
        let metadata = self.core.refetch_album(uuid)?;
        Ok(Album::new(Arc::clone(&self.core), metadata))
    }

    /// Finds the first album with the given title.
    pub fn album_by_title(&self, title: &str) -> Result<Album> {
        self.core
            .session
            .fetch_albums(false)
            .into_iter()
            .find(|album| album.title == title)
            .map(|m| Album::new(Arc::clone(&self.core), m))
            .ok_or_else(|| Error::FetchFailed(format!("no album titled {:?}", title)))
    }

    /// Creates an empty album.
    pub fn create_album(&self, title: &str) -> Result<Album> {
        let placeholders =
            self.core
                .queue
                .perform(self.core.session.as_ref(), Error::AlbumCreate, |changes| {
                    changes.create_album(title);
                    Ok(())
                })?;
        let placeholder = placeholders
            .first()
            .ok_or_else(|| Error::AlbumCreate("transaction allocated no placeholder".to_string()))?;
        self.album_by_uuid(placeholder.uuid())
    }

    /// Deletes an album. Its member assets stay in the library.
    pub fn delete_album(&self, album: Album) -> Result<()> {
        let id = album.local_identifier().clone();
        self.core
            .queue
            .perform(self.core.session.as_ref(), Error::AlbumDelete, |changes| {
                changes.delete_album(&id);
                Ok(())
            })?;
        Ok(())
    }

    // --- observation ------------------------------------------------------------

    /// Builds a change monitor over this library. Batch members are
    /// classified facade assets, usable directly from the callback. The
    /// monitor reports nothing until started and pumped; see
    /// [`ChangeMonitor`].
    pub fn monitor(&self, handler: impl FnMut(AssetChanges) + 'static) -> ChangeMonitor {
        ChangeMonitor::new(Arc::clone(&self.core), handler)
    }
}

/// Checks authorization and, if undetermined, prompts. The prompt is retried
/// once: the first request can race the user dismissing the dialog.
fn ensure_authorized(framework: &dyn PhotosFramework) -> Result<()> {
    if framework
        .authorization_status(AccessLevel::ReadWrite)
        .is_granted()
    {
        return Ok(());
    }
    for _ in 0..2 {
        let latch: Arc<OneShot<AuthorizationStatus>> = OneShot::new();
        let signal = Arc::clone(&latch);
        framework.request_authorization(
            AccessLevel::ReadWrite,
            Box::new(move |status| signal.post(status)),
        );
        if latch.wait().is_granted() {
            return Ok(());
        }
    }
    Err(Error::Authorization(
        "library access was not granted".to_string(),
    ))
}
