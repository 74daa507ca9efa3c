// SPDX-License-Identifier: MPL-2.0
//! In-process framework adapter.
//!
//! [`SimulatedFramework`] implements the full port against in-memory tables
//! and an on-disk originals store. Every asynchronous operation runs on a
//! spawned worker thread and invokes its callback from that thread, so the
//! completion bridge is exercised exactly as it would be against the real
//! framework. Explicit-path libraries additionally maintain the SQLite
//! metadata database the read-only store expects.
//!
//! The seeding and failure-injection methods exist for tests; they mutate
//! the library directly, bypassing change transactions, and notify
//! registered observers like any other mutation.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::bridge::Completion;
use crate::domain::{
    AccessLevel, AlbumMetadata, AssetMetadata, AssetVersion, CompositionHandle, ImageRecord,
    InfoMap, InfoValue, LivePhotoResources, LocalIdentifier, MediaSubtypes, ResourceDescriptor,
    ResourceType, TimezoneInfo, VideoHandle, VideoRecord, INFO_DEGRADED_KEY, INFO_FILE_PATH_KEY,
};
use crate::framework::{
    AuthorizationStatus, ChangeOp, ChunkHandler, ExportSession, ExportStatus, ImageHandler,
    LibrarySession, LivePhotoDelivery, LivePhotoHandler, ObserverCallback, ObserverToken,
    PhotosFramework, VideoHandler,
};
use crate::metadata_store::{to_photos_epoch, MetadataStore};
use crate::uti::uti_for_filename;

/// Delay before a worker thread delivers its result, long enough to make a
/// caller that forgot to block fail reliably.
const DELIVERY_DELAY: Duration = Duration::from_millis(1);

fn new_identifier() -> LocalIdentifier {
    LocalIdentifier::new(format!(
        "{}/L0/001",
        Uuid::new_v4().to_string().to_uppercase()
    ))
}

// =============================================================================
// Framework
// =============================================================================

pub struct SimulatedFramework {
    root: PathBuf,
    auth: Mutex<AuthorizationStatus>,
    grant_requests: Mutex<bool>,
    sessions: Mutex<Vec<Arc<SimLibrary>>>,
}

impl SimulatedFramework {
    pub fn new() -> Self {
        let root = std::env::temp_dir().join(format!("photobridge-sim-{}", Uuid::new_v4()));
        Self {
            root,
            auth: Mutex::new(AuthorizationStatus::NotDetermined),
            grant_requests: Mutex::new(true),
            sessions: Mutex::new(Vec::new()),
        }
    }

    fn default_library_path(&self) -> PathBuf {
        self.root.join("Default.photoslibrary")
    }

    fn session_for_path(&self, path: &Path, explicit: bool) -> Arc<SimLibrary> {
        let mut sessions = self.sessions.lock().expect("sim sessions poisoned");
        if let Some(existing) = sessions.iter().find(|s| s.inner.root == path) {
            return Arc::clone(existing);
        }
        let library = Arc::new(SimLibrary::new(path.to_path_buf(), explicit));
        sessions.push(Arc::clone(&library));
        library
    }

    fn sim(&self, session: &Arc<dyn LibrarySession>) -> Arc<SimLibrary> {
        let wanted = Arc::as_ptr(session) as *const ();
        let sessions = self.sessions.lock().expect("sim sessions poisoned");
        sessions
            .iter()
            .find(|s| Arc::as_ptr(s) as *const () == wanted)
            .map(Arc::clone)
            .expect("session does not belong to this framework")
    }

    // --- authorization knobs -------------------------------------------------

    pub fn set_authorization(&self, status: AuthorizationStatus) {
        *self.auth.lock().expect("sim auth poisoned") = status;
    }

    /// Makes future authorization requests resolve to Denied.
    pub fn deny_authorization_requests(&self) {
        *self.grant_requests.lock().expect("sim auth poisoned") = false;
    }

    // --- seeding ---------------------------------------------------------------

    pub fn seed_photo(
        &self,
        session: &Arc<dyn LibrarySession>,
        filename: &str,
        bytes: &[u8],
    ) -> LocalIdentifier {
        self.sim(session)
            .inner
            .seed(filename, bytes, 1, MediaSubtypes::default(), None, true, &[])
    }

    pub fn seed_video(
        &self,
        session: &Arc<dyn LibrarySession>,
        filename: &str,
        bytes: &[u8],
    ) -> LocalIdentifier {
        self.sim(session)
            .inner
            .seed(filename, bytes, 2, MediaSubtypes::default(), None, true, &[])
    }

    pub fn seed_slow_mo_video(
        &self,
        session: &Arc<dyn LibrarySession>,
        filename: &str,
        bytes: &[u8],
    ) -> LocalIdentifier {
        self.sim(session).inner.seed(
            filename,
            bytes,
            2,
            MediaSubtypes::default().with(MediaSubtypes::SLOW_MO),
            None,
            true,
            &[],
        )
    }

    pub fn seed_burst_photo(
        &self,
        session: &Arc<dyn LibrarySession>,
        filename: &str,
        bytes: &[u8],
        burst_id: &str,
        picked: bool,
    ) -> LocalIdentifier {
        self.sim(session).inner.seed(
            filename,
            bytes,
            1,
            MediaSubtypes::default(),
            Some(burst_id.to_string()),
            picked,
            &[],
        )
    }

    pub fn seed_live_photo(
        &self,
        session: &Arc<dyn LibrarySession>,
        photo_name: &str,
        photo_bytes: &[u8],
        video_name: &str,
        video_bytes: &[u8],
    ) -> LocalIdentifier {
        self.sim(session).inner.seed(
            photo_name,
            photo_bytes,
            1,
            MediaSubtypes::default().with(MediaSubtypes::LIVE),
            None,
            true,
            &[(ResourceType::PairedVideo, video_name, video_bytes)],
        )
    }

    /// Deletes an asset out from under the session, as an external writer
    /// would.
    pub fn remove_asset(&self, session: &Arc<dyn LibrarySession>, asset: &LocalIdentifier) {
        let sim = self.sim(session);
        {
            let mut state = sim.inner.state.lock().expect("sim state poisoned");
            state.assets.remove(asset.uuid());
            sim.inner.sync_database(&state);
        }
        sim.inner.notify();
    }

    // --- failure injection -------------------------------------------------------

    pub fn fail_next_request(&self, session: &Arc<dyn LibrarySession>, description: &str) {
        *self
            .sim(session)
            .inner
            .fail_request
            .lock()
            .expect("sim poisoned") = Some(description.to_string());
    }

    pub fn fail_next_perform(&self, session: &Arc<dyn LibrarySession>, description: &str) {
        *self
            .sim(session)
            .inner
            .fail_perform
            .lock()
            .expect("sim poisoned") = Some(description.to_string());
    }

    pub fn fail_next_export(&self, session: &Arc<dyn LibrarySession>, description: &str) {
        *self
            .sim(session)
            .inner
            .fail_export
            .lock()
            .expect("sim poisoned") = Some(description.to_string());
    }

    // --- counters -----------------------------------------------------------------

    /// Number of asynchronous data requests submitted on the session.
    pub fn request_count(&self, session: &Arc<dyn LibrarySession>) -> usize {
        self.sim(session).inner.requests.load(Ordering::SeqCst)
    }

    /// Number of image data requests submitted on the session.
    pub fn image_request_count(&self, session: &Arc<dyn LibrarySession>) -> usize {
        self.sim(session).inner.image_requests.load(Ordering::SeqCst)
    }

    /// Number of change transactions submitted on the session.
    pub fn perform_count(&self, session: &Arc<dyn LibrarySession>) -> usize {
        self.sim(session).inner.performs.load(Ordering::SeqCst)
    }
}

impl Default for SimulatedFramework {
    fn default() -> Self {
        Self::new()
    }
}

impl PhotosFramework for SimulatedFramework {
    fn authorization_status(&self, _level: AccessLevel) -> AuthorizationStatus {
        *self.auth.lock().expect("sim auth poisoned")
    }

    fn request_authorization(
        &self,
        _level: AccessLevel,
        completion: Box<dyn FnOnce(AuthorizationStatus) + Send + 'static>,
    ) {
        let granted = *self.grant_requests.lock().expect("sim auth poisoned");
        let status = {
            let mut auth = self.auth.lock().expect("sim auth poisoned");
            if *auth == AuthorizationStatus::NotDetermined {
                *auth = if granted {
                    AuthorizationStatus::Authorized
                } else {
                    AuthorizationStatus::Denied
                };
            }
            *auth
        };
        thread::spawn(move || {
            thread::sleep(DELIVERY_DELAY);
            completion(status);
        });
    }

    fn default_session(&self) -> Result<Arc<dyn LibrarySession>, String> {
        let path = self.default_library_path();
        std::fs::create_dir_all(path.join("originals"))
            .map_err(|err| format!("cannot create default library: {}", err))?;
        Ok(self.session_for_path(&path, false))
    }

    fn session_at(&self, path: &Path) -> Result<Arc<dyn LibrarySession>, String> {
        if !MetadataStore::database_path(path).is_file() {
            return Err(format!("no photo library at {}", path.display()));
        }
        Ok(self.session_for_path(path, true))
    }

    fn create_library(&self, path: &Path, completion: Completion) {
        let path = path.to_path_buf();
        thread::spawn(move || {
            thread::sleep(DELIVERY_DELAY);
            match build_library_skeleton(&path) {
                Ok(()) => completion(true, None),
                Err(description) => completion(false, Some(description)),
            }
        });
    }

    fn system_library_path(&self) -> Option<PathBuf> {
        Some(self.default_library_path())
    }
}

fn build_library_skeleton(path: &Path) -> Result<(), String> {
    std::fs::create_dir_all(path.join("originals"))
        .and_then(|_| std::fs::create_dir_all(path.join("database")))
        .map_err(|err| format!("cannot create library directories: {}", err))?;
    let conn = Connection::open(MetadataStore::database_path(path))
        .map_err(|err| format!("cannot create library database: {}", err))?;
    write_schema(&conn).map_err(|err| format!("cannot write library schema: {}", err))
}

fn write_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS ZASSET (
            Z_PK INTEGER PRIMARY KEY,
            ZUUID TEXT NOT NULL,
            ZHIDDEN INTEGER NOT NULL DEFAULT 0,
            ZTRASHEDSTATE INTEGER NOT NULL DEFAULT 0,
            ZSAVEDASSETTYPE INTEGER NOT NULL DEFAULT 3,
            ZAVALANCHEUUID TEXT,
            ZAVALANCHEPICKTYPE INTEGER NOT NULL DEFAULT 0,
            ZADDEDDATE REAL
        );
        CREATE TABLE IF NOT EXISTS ZADDITIONALASSETATTRIBUTES (
            Z_PK INTEGER PRIMARY KEY,
            ZASSET INTEGER NOT NULL,
            ZTIMEZONEOFFSET INTEGER,
            ZTIMEZONENAME TEXT
        );
        CREATE TABLE IF NOT EXISTS ZGENERICALBUM (
            Z_PK INTEGER PRIMARY KEY,
            ZUUID TEXT NOT NULL,
            ZKIND INTEGER NOT NULL,
            ZTRASHEDSTATE INTEGER NOT NULL DEFAULT 0,
            ZPARENTFOLDER INTEGER
        );
        INSERT INTO ZGENERICALBUM (Z_PK, ZUUID, ZKIND)
            SELECT 1, 'ROOT-FOLDER', 3999
            WHERE NOT EXISTS (SELECT 1 FROM ZGENERICALBUM WHERE Z_PK = 1);",
    )
}

// =============================================================================
// Library session
// =============================================================================

#[derive(Clone)]
struct SimResource {
    resource_type: ResourceType,
    original_filename: String,
    uti: String,
    path: PathBuf,
}

#[derive(Clone)]
struct SimAsset {
    metadata: AssetMetadata,
    resources: Vec<SimResource>,
    date_added: DateTime<Utc>,
    timezone: Option<TimezoneInfo>,
    /// Burst representative flag; always true outside bursts.
    picked: bool,
}

#[derive(Clone)]
struct SimAlbum {
    title: String,
    members: Vec<String>,
}

#[derive(Default, Clone)]
struct LibState {
    assets: BTreeMap<String, SimAsset>,
    albums: BTreeMap<String, SimAlbum>,
    compositions: HashMap<String, PathBuf>,
}

/// One simulated open library. The mutable state lives behind an inner `Arc`
/// so worker threads can outlive the borrow they were spawned from.
pub struct SimLibrary {
    inner: Arc<SimInner>,
}

struct SimInner {
    root: PathBuf,
    explicit: bool,
    state: Mutex<LibState>,
    observers: Mutex<Vec<(u64, ObserverCallback)>>,
    next_observer: AtomicU64,
    requests: AtomicUsize,
    image_requests: AtomicUsize,
    performs: AtomicUsize,
    fail_request: Mutex<Option<String>>,
    fail_perform: Mutex<Option<String>>,
    fail_export: Mutex<Option<String>>,
}

impl SimLibrary {
    fn new(root: PathBuf, explicit: bool) -> Self {
        Self {
            inner: Arc::new(SimInner {
                root,
                explicit,
                state: Mutex::new(LibState::default()),
                observers: Mutex::new(Vec::new()),
                next_observer: AtomicU64::new(1),
                requests: AtomicUsize::new(0),
                image_requests: AtomicUsize::new(0),
                performs: AtomicUsize::new(0),
                fail_request: Mutex::new(None),
                fail_perform: Mutex::new(None),
                fail_export: Mutex::new(None),
            }),
        }
    }
}

impl SimInner {
    fn originals_dir(&self) -> PathBuf {
        self.root.join("originals")
    }

    fn store_bytes(&self, uuid: &str, filename: &str, bytes: &[u8]) -> SimResource {
        let stored = self.originals_dir().join(format!("{}-{}", uuid, filename));
        std::fs::write(&stored, bytes).expect("fixture write failed");
        SimResource {
            resource_type: ResourceType::Photo,
            original_filename: filename.to_string(),
            uti: uti_for_filename(filename),
            path: stored,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn seed(
        &self,
        filename: &str,
        bytes: &[u8],
        kind_raw: i32,
        subtypes: MediaSubtypes,
        burst_identifier: Option<String>,
        picked: bool,
        extra: &[(ResourceType, &str, &[u8])],
    ) -> LocalIdentifier {
        std::fs::create_dir_all(self.originals_dir()).expect("fixture mkdir failed");
        let id = new_identifier();
        let uuid = id.uuid().to_string();

        let mut primary = self.store_bytes(&uuid, filename, bytes);
        primary.resource_type = if kind_raw == 2 {
            ResourceType::Video
        } else {
            ResourceType::Photo
        };
        let mut resources = vec![primary];
        for (resource_type, name, payload) in extra {
            let mut resource = self.store_bytes(&uuid, name, payload);
            resource.resource_type = *resource_type;
            resources.push(resource);
        }

        let now = Utc::now();
        let asset = SimAsset {
            metadata: AssetMetadata {
                local_identifier: id.clone(),
                kind_raw,
                subtypes,
                pixel_width: if kind_raw == 2 { 1920 } else { 3000 },
                pixel_height: if kind_raw == 2 { 1080 } else { 2000 },
                creation_date: Some(now),
                modification_date: Some(now),
                location: None,
                favorite: false,
                hidden: false,
                duration: if kind_raw == 2 { 10.0 } else { 0.0 },
                keywords: Vec::new(),
                burst_identifier,
                original_filename: filename.to_string(),
                raw_filename: None,
                raw_uti: None,
            },
            resources,
            date_added: now,
            timezone: None,
            picked,
        };
        {
            let mut state = self.state.lock().expect("sim state poisoned");
            state.assets.insert(uuid, asset);
            self.sync_database(&state);
        }
        self.notify();
        id
    }

    fn notify(&self) {
        let observers = self.observers.lock().expect("sim observers poisoned");
        for (_, callback) in observers.iter() {
            callback();
        }
    }

    /// Rewrites the mutable rows of the library database from the in-memory
    /// state. No-op for the default library, which has no database.
    fn sync_database(&self, state: &LibState) {
        if !self.explicit {
            return;
        }
        if let Err(err) = self.write_database(state) {
            log::warn!("library database sync failed: {}", err);
        }
    }

    fn write_database(&self, state: &LibState) -> rusqlite::Result<()> {
        let conn = Connection::open(MetadataStore::database_path(&self.root))?;
        write_schema(&conn)?;
        conn.execute_batch(
            "DELETE FROM ZASSET;
             DELETE FROM ZADDITIONALASSETATTRIBUTES;
             DELETE FROM ZGENERICALBUM WHERE ZKIND = 2;",
        )?;
        for (pk, asset) in state.assets.values().enumerate() {
            let pk = pk as i64 + 1;
            conn.execute(
                "INSERT INTO ZASSET (Z_PK, ZUUID, ZHIDDEN, ZTRASHEDSTATE, ZSAVEDASSETTYPE,
                    ZAVALANCHEUUID, ZAVALANCHEPICKTYPE, ZADDEDDATE)
                 VALUES (?1, ?2, ?3, 0, 3, ?4, ?5, ?6)",
                rusqlite::params![
                    pk,
                    asset.metadata.uuid(),
                    asset.metadata.hidden as i64,
                    asset.metadata.burst_identifier,
                    asset.picked as i64,
                    to_photos_epoch(asset.date_added),
                ],
            )?;
            if let Some(tz) = &asset.timezone {
                conn.execute(
                    "INSERT INTO ZADDITIONALASSETATTRIBUTES
                        (ZASSET, ZTIMEZONEOFFSET, ZTIMEZONENAME)
                     VALUES (?1, ?2, ?3)",
                    rusqlite::params![pk, tz.offset_secs, tz.name],
                )?;
            }
        }
        for (pk, (uuid, _album)) in state.albums.iter().enumerate() {
            conn.execute(
                "INSERT INTO ZGENERICALBUM (Z_PK, ZUUID, ZKIND, ZTRASHEDSTATE, ZPARENTFOLDER)
                 VALUES (?1, ?2, 2, 0, 1)",
                rusqlite::params![pk as i64 + 100, uuid],
            )?;
        }
        Ok(())
    }

    fn album_metadata(state: &LibState, uuid: &str, album: &SimAlbum) -> AlbumMetadata {
        let mut dates: Vec<DateTime<Utc>> = album
            .members
            .iter()
            .filter_map(|member| state.assets.get(member))
            .filter_map(|asset| asset.metadata.creation_date)
            .collect();
        dates.sort();
        AlbumMetadata {
            local_identifier: LocalIdentifier::new(format!("{}/L0/040", uuid)),
            title: album.title.clone(),
            estimated_count: album.members.len(),
            start_date: dates.first().copied(),
            end_date: dates.last().copied(),
            approximate_location: None,
        }
    }

    /// Applies one transaction to a staged copy of the state; the copy is
    /// committed only when every op validates.
    fn apply_ops(&self, ops: Vec<ChangeOp>) -> Result<(), String> {
        let mut state = self.state.lock().expect("sim state poisoned");
        let mut staged = state.clone();
        for op in ops {
            apply_one(self, &mut staged, op)?;
        }
        self.sync_database(&staged);
        *state = staged;
        Ok(())
    }
}

fn asset_mut<'a>(state: &'a mut LibState, id: &LocalIdentifier) -> Result<&'a mut SimAsset, String> {
    state
        .assets
        .get_mut(id.uuid())
        .ok_or_else(|| format!("no asset with uuid {}", id.uuid()))
}

fn touch(asset: &mut SimAsset) {
    asset.metadata.modification_date = Some(Utc::now());
}

fn apply_one(library: &SimInner, state: &mut LibState, op: ChangeOp) -> Result<(), String> {
    match op {
        ChangeOp::CreateAsset {
            placeholder,
            resources,
        } => {
            let uuid = placeholder.uuid().to_string();
            std::fs::create_dir_all(library.originals_dir())
                .map_err(|err| format!("cannot extend originals store: {}", err))?;
            let mut stored = Vec::new();
            for resource in &resources {
                let filename = resource
                    .path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .ok_or_else(|| format!("bad resource path {}", resource.path.display()))?;
                let dest = library
                    .originals_dir()
                    .join(format!("{}-{}", uuid, filename));
                std::fs::copy(&resource.path, &dest)
                    .map_err(|err| format!("cannot import {}: {}", resource.path.display(), err))?;
                stored.push(SimResource {
                    resource_type: resource.resource_type,
                    original_filename: filename.clone(),
                    uti: uti_for_filename(&filename),
                    path: dest,
                });
            }

            let has = |t: ResourceType| stored.iter().any(|r| r.resource_type == t);
            let kind_raw = if has(ResourceType::Video) { 2 } else { 1 };
            let subtypes = if has(ResourceType::PairedVideo) {
                MediaSubtypes::default().with(MediaSubtypes::LIVE)
            } else {
                MediaSubtypes::default()
            };
            let primary = stored
                .iter()
                .find(|r| matches!(r.resource_type, ResourceType::Photo | ResourceType::Video))
                .ok_or_else(|| "asset creation needs a primary resource".to_string())?;
            let raw = stored
                .iter()
                .find(|r| r.resource_type == ResourceType::AlternatePhoto);

            let now = Utc::now();
            let asset = SimAsset {
                metadata: AssetMetadata {
                    local_identifier: placeholder.clone(),
                    kind_raw,
                    subtypes,
                    pixel_width: if kind_raw == 2 { 1920 } else { 3000 },
                    pixel_height: if kind_raw == 2 { 1080 } else { 2000 },
                    creation_date: Some(now),
                    modification_date: Some(now),
                    location: None,
                    favorite: false,
                    hidden: false,
                    duration: if kind_raw == 2 { 10.0 } else { 0.0 },
                    keywords: Vec::new(),
                    burst_identifier: None,
                    original_filename: primary.original_filename.clone(),
                    raw_filename: raw.map(|r| r.original_filename.clone()),
                    raw_uti: raw.map(|r| r.uti.clone()),
                },
                resources: stored.clone(),
                date_added: now,
                timezone: None,
                picked: true,
            };
            state.assets.insert(uuid, asset);
            Ok(())
        }
        ChangeOp::DeleteAssets(ids) => {
            for id in &ids {
                if state.assets.remove(id.uuid()).is_none() {
                    return Err(format!("no asset with uuid {}", id.uuid()));
                }
                for album in state.albums.values_mut() {
                    album.members.retain(|member| member != id.uuid());
                }
            }
            Ok(())
        }
        ChangeOp::CreateAlbum { placeholder, title } => {
            state.albums.insert(
                placeholder.uuid().to_string(),
                SimAlbum {
                    title,
                    members: Vec::new(),
                },
            );
            Ok(())
        }
        ChangeOp::DeleteAlbum(id) => state
            .albums
            .remove(id.uuid())
            .map(|_| ())
            .ok_or_else(|| format!("no album with uuid {}", id.uuid())),
        ChangeOp::AddAlbumMembers { album, assets } => {
            for asset in &assets {
                if !state.assets.contains_key(asset.uuid()) {
                    return Err(format!("no asset with uuid {}", asset.uuid()));
                }
            }
            let album = state
                .albums
                .get_mut(album.uuid())
                .ok_or_else(|| format!("no album with uuid {}", album.uuid()))?;
            for asset in assets {
                let uuid = asset.uuid().to_string();
                if !album.members.contains(&uuid) {
                    album.members.push(uuid);
                }
            }
            Ok(())
        }
        ChangeOp::RemoveAlbumMembers { album, assets } => {
            let album = state
                .albums
                .get_mut(album.uuid())
                .ok_or_else(|| format!("no album with uuid {}", album.uuid()))?;
            album
                .members
                .retain(|member| !assets.iter().any(|a| a.uuid() == member));
            Ok(())
        }
        ChangeOp::SetFavorite { asset, value } => {
            let asset = asset_mut(state, &asset)?;
            asset.metadata.favorite = value;
            touch(asset);
            Ok(())
        }
        ChangeOp::SetCreationDate { asset, value } => {
            let asset = asset_mut(state, &asset)?;
            asset.metadata.creation_date = value;
            touch(asset);
            Ok(())
        }
        ChangeOp::SetModificationDate { asset, value } => {
            asset_mut(state, &asset)?.metadata.modification_date = value;
            Ok(())
        }
        ChangeOp::SetLocation { asset, value } => {
            let asset = asset_mut(state, &asset)?;
            asset.metadata.location = value;
            touch(asset);
            Ok(())
        }
        ChangeOp::SetKeywords { asset, values } => {
            let asset = asset_mut(state, &asset)?;
            asset.metadata.keywords = values;
            touch(asset);
            Ok(())
        }
        ChangeOp::SetDateAdded { asset, value } => {
            asset_mut(state, &asset)?.date_added = value;
            Ok(())
        }
        ChangeOp::SetTimezone {
            asset,
            offset_secs,
            name,
        } => {
            asset_mut(state, &asset)?.timezone = Some(TimezoneInfo { offset_secs, name });
            Ok(())
        }
    }
}

impl LibrarySession for SimLibrary {
    fn fetch_assets(&self, uuids: &[&str]) -> Vec<AssetMetadata> {
        let state = self.inner.state.lock().expect("sim state poisoned");
        uuids
            .iter()
            .filter_map(|uuid| state.assets.get(*uuid))
            .map(|asset| asset.metadata.clone())
            .collect()
    }

    fn fetch_all_assets(&self) -> Vec<AssetMetadata> {
        let state = self.inner.state.lock().expect("sim state poisoned");
        state
            .assets
            .values()
            .map(|asset| asset.metadata.clone())
            .collect()
    }

    fn fetch_albums(&self, _top_level: bool) -> Vec<AlbumMetadata> {
        // The simulation has no folder hierarchy; every album is top-level.
        let state = self.inner.state.lock().expect("sim state poisoned");
        state
            .albums
            .iter()
            .map(|(uuid, album)| SimInner::album_metadata(&state, uuid, album))
            .collect()
    }

    fn fetch_assets_in_album(&self, album: &LocalIdentifier) -> Vec<AssetMetadata> {
        let state = self.inner.state.lock().expect("sim state poisoned");
        state
            .albums
            .get(album.uuid())
            .map(|album| {
                album
                    .members
                    .iter()
                    .filter_map(|member| state.assets.get(member))
                    .map(|asset| asset.metadata.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn fetch_burst_assets(&self, burst_id: &str, all: bool) -> Vec<AssetMetadata> {
        let state = self.inner.state.lock().expect("sim state poisoned");
        state
            .assets
            .values()
            .filter(|asset| asset.metadata.burst_identifier.as_deref() == Some(burst_id))
            .filter(|asset| all || asset.picked)
            .map(|asset| asset.metadata.clone())
            .collect()
    }

    fn resources(&self, asset: &LocalIdentifier) -> Vec<ResourceDescriptor> {
        let state = self.inner.state.lock().expect("sim state poisoned");
        state
            .assets
            .get(asset.uuid())
            .map(|entry| {
                entry
                    .resources
                    .iter()
                    .map(|resource| ResourceDescriptor {
                        asset: entry.metadata.local_identifier.clone(),
                        resource_type: resource.resource_type,
                        original_filename: resource.original_filename.clone(),
                        uti: resource.uti.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn library_path(&self) -> Option<PathBuf> {
        Some(self.inner.root.clone())
    }

    fn request_image_data(
        &self,
        asset: &LocalIdentifier,
        _version: AssetVersion,
        handler: ImageHandler,
    ) {
        self.inner.requests.fetch_add(1, Ordering::SeqCst);
        self.inner.image_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(description) = self
            .inner
            .fail_request
            .lock()
            .expect("sim poisoned")
            .take()
        {
            thread::spawn(move || {
                thread::sleep(DELIVERY_DELAY);
                handler(Err(description));
            });
            return;
        }
        let resource = {
            let state = self.inner.state.lock().expect("sim state poisoned");
            state.assets.get(asset.uuid()).and_then(|entry| {
                entry
                    .resources
                    .iter()
                    .find(|r| r.resource_type == ResourceType::Photo)
                    .cloned()
            })
        };
        let uuid = asset.uuid().to_string();
        thread::spawn(move || {
            thread::sleep(DELIVERY_DELAY);
            let Some(resource) = resource else {
                handler(Err(format!("no image resource for asset {}", uuid)));
                return;
            };
            match std::fs::read(&resource.path) {
                Ok(data) => {
                    let mut info = InfoMap::new();
                    info.insert(INFO_DEGRADED_KEY.to_string(), InfoValue::Bool(false));
                    info.insert(
                        INFO_FILE_PATH_KEY.to_string(),
                        InfoValue::Path(resource.path.clone()),
                    );
                    handler(Ok(ImageRecord {
                        data,
                        uti: resource.uti,
                        orientation: 1,
                        degraded: false,
                        info,
                    }));
                }
                Err(err) => handler(Err(err.to_string())),
            }
        });
    }

    fn request_video(
        &self,
        asset: &LocalIdentifier,
        version: AssetVersion,
        handler: VideoHandler,
    ) {
        self.inner.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(description) = self
            .inner
            .fail_request
            .lock()
            .expect("sim poisoned")
            .take()
        {
            thread::spawn(move || {
                thread::sleep(DELIVERY_DELAY);
                handler(Err(description));
            });
            return;
        }
        let prepared = {
            let mut state = self.inner.state.lock().expect("sim state poisoned");
            let entry = state.assets.get(asset.uuid()).cloned();
            entry.and_then(|entry| {
                let resource = entry.resources.iter().find(|r| {
                    matches!(
                        r.resource_type,
                        ResourceType::Video | ResourceType::PairedVideo
                    )
                })?;
                // Slow-motion edits surface as in-memory compositions unless
                // the original rendition is requested.
                if entry.metadata.subtypes.slow_mo() && version != AssetVersion::Original {
                    let handle = CompositionHandle {
                        id: Uuid::new_v4().to_string(),
                        track_count: 2,
                    };
                    state
                        .compositions
                        .insert(handle.id.clone(), resource.path.clone());
                    Some(VideoHandle::Composition(handle))
                } else {
                    Some(VideoHandle::File(resource.path.clone()))
                }
            })
        };
        let uuid = asset.uuid().to_string();
        thread::spawn(move || {
            thread::sleep(DELIVERY_DELAY);
            match prepared {
                Some(handle) => {
                    let mut info = InfoMap::new();
                    if let VideoHandle::File(path) = &handle {
                        info.insert(
                            INFO_FILE_PATH_KEY.to_string(),
                            InfoValue::Path(path.clone()),
                        );
                    }
                    handler(Ok(VideoRecord { handle, info }));
                }
                None => handler(Err(format!("no video resource for asset {}", uuid))),
            }
        });
    }

    fn request_resource(
        &self,
        resource: &ResourceDescriptor,
        _version: AssetVersion,
        mut chunks: ChunkHandler,
        completion: Completion,
    ) {
        self.inner.requests.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .inner
            .fail_request
            .lock()
            .expect("sim poisoned")
            .take();
        let stored = {
            let state = self.inner.state.lock().expect("sim state poisoned");
            state.assets.get(resource.asset.uuid()).and_then(|entry| {
                entry
                    .resources
                    .iter()
                    .find(|r| {
                        r.resource_type == resource.resource_type
                            && r.original_filename == resource.original_filename
                    })
                    .map(|r| r.path.clone())
            })
        };
        let descriptor = resource.clone();
        thread::spawn(move || {
            thread::sleep(DELIVERY_DELAY);
            let Some(path) = stored else {
                completion(
                    false,
                    Some(format!(
                        "no {} resource for asset {}",
                        descriptor.original_filename,
                        descriptor.asset.uuid()
                    )),
                );
                return;
            };
            let data = match std::fs::read(&path) {
                Ok(data) => data,
                Err(err) => {
                    completion(false, Some(err.to_string()));
                    return;
                }
            };
            // Deliver in two chunks so accumulation is actually exercised;
            // an injected failure still sends the first chunk, making the
            // discard-on-failure contract observable.
            let mid = data.len() / 2;
            chunks(data[..mid].to_vec());
            if let Some(description) = injected {
                completion(false, Some(description));
                return;
            }
            chunks(data[mid..].to_vec());
            completion(true, None);
        });
    }

    fn request_live_photo(
        &self,
        asset: &LocalIdentifier,
        _version: AssetVersion,
        mut handler: LivePhotoHandler,
    ) {
        self.inner.requests.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .inner
            .fail_request
            .lock()
            .expect("sim poisoned")
            .take();
        let descriptors = self.resources(asset);
        let uuid = asset.uuid().to_string();
        let is_live = {
            let state = self.inner.state.lock().expect("sim state poisoned");
            state
                .assets
                .get(asset.uuid())
                .map(|entry| entry.metadata.subtypes.live())
                .unwrap_or(false)
        };
        thread::spawn(move || {
            thread::sleep(DELIVERY_DELAY);
            if let Some(description) = injected {
                handler(Err(description));
                return;
            }
            let photo = descriptors
                .iter()
                .find(|d| d.resource_type == ResourceType::Photo)
                .cloned();
            let video = descriptors
                .iter()
                .find(|d| d.resource_type == ResourceType::PairedVideo)
                .cloned();
            let (Some(photo), Some(video), true) = (photo, video, is_live) else {
                handler(Err(format!("asset {} is not a live photo", uuid)));
                return;
            };
            let resources = LivePhotoResources { photo, video };
            handler(Ok(LivePhotoDelivery {
                resources: resources.clone(),
                degraded: true,
            }));
            thread::sleep(DELIVERY_DELAY);
            handler(Ok(LivePhotoDelivery {
                resources,
                degraded: false,
            }));
        });
    }

    fn perform_changes(&self, ops: Vec<ChangeOp>, completion: Completion) {
        self.inner.performs.fetch_add(1, Ordering::SeqCst);
        if let Some(description) = self
            .inner
            .fail_perform
            .lock()
            .expect("sim poisoned")
            .take()
        {
            thread::spawn(move || {
                thread::sleep(DELIVERY_DELAY);
                completion(false, Some(description));
            });
            return;
        }
        let inner = Arc::clone(&self.inner);
        thread::spawn(move || {
            thread::sleep(DELIVERY_DELAY);
            match inner.apply_ops(ops) {
                Ok(()) => {
                    inner.notify();
                    completion(true, None);
                }
                Err(description) => completion(false, Some(description)),
            }
        });
    }

    fn register_observer(&self, callback: ObserverCallback) -> ObserverToken {
        let token = self.inner.next_observer.fetch_add(1, Ordering::SeqCst);
        self.inner
            .observers
            .lock()
            .expect("sim observers poisoned")
            .push((token, callback));
        ObserverToken(token)
    }

    fn unregister_observer(&self, token: ObserverToken) {
        self.inner
            .observers
            .lock()
            .expect("sim observers poisoned")
            .retain(|(id, _)| *id != token.0);
    }

    fn begin_composition_export(
        &self,
        handle: &CompositionHandle,
        dest: &Path,
    ) -> Result<Box<dyn ExportSession>, String> {
        let source = {
            let state = self.inner.state.lock().expect("sim state poisoned");
            state.compositions.get(&handle.id).cloned()
        }
        .ok_or_else(|| format!("unknown composition {}", handle.id))?;
        let injected = self
            .inner
            .fail_export
            .lock()
            .expect("sim poisoned")
            .take();

        let status = Arc::new(Mutex::new(ExportStatus::Waiting));
        let progress = Arc::clone(&status);
        let output = dest.to_path_buf();
        let dest = output.clone();
        thread::spawn(move || {
            *progress.lock().expect("export status poisoned") = ExportStatus::Exporting;
            thread::sleep(DELIVERY_DELAY);
            let terminal = if let Some(description) = injected {
                ExportStatus::Failed(description)
            } else {
                match std::fs::copy(&source, &dest) {
                    Ok(_) => ExportStatus::Completed,
                    Err(err) => ExportStatus::Failed(err.to_string()),
                }
            };
            *progress.lock().expect("export status poisoned") = terminal;
        });
        Ok(Box::new(SimExportSession { status, output }))
    }
}

struct SimExportSession {
    status: Arc<Mutex<ExportStatus>>,
    output: PathBuf,
}

impl ExportSession for SimExportSession {
    fn status(&self) -> ExportStatus {
        self.status.lock().expect("export status poisoned").clone()
    }

    fn output_path(&self) -> &Path {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge;

    #[test]
    fn seeded_assets_are_fetchable_by_uuid() {
        let framework = SimulatedFramework::new();
        let session = framework.default_session().unwrap();
        let id = framework.seed_photo(&session, "one.jpeg", b"1");
        let fetched = session.fetch_assets(&[id.uuid(), "UNKNOWN"]);
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].original_filename, "one.jpeg");
    }

    #[test]
    fn perform_changes_is_atomic_across_ops() {
        let framework = SimulatedFramework::new();
        let session = framework.default_session().unwrap();
        let id = framework.seed_photo(&session, "one.jpeg", b"1");

        // Second op fails, so the first must not take effect.
        let result = bridge::run_blocking(|done| {
            session.perform_changes(
                vec![
                    ChangeOp::SetFavorite {
                        asset: id.clone(),
                        value: true,
                    },
                    ChangeOp::DeleteAssets(vec![LocalIdentifier::new("MISSING/L0/001")]),
                ],
                done,
            );
        });
        assert!(result.is_err());
        let fetched = session.fetch_assets(&[id.uuid()]);
        assert!(!fetched[0].favorite);
    }

    #[test]
    fn explicit_library_maintains_queryable_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let library_path = dir.path().join("Test.photoslibrary");
        let framework = SimulatedFramework::new();
        bridge::run_blocking(|done| framework.create_library(&library_path, done)).unwrap();

        let session = framework.session_at(&library_path).unwrap();
        let id = framework.seed_photo(&session, "tracked.jpeg", b"bytes");

        let store = MetadataStore::open(&library_path).unwrap();
        assert_eq!(store.asset_uuids(false, false, false).unwrap(), [id.uuid()]);
    }

    #[test]
    fn slow_mo_current_video_is_a_composition() {
        let framework = SimulatedFramework::new();
        let session = framework.default_session().unwrap();
        let id = framework.seed_slow_mo_video(&session, "slow.mov", b"frames");

        let latch = bridge::OneShot::new();
        let signal = Arc::clone(&latch);
        session.request_video(&id, AssetVersion::Current, Box::new(move |r| signal.post(r)));
        let record = latch.wait().unwrap();
        assert!(matches!(record.handle, VideoHandle::Composition(_)));

        let latch = bridge::OneShot::new();
        let signal = Arc::clone(&latch);
        session.request_video(
            &id,
            AssetVersion::Original,
            Box::new(move |r| signal.post(r)),
        );
        let record = latch.wait().unwrap();
        assert!(matches!(record.handle, VideoHandle::File(_)));
    }
}
