// SPDX-License-Identifier: MPL-2.0
//! End-to-end coverage against the default (system) library.
//!
//! The library mode flag is process-wide and one-way, so everything here
//! stays in default mode; the explicit-path scenarios live in their own
//! test binary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use photobridge::framework::simulated::SimulatedFramework;
use photobridge::framework::PhotosFramework;
use photobridge::{
    Asset, AssetVersion, Error, ExportOptions, LibraryMode, PhotoLibrary,
};
use tempfile::TempDir;

fn default_library() -> (Arc<SimulatedFramework>, PhotoLibrary) {
    let framework = Arc::new(SimulatedFramework::new());
    let library = PhotoLibrary::new(Arc::clone(&framework) as Arc<dyn PhotosFramework>)
        .expect("default library should open");
    (framework, library)
}

fn fixture_file(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn mode_stays_default() {
    let (_framework, library) = default_library();
    assert_eq!(library.mode(), LibraryMode::Default);
    assert_eq!(photobridge::library_mode(), LibraryMode::Default);
}

#[test]
fn import_then_export_original_is_byte_identical() {
    let (_framework, library) = default_library();
    let dir = TempDir::new().unwrap();
    let payload: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    let source = fixture_file(&dir, "roundtrip.jpeg", &payload);

    let asset = library.add_photo(&source).unwrap();
    assert!(asset.is_photo());
    assert_eq!(asset.original_filename(), "roundtrip.jpeg");

    let out = TempDir::new().unwrap();
    let written = asset
        .export(
            out.path(),
            &ExportOptions {
                version: AssetVersion::Original,
                ..ExportOptions::default()
            },
        )
        .unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(std::fs::read(&written[0]).unwrap(), payload);
}

// The original rendition is framework-rendered like any other; it must not
// bypass the image request in favor of the stored resource bytes.
#[test]
fn original_photo_export_goes_through_the_image_request() {
    let (framework, library) = default_library();
    let dir = TempDir::new().unwrap();
    let asset = library
        .add_photo(&fixture_file(&dir, "routed.jpeg", b"routed"))
        .unwrap();
    let session = framework.default_session().unwrap();
    let before = framework.image_request_count(&session);

    let out = TempDir::new().unwrap();
    asset
        .export(
            out.path(),
            &ExportOptions {
                version: AssetVersion::Original,
                ..ExportOptions::default()
            },
        )
        .unwrap();
    assert_eq!(framework.image_request_count(&session), before + 1);
}

#[test]
fn video_import_and_export_round_trip() {
    let (_framework, library) = default_library();
    let dir = TempDir::new().unwrap();
    let payload = b"not actually mpeg-4 but faithful bytes".to_vec();
    let source = fixture_file(&dir, "clip.mp4", &payload);

    let asset = library.add_video(&source).unwrap();
    assert!(asset.is_video());

    let out = TempDir::new().unwrap();
    let written = asset.export(out.path(), &ExportOptions::default()).unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(std::fs::read(&written[0]).unwrap(), payload);
    assert_eq!(written[0].file_name().unwrap(), "clip.mp4");
}

#[test]
fn repeated_fetch_returns_identical_snapshots() {
    let (_framework, library) = default_library();
    let dir = TempDir::new().unwrap();
    let source = fixture_file(&dir, "stable.jpeg", b"stable");
    let asset = library.add_photo(&source).unwrap();

    let first = library.asset(asset.uuid()).unwrap();
    let second = library.asset(asset.uuid()).unwrap();
    assert_eq!(first.metadata(), second.metadata());
}

#[test]
fn favorite_mutation_refreshes_the_snapshot() {
    let (_framework, library) = default_library();
    let dir = TempDir::new().unwrap();
    let source = fixture_file(&dir, "fav.jpeg", b"fav");
    let mut asset = library.add_photo(&source).unwrap();
    assert!(!asset.favorite());

    asset.set_favorite(true).unwrap();
    assert!(asset.favorite());

    // An independent fetch agrees.
    assert!(library.asset(asset.uuid()).unwrap().favorite());
}

#[test]
fn keywords_and_location_mutations_round_trip() {
    let (_framework, library) = default_library();
    let dir = TempDir::new().unwrap();
    let source = fixture_file(&dir, "tagged.jpeg", b"tagged");
    let mut asset = library.add_photo(&source).unwrap();

    asset
        .set_keywords(&["travel".to_string(), "beach".to_string()])
        .unwrap();
    assert_eq!(asset.keywords(), ["travel", "beach"]);

    asset
        .set_location(Some(photobridge::Location {
            latitude: 34.0,
            longitude: -118.2,
        }))
        .unwrap();
    assert_eq!(asset.location().unwrap().latitude, 34.0);
}

#[test]
fn creation_and_modification_dates_round_trip() {
    let (_framework, library) = default_library();
    let dir = TempDir::new().unwrap();
    let source = fixture_file(&dir, "dated.jpeg", b"dated");
    let mut asset = library.add_photo(&source).unwrap();

    let taken = Utc.with_ymd_and_hms(2019, 4, 2, 8, 30, 0).unwrap();
    asset.set_creation_date(Some(taken)).unwrap();
    assert_eq!(asset.creation_date(), Some(taken));

    let edited = Utc.with_ymd_and_hms(2020, 1, 5, 10, 0, 0).unwrap();
    asset.set_modification_date(Some(edited)).unwrap();
    assert_eq!(asset.modification_date(), Some(edited));

    // An independent fetch agrees with the refreshed snapshot.
    let fetched = library.asset(asset.uuid()).unwrap();
    assert_eq!(fetched.creation_date(), Some(taken));
    assert_eq!(fetched.modification_date(), Some(edited));
}

#[test]
fn delete_then_fetch_fails() {
    let (_framework, library) = default_library();
    let dir = TempDir::new().unwrap();
    let source = fixture_file(&dir, "gone.jpeg", b"gone");
    let asset = library.add_photo(&source).unwrap();
    let uuid = asset.uuid().to_string();

    library.delete_assets(&[asset]).unwrap();
    assert!(matches!(library.asset(&uuid), Err(Error::FetchFailed(_))));
}

#[test]
fn export_without_overwrite_increments_names() {
    let (_framework, library) = default_library();
    let dir = TempDir::new().unwrap();
    let source = fixture_file(&dir, "photo.jpeg", b"one");
    let asset = library.add_photo(&source).unwrap();

    let out = TempDir::new().unwrap();
    let options = ExportOptions::default();
    let first = asset.export(out.path(), &options).unwrap();
    let second = asset.export(out.path(), &options).unwrap();
    let third = asset.export(out.path(), &options).unwrap();
    assert_eq!(first[0].file_name().unwrap(), "photo.jpeg");
    assert_eq!(second[0].file_name().unwrap(), "photo (1).jpeg");
    assert_eq!(third[0].file_name().unwrap(), "photo (2).jpeg");
}

#[test]
fn export_with_overwrite_replaces_bytes() {
    let (_framework, library) = default_library();
    let dir = TempDir::new().unwrap();
    let asset = library
        .add_photo(&fixture_file(&dir, "same.jpeg", b"new bytes"))
        .unwrap();

    let out = TempDir::new().unwrap();
    let stale = out.path().join("same.jpeg");
    std::fs::write(&stale, b"old bytes").unwrap();

    let options = ExportOptions {
        overwrite: true,
        ..ExportOptions::default()
    };
    let written = asset.export(out.path(), &options).unwrap();
    assert_eq!(written, vec![stale.clone()]);
    assert_eq!(std::fs::read(&stale).unwrap(), b"new bytes");
}

#[test]
fn export_to_missing_directory_is_local_validation() {
    let (framework, library) = default_library();
    let dir = TempDir::new().unwrap();
    let asset = library
        .add_photo(&fixture_file(&dir, "x.jpeg", b"x"))
        .unwrap();
    let session = framework.default_session().unwrap();
    let before = framework.request_count(&session);

    let err = asset
        .export(
            std::path::Path::new("/definitely/not/a/dir"),
            &ExportOptions::default(),
        )
        .unwrap_err();
    assert!(err.is_local_validation());
    // No framework request was issued for the failed validation.
    assert_eq!(framework.request_count(&session), before);
}

#[test]
fn invalid_raw_version_is_rejected_locally() {
    let err = AssetVersion::try_from(7).unwrap_err();
    assert_eq!(err, Error::InvalidVersion(7));
    assert!(err.is_local_validation());
}

#[test]
fn live_photo_exports_both_components() {
    let (framework, library) = default_library();
    let session = framework.default_session().unwrap();
    let id = framework.seed_live_photo(&session, "live.heic", b"still", "live.mov", b"motion");

    let asset = library.asset(id.uuid()).unwrap();
    assert!(asset.is_live_photo());

    let out = TempDir::new().unwrap();
    let written = asset.export(out.path(), &ExportOptions::default()).unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(std::fs::read(&written[0]).unwrap(), b"still");
    assert_eq!(std::fs::read(&written[1]).unwrap(), b"motion");
}

#[test]
fn live_photo_export_can_skip_components() {
    let (framework, library) = default_library();
    let session = framework.default_session().unwrap();
    let id = framework.seed_live_photo(&session, "live.heic", b"still", "live.mov", b"motion");
    let asset = library.asset(id.uuid()).unwrap();

    let out = TempDir::new().unwrap();
    let written = asset
        .export(
            out.path(),
            &ExportOptions {
                video: false,
                ..ExportOptions::default()
            },
        )
        .unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(std::fs::read(&written[0]).unwrap(), b"still");
}

#[test]
fn raw_pair_exports_raw_component_on_request() {
    let (_framework, library) = default_library();
    let dir = TempDir::new().unwrap();
    let raw = fixture_file(&dir, "shot.cr2", b"raw sensor data");
    let jpeg = fixture_file(&dir, "shot.jpeg", b"rendered jpeg");
    let asset = library.add_raw_pair(&raw, &jpeg).unwrap();
    assert_eq!(asset.metadata().raw_filename.as_deref(), Some("shot.cr2"));

    let out = TempDir::new().unwrap();
    let written = asset
        .export(
            out.path(),
            &ExportOptions {
                version: AssetVersion::Original,
                raw: true,
                ..ExportOptions::default()
            },
        )
        .unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(std::fs::read(&written[0]).unwrap(), b"rendered jpeg");
    assert_eq!(std::fs::read(&written[1]).unwrap(), b"raw sensor data");
}

#[test]
fn slow_mo_current_export_renders_through_composition() {
    let (framework, library) = default_library();
    let session = framework.default_session().unwrap();
    let id = framework.seed_slow_mo_video(&session, "slow.mov", b"slow frames");

    let asset = library.asset(id.uuid()).unwrap();
    assert!(asset.is_slow_mo());

    let out = TempDir::new().unwrap();
    let written = asset.export(out.path(), &ExportOptions::default()).unwrap();
    assert_eq!(std::fs::read(&written[0]).unwrap(), b"slow frames");
    assert_eq!(written[0].extension().unwrap(), "mov");
}

#[test]
fn slow_mo_export_failure_surfaces_export_error() {
    let (framework, library) = default_library();
    let session = framework.default_session().unwrap();
    let id = framework.seed_slow_mo_video(&session, "slow.mov", b"frames");
    let asset = library.asset(id.uuid()).unwrap();

    framework.fail_next_export(&session, "render pipeline stalled");
    let out = TempDir::new().unwrap();
    let err = asset
        .export(out.path(), &ExportOptions::default())
        .unwrap_err();
    assert_eq!(err, Error::Export("render pipeline stalled".to_string()));
}

#[test]
fn burst_fetch_honors_the_all_flag() {
    let (framework, library) = default_library();
    let session = framework.default_session().unwrap();
    framework.seed_burst_photo(&session, "pick.jpeg", b"1", "BURST-1", true);
    framework.seed_burst_photo(&session, "other.jpeg", b"2", "BURST-1", false);

    assert_eq!(library.fetch_burst("BURST-1", false).unwrap().len(), 1);
    assert_eq!(library.fetch_burst("BURST-1", true).unwrap().len(), 2);
}

#[test]
fn album_lifecycle_and_membership() {
    let (_framework, library) = default_library();
    let dir = TempDir::new().unwrap();
    let one = library
        .add_photo(&fixture_file(&dir, "a.jpeg", b"a"))
        .unwrap();
    let two = library
        .add_photo(&fixture_file(&dir, "b.jpeg", b"b"))
        .unwrap();

    let mut album = library.create_album("Trip").unwrap();
    assert_eq!(album.title(), "Trip");
    assert_eq!(album.estimated_count(), 0);

    album.add_assets(&[one, two]).unwrap();
    assert_eq!(album.estimated_count(), 2);
    let members = album.assets().unwrap();
    assert_eq!(members.len(), 2);

    album.remove_assets(&members[..1]).unwrap();
    assert_eq!(album.estimated_count(), 1);

    let found = library.album_by_title("Trip").unwrap();
    assert_eq!(found.uuid(), album.uuid());

    library.delete_album(album).unwrap();
    assert!(library.album_by_title("Trip").is_err());
    // Members survive album deletion.
    assert_eq!(library.assets().unwrap().len(), 2);
}

#[test]
fn failed_import_maps_to_import_error() {
    let (framework, library) = default_library();
    let dir = TempDir::new().unwrap();
    let source = fixture_file(&dir, "doomed.jpeg", b"doomed");
    let session = framework.default_session().unwrap();
    framework.fail_next_perform(&session, "quota exceeded");

    let err = library.add_photo(&source).unwrap_err();
    assert_eq!(err, Error::Import("quota exceeded".to_string()));
}

#[test]
fn monitor_reports_adds_updates_and_removes() {
    let (framework, library) = default_library();
    let dir = TempDir::new().unwrap();
    let mut existing = library
        .add_photo(&fixture_file(&dir, "seen.jpeg", b"seen"))
        .unwrap();

    let batches = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&batches);
    let mut monitor = library.monitor(move |batch| sink.lock().unwrap().push(batch));
    monitor.start().unwrap();

    let session = framework.default_session().unwrap();
    framework.seed_photo(&session, "fresh.jpeg", b"fresh");
    assert!(monitor.pump_once().unwrap());

    existing.set_favorite(true).unwrap();
    assert!(monitor.pump_once().unwrap());

    library.delete_assets(&[existing]).unwrap();
    assert!(monitor.pump_once().unwrap());
    monitor.stop();

    let batches = batches.lock().unwrap();
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[0].added.len(), 1);
    assert_eq!(batches[1].updated.len(), 1);
    assert!(batches[1].updated[0].favorite());
    assert_eq!(batches[2].removed.len(), 1);

    // Batch members are facade assets, usable without another lookup.
    let out = TempDir::new().unwrap();
    let written = batches[0].added[0]
        .export(out.path(), &ExportOptions::default())
        .unwrap();
    assert_eq!(std::fs::read(&written[0]).unwrap(), b"fresh");
}

#[test]
fn monitor_run_loop_stops_on_flag() {
    let (framework, library) = default_library();
    let batches = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&batches);
    let mut monitor = library.monitor(move |batch| sink.lock().unwrap().push(batch));
    monitor.start().unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    let session = framework.default_session().unwrap();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(40));
        stop_flag.store(true, Ordering::SeqCst);
    });
    framework.seed_photo(&session, "during.jpeg", b"during");
    monitor.run(&stop).unwrap();
    handle.join().unwrap();

    assert_eq!(batches.lock().unwrap().len(), 1);
}

#[test]
fn assets_by_uuid_skips_unknown_identifiers() {
    let (_framework, library) = default_library();
    let dir = TempDir::new().unwrap();
    let asset = library
        .add_photo(&fixture_file(&dir, "known.jpeg", b"known"))
        .unwrap();

    let found = library
        .assets_by_uuid(&[asset.local_identifier().as_str(), "NOT-A-UUID/L0/001"])
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].uuid(), asset.uuid());
}

#[test]
fn date_added_requires_explicit_path_mode() {
    let (_framework, library) = default_library();
    let dir = TempDir::new().unwrap();
    let asset = library
        .add_photo(&fixture_file(&dir, "nodates.jpeg", b"x"))
        .unwrap();
    assert!(matches!(asset.date_added(), Err(Error::Mode(_))));
    assert!(matches!(asset.timezone(), Err(Error::Mode(_))));
}

#[test]
fn count_matches_enumeration() {
    let (_framework, library) = default_library();
    let dir = TempDir::new().unwrap();
    library
        .add_photo(&fixture_file(&dir, "c1.jpeg", b"1"))
        .unwrap();
    library
        .add_photo(&fixture_file(&dir, "c2.jpeg", b"2"))
        .unwrap();
    assert_eq!(library.count().unwrap(), library.assets().unwrap().len());
    assert_eq!(library.count().unwrap(), 2);
}

// Keep the enum path exercised end to end: classification decides variant
// and the variant decides export behavior.
#[test]
fn classification_matches_variants_end_to_end() {
    let (framework, library) = default_library();
    let session = framework.default_session().unwrap();
    let dir = TempDir::new().unwrap();

    let photo = library
        .add_photo(&fixture_file(&dir, "p.jpeg", b"p"))
        .unwrap();
    let video = library
        .add_video(&fixture_file(&dir, "v.mov", b"v"))
        .unwrap();
    let live = framework.seed_live_photo(&session, "l.heic", b"l", "l.mov", b"lv");
    let live = library.asset(live.uuid()).unwrap();

    assert!(matches!(photo, Asset::Photo(_)));
    assert!(matches!(video, Asset::Video(_)));
    assert!(matches!(live, Asset::LivePhoto(_)));
}
