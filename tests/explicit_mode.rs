// SPDX-License-Identifier: MPL-2.0
//! End-to-end coverage for libraries opened at explicit filesystem paths.
//!
//! Opening a library by path flips the process-wide mode flag, so this
//! binary never constructs a default-mode library except to prove that
//! doing so fails after the flip.

use std::path::Path;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use photobridge::framework::simulated::SimulatedFramework;
use photobridge::framework::PhotosFramework;
use photobridge::{Error, ExportOptions, LibraryMode, PhotoLibrary};
use tempfile::TempDir;

fn explicit_library(dir: &TempDir) -> (Arc<SimulatedFramework>, PhotoLibrary) {
    let framework = Arc::new(SimulatedFramework::new());
    let path = dir.path().join("Test.photoslibrary");
    let library = PhotoLibrary::create(Arc::clone(&framework) as Arc<dyn PhotosFramework>, &path)
        .expect("library creation should succeed");
    (framework, library)
}

fn fixture_file(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn create_open_and_mode_flip() {
    let dir = TempDir::new().unwrap();
    let (framework, library) = explicit_library(&dir);
    assert_eq!(library.mode(), LibraryMode::ExplicitPath);
    assert_eq!(photobridge::library_mode(), LibraryMode::ExplicitPath);

    // Creating over an existing library is a local validation error.
    let path = library.library_path().unwrap();
    let err = PhotoLibrary::create(
        Arc::clone(&framework) as Arc<dyn PhotosFramework>,
        &path,
    )
    .unwrap_err();
    assert_eq!(err, Error::FileExists(path.clone()));

    // Reopening the same path works.
    let reopened =
        PhotoLibrary::open(Arc::clone(&framework) as Arc<dyn PhotosFramework>, &path).unwrap();
    assert_eq!(reopened.library_path().unwrap(), path);
}

#[test]
fn default_mode_construction_fails_after_flip() {
    let dir = TempDir::new().unwrap();
    let (framework, _library) = explicit_library(&dir);
    let err = PhotoLibrary::new(Arc::clone(&framework) as Arc<dyn PhotosFramework>).unwrap_err();
    assert!(matches!(err, Error::Mode(_)));
}

#[test]
fn opening_a_missing_path_fails_locally() {
    let framework = Arc::new(SimulatedFramework::new());
    let err = PhotoLibrary::open(
        framework as Arc<dyn PhotosFramework>,
        Path::new("/no/such/library"),
    )
    .unwrap_err();
    assert_eq!(
        err,
        Error::FileNotFound(Path::new("/no/such/library").to_path_buf())
    );
}

#[test]
fn enumeration_goes_through_the_metadata_database() {
    let dir = TempDir::new().unwrap();
    let (framework, library) = explicit_library(&dir);
    let sources = TempDir::new().unwrap();
    library
        .add_photo(&fixture_file(&sources, "one.jpeg", b"1"))
        .unwrap();
    library
        .add_photo(&fixture_file(&sources, "two.jpeg", b"2"))
        .unwrap();

    // A hidden burst stowaway seeded behind the library's back must not
    // show up in default enumeration.
    let session = framework
        .session_at(&library.library_path().unwrap())
        .unwrap();
    framework.seed_burst_photo(&session, "b.jpeg", b"b", "BURST-X", false);

    let assets = library.assets().unwrap();
    assert_eq!(assets.len(), 2);
    assert_eq!(library.count().unwrap(), 2);
}

#[test]
fn date_added_and_timezone_round_trip() {
    let dir = TempDir::new().unwrap();
    let (_framework, library) = explicit_library(&dir);
    let sources = TempDir::new().unwrap();
    let mut asset = library
        .add_photo(&fixture_file(&sources, "dated.jpeg", b"d"))
        .unwrap();

    // The import stamped an added date.
    let stamped = asset.date_added().unwrap();
    assert!(stamped.timestamp() > 0);

    let moved = Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap();
    asset.set_date_added(moved).unwrap();
    assert_eq!(asset.date_added().unwrap(), moved);

    assert!(matches!(asset.timezone(), Err(Error::FetchFailed(_))));
    asset.set_timezone(-28800, "America/Los_Angeles").unwrap();
    let tz = asset.timezone().unwrap();
    assert_eq!(tz.offset_secs, -28800);
    assert_eq!(tz.name, "America/Los_Angeles");
}

#[test]
fn albums_enumerate_from_the_database() {
    let dir = TempDir::new().unwrap();
    let (_framework, library) = explicit_library(&dir);

    let album = library.create_album("Catalog").unwrap();
    let listed = library.albums(true).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].uuid(), album.uuid());

    library.delete_album(album).unwrap();
    assert!(library.albums(true).unwrap().is_empty());
}

#[test]
fn export_still_works_against_an_explicit_library() {
    let dir = TempDir::new().unwrap();
    let (_framework, library) = explicit_library(&dir);
    let sources = TempDir::new().unwrap();
    let payload = b"explicit library payload".to_vec();
    let asset = library
        .add_photo(&fixture_file(&sources, "exp.jpeg", &payload))
        .unwrap();

    let out = TempDir::new().unwrap();
    let written = asset.export(out.path(), &ExportOptions::default()).unwrap();
    assert_eq!(std::fs::read(&written[0]).unwrap(), payload);
}
