// SPDX-License-Identifier: MPL-2.0
//! Asset facades.
//!
//! [`Asset`] wraps one fetched metadata snapshot together with the library
//! it came from. The snapshot is a cache: every mutator submits a change
//! transaction and then replaces the snapshot by re-fetching before it
//! returns, because the framework never updates fetched records in place.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{
    AssetMetadata, AssetVersion, LocalIdentifier, Location, MediaKind, ResourceDescriptor,
    ResourceType, TimezoneInfo, VideoHandle,
};
use crate::error::{Error, Result};
use crate::library::LibraryCore;
use crate::pathutil::increment_filename;
use crate::requests;
use crate::transactions;
use crate::uti::preferred_extension;

/// Options for [`Asset::export`]. The default exports the current version of
/// every component, never overwrites, and names files after the original
/// filename.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Output filename; its extension is ignored and replaced by the
    /// payload's actual format. Defaults to the asset's original filename.
    pub filename: Option<String>,
    pub version: AssetVersion,
    /// Replace an existing file instead of incrementing the name.
    pub overwrite: bool,
    /// Also export the RAW component of a RAW+JPEG pair.
    pub raw: bool,
    /// Export the still component of a live photo.
    pub photo: bool,
    /// Export the paired-video component of a live photo.
    pub video: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            filename: None,
            version: AssetVersion::Current,
            overwrite: false,
            raw: false,
            photo: true,
            video: true,
        }
    }
}

/// Media class of an asset, decided purely from its kind and subtype flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AssetClass {
    Photo,
    Video,
    LivePhoto,
}

/// The live subtype flag wins over the kind; everything else follows the
/// kind, and unknown kinds are a hard error rather than a guess.
pub(crate) fn classify(kind_raw: i32, subtypes: crate::domain::MediaSubtypes) -> Result<AssetClass> {
    if subtypes.live() {
        return Ok(AssetClass::LivePhoto);
    }
    match MediaKind::from_raw(kind_raw) {
        Some(MediaKind::Photo) => Ok(AssetClass::Photo),
        Some(MediaKind::Video) => Ok(AssetClass::Video),
        Some(MediaKind::Audio) => Err(Error::MediaType(
            "audio assets are not supported".to_string(),
        )),
        None => Err(Error::MediaType(format!(
            "unrecognized media kind {}",
            kind_raw
        ))),
    }
}

pub(crate) struct AssetInner {
    pub(crate) core: Arc<LibraryCore>,
    pub(crate) metadata: AssetMetadata,
}

pub struct PhotoAsset {
    inner: AssetInner,
}

pub struct VideoAsset {
    inner: AssetInner,
}

pub struct LivePhotoAsset {
    inner: AssetInner,
}

/// One library asset, classified by media class.
pub enum Asset {
    Photo(PhotoAsset),
    Video(VideoAsset),
    LivePhoto(LivePhotoAsset),
}

impl std::fmt::Debug for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Asset::Photo(_) => "Photo",
            Asset::Video(_) => "Video",
            Asset::LivePhoto(_) => "LivePhoto",
        };
        f.debug_tuple(name).field(&self.inner().metadata).finish()
    }
}

impl Asset {
    pub(crate) fn from_metadata(core: Arc<LibraryCore>, metadata: AssetMetadata) -> Result<Asset> {
        let class = classify(metadata.kind_raw, metadata.subtypes)?;
        let inner = AssetInner { core, metadata };
        Ok(match class {
            AssetClass::Photo => Asset::Photo(PhotoAsset { inner }),
            AssetClass::Video => Asset::Video(VideoAsset { inner }),
            AssetClass::LivePhoto => Asset::LivePhoto(LivePhotoAsset { inner }),
        })
    }

    fn inner(&self) -> &AssetInner {
        match self {
            Asset::Photo(asset) => &asset.inner,
            Asset::Video(asset) => &asset.inner,
            Asset::LivePhoto(asset) => &asset.inner,
        }
    }

    fn inner_mut(&mut self) -> &mut AssetInner {
        match self {
            Asset::Photo(asset) => &mut asset.inner,
            Asset::Video(asset) => &mut asset.inner,
            Asset::LivePhoto(asset) => &mut asset.inner,
        }
    }

    // --- accessors -----------------------------------------------------------

    pub fn metadata(&self) -> &AssetMetadata {
        &self.inner().metadata
    }

    pub fn local_identifier(&self) -> &LocalIdentifier {
        &self.inner().metadata.local_identifier
    }

    pub fn uuid(&self) -> &str {
        self.inner().metadata.uuid()
    }

    pub fn original_filename(&self) -> &str {
        &self.inner().metadata.original_filename
    }

    pub fn is_photo(&self) -> bool {
        matches!(self, Asset::Photo(_))
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Asset::Video(_))
    }

    pub fn is_live_photo(&self) -> bool {
        matches!(self, Asset::LivePhoto(_))
    }

    pub fn favorite(&self) -> bool {
        self.inner().metadata.favorite
    }

    pub fn hidden(&self) -> bool {
        self.inner().metadata.hidden
    }

    pub fn keywords(&self) -> &[String] {
        &self.inner().metadata.keywords
    }

    pub fn creation_date(&self) -> Option<DateTime<Utc>> {
        self.inner().metadata.creation_date
    }

    pub fn modification_date(&self) -> Option<DateTime<Utc>> {
        self.inner().metadata.modification_date
    }

    pub fn location(&self) -> Option<Location> {
        self.inner().metadata.location
    }

    pub fn duration(&self) -> f64 {
        self.inner().metadata.duration
    }

    pub fn is_burst(&self) -> bool {
        self.inner().metadata.is_burst()
    }

    pub fn burst_identifier(&self) -> Option<&str> {
        self.inner().metadata.burst_identifier.as_deref()
    }

    pub fn is_panorama(&self) -> bool {
        self.inner().metadata.subtypes.panorama()
    }

    pub fn is_hdr(&self) -> bool {
        self.inner().metadata.subtypes.hdr()
    }

    pub fn is_screenshot(&self) -> bool {
        self.inner().metadata.subtypes.screenshot()
    }

    pub fn is_portrait(&self) -> bool {
        self.inner().metadata.subtypes.portrait()
    }

    pub fn is_slow_mo(&self) -> bool {
        self.inner().metadata.subtypes.slow_mo()
    }

    pub fn is_time_lapse(&self) -> bool {
        self.inner().metadata.subtypes.time_lapse()
    }

    /// Typed resources backing this asset.
    pub fn resources(&self) -> Vec<ResourceDescriptor> {
        let inner = self.inner();
        inner
            .core
            .session
            .resources(&inner.metadata.local_identifier)
    }

    // --- mutators --------------------------------------------------------------

    fn mutate(&mut self, build: impl FnOnce(&mut transactions::ChangeSet)) -> Result<()> {
        {
            let inner = self.inner();
            inner.core.queue.perform(
                inner.core.session.as_ref(),
                Error::Mutation,
                |changes| {
                    build(changes);
                    Ok(())
                },
            )?;
        }
        self.refresh()
    }

    /// Replaces the cached snapshot with a fresh fetch.
    pub fn refresh(&mut self) -> Result<()> {
        let inner = self.inner_mut();
        inner.metadata = inner.core.refetch_asset(inner.metadata.uuid())?;
        Ok(())
    }

    pub fn set_favorite(&mut self, value: bool) -> Result<()> {
        let id = self.local_identifier().clone();
        self.mutate(|changes| changes.set_favorite(&id, value))
    }

    pub fn set_creation_date(&mut self, value: Option<DateTime<Utc>>) -> Result<()> {
        let id = self.local_identifier().clone();
        self.mutate(|changes| changes.set_creation_date(&id, value))
    }

    pub fn set_modification_date(&mut self, value: Option<DateTime<Utc>>) -> Result<()> {
        let id = self.local_identifier().clone();
        self.mutate(|changes| changes.set_modification_date(&id, value))
    }

    pub fn set_location(&mut self, value: Option<Location>) -> Result<()> {
        let id = self.local_identifier().clone();
        self.mutate(|changes| changes.set_location(&id, value))
    }

    pub fn set_keywords(&mut self, values: &[String]) -> Result<()> {
        let id = self.local_identifier().clone();
        self.mutate(|changes| changes.set_keywords(&id, values))
    }

    // --- explicit-path library attributes ----------------------------------------

    /// Date the asset was added to the library. Only available for libraries
    /// opened at an explicit path, where the metadata database is readable.
    pub fn date_added(&self) -> Result<DateTime<Utc>> {
        let inner = self.inner();
        inner
            .core
            .metadata_store()?
            .date_added(inner.metadata.uuid())
    }

    pub fn set_date_added(&mut self, value: DateTime<Utc>) -> Result<()> {
        self.inner().core.metadata_store()?;
        let id = self.local_identifier().clone();
        self.mutate(|changes| changes.set_date_added(&id, value))
    }

    /// Timezone the asset was captured in, from the library database.
    pub fn timezone(&self) -> Result<TimezoneInfo> {
        let inner = self.inner();
        inner.core.metadata_store()?.timezone(inner.metadata.uuid())
    }

    pub fn set_timezone(&mut self, offset_secs: i32, name: &str) -> Result<()> {
        self.inner().core.metadata_store()?;
        let id = self.local_identifier().clone();
        self.mutate(|changes| changes.set_timezone(&id, offset_secs, name))
    }

    // --- export ---------------------------------------------------------------------

    /// Exports the asset's payload(s) into `dest`, returning the written
    /// paths. `dest` must be an existing directory.
    pub fn export(&self, dest: &Path, options: &ExportOptions) -> Result<Vec<PathBuf>> {
        match self {
            Asset::Photo(asset) => asset.export(dest, options),
            Asset::Video(asset) => asset.export(dest, options),
            Asset::LivePhoto(asset) => asset.export(dest, options),
        }
    }
}

// --- export plumbing ---------------------------------------------------------

fn ensure_directory(dest: &Path) -> Result<()> {
    if dest.is_dir() {
        Ok(())
    } else {
        Err(Error::NotADirectory(dest.to_path_buf()))
    }
}

fn export_stem(options: &ExportOptions, fallback: &str) -> String {
    let name = options.filename.as_deref().unwrap_or(fallback);
    Path::new(name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

/// Picks the final output path for one component. With `overwrite` the name
/// is used as-is and an existing file is replaced; otherwise the name is
/// incremented until free.
fn resolve_target(dest: &Path, stem: &str, ext: &str, overwrite: bool) -> Result<PathBuf> {
    let name = format!("{}.{}", stem, ext);
    if overwrite {
        Ok(dest.join(name))
    } else {
        increment_filename(dest, &name)
    }
}

impl AssetInner {
    fn resource_of_type(&self, wanted: ResourceType) -> Option<ResourceDescriptor> {
        self.core
            .session
            .resources(&self.metadata.local_identifier)
            .into_iter()
            .find(|resource| resource.resource_type == wanted)
    }

    fn export_resource(
        &self,
        descriptor: &ResourceDescriptor,
        version: AssetVersion,
        dest: &Path,
        stem: &str,
        overwrite: bool,
    ) -> Result<PathBuf> {
        let bytes = requests::request_resource(self.core.session.as_ref(), descriptor, version)?;
        let target = resolve_target(dest, stem, &preferred_extension(&descriptor.uti), overwrite)?;
        std::fs::write(&target, bytes)?;
        Ok(target)
    }
}

impl PhotoAsset {
    pub fn metadata(&self) -> &AssetMetadata {
        &self.inner.metadata
    }

    /// Exports the photo. Every rendition goes through the image data
    /// request at the requested version, so the framework renders the
    /// correct bytes; only the RAW component of a pair streams its stored
    /// resource directly.
    pub fn export(&self, dest: &Path, options: &ExportOptions) -> Result<Vec<PathBuf>> {
        ensure_directory(dest)?;
        let stem = export_stem(options, &self.inner.metadata.original_filename);
        let mut written = Vec::new();

        let record = requests::request_image(
            self.inner.core.session.as_ref(),
            &self.inner.metadata.local_identifier,
            options.version,
        )?;
        let target = resolve_target(
            dest,
            &stem,
            &preferred_extension(&record.uti),
            options.overwrite,
        )?;
        std::fs::write(&target, &record.data)?;
        written.push(target);

        if options.raw {
            let descriptor = self
                .inner
                .resource_of_type(ResourceType::AlternatePhoto)
                .ok_or_else(|| Error::MediaType("asset has no raw component".to_string()))?;
            written.push(self.inner.export_resource(
                &descriptor,
                options.version,
                dest,
                &stem,
                options.overwrite,
            )?);
        }
        Ok(written)
    }
}

impl VideoAsset {
    pub fn metadata(&self) -> &AssetMetadata {
        &self.inner.metadata
    }

    /// Exports the video. Slow-motion assets at the current version come
    /// back as in-memory compositions and are re-rendered through an export
    /// session; everything else copies the backing file.
    pub fn export(&self, dest: &Path, options: &ExportOptions) -> Result<Vec<PathBuf>> {
        ensure_directory(dest)?;
        let stem = export_stem(options, &self.inner.metadata.original_filename);
        let record = requests::request_video(
            self.inner.core.session.as_ref(),
            &self.inner.metadata.local_identifier,
            options.version,
        )?;
        let target = match record.handle {
            VideoHandle::File(source) => {
                let ext = source
                    .extension()
                    .map(|ext| ext.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "mov".to_string());
                let target = resolve_target(dest, &stem, &ext, options.overwrite)?;
                std::fs::copy(&source, &target)?;
                target
            }
            VideoHandle::Composition(handle) => {
                let target = resolve_target(dest, &stem, "mov", options.overwrite)?;
                transactions::export_composition(
                    self.inner.core.session.as_ref(),
                    &handle,
                    &target,
                )?
            }
        };
        Ok(vec![target])
    }
}

impl LivePhotoAsset {
    pub fn metadata(&self) -> &AssetMetadata {
        &self.inner.metadata
    }

    /// Exports the still and paired-video components selected by the
    /// options. Each component resolves its output name independently.
    pub fn export(&self, dest: &Path, options: &ExportOptions) -> Result<Vec<PathBuf>> {
        ensure_directory(dest)?;
        let resources = requests::request_live_photo_resources(
            self.inner.core.session.as_ref(),
            &self.inner.metadata.local_identifier,
            options.version,
        )?;
        let stem = export_stem(options, &self.inner.metadata.original_filename);
        let mut written = Vec::new();
        if options.photo {
            written.push(self.inner.export_resource(
                &resources.photo,
                options.version,
                dest,
                &stem,
                options.overwrite,
            )?);
        }
        if options.video {
            written.push(self.inner.export_resource(
                &resources.video,
                options.version,
                dest,
                &stem,
                options.overwrite,
            )?);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MediaSubtypes;

    #[test]
    fn live_flag_wins_over_kind() {
        let live = MediaSubtypes::default().with(MediaSubtypes::LIVE);
        assert_eq!(classify(1, live).unwrap(), AssetClass::LivePhoto);
        assert_eq!(classify(2, live).unwrap(), AssetClass::LivePhoto);
    }

    #[test]
    fn kinds_map_to_classes() {
        let none = MediaSubtypes::default();
        assert_eq!(classify(1, none).unwrap(), AssetClass::Photo);
        assert_eq!(classify(2, none).unwrap(), AssetClass::Video);
        assert!(matches!(classify(3, none), Err(Error::MediaType(_))));
        assert!(matches!(classify(0, none), Err(Error::MediaType(_))));
        assert!(matches!(classify(99, none), Err(Error::MediaType(_))));
    }

    #[test]
    fn other_subtype_flags_do_not_change_the_class() {
        let flags = MediaSubtypes::default()
            .with(MediaSubtypes::HDR)
            .with(MediaSubtypes::PANORAMA);
        assert_eq!(classify(1, flags).unwrap(), AssetClass::Photo);
        let slow = MediaSubtypes::default().with(MediaSubtypes::SLOW_MO);
        assert_eq!(classify(2, slow).unwrap(), AssetClass::Video);
    }

    #[test]
    fn export_stem_strips_extension_from_requested_filename() {
        let options = ExportOptions {
            filename: Some("renamed.png".to_string()),
            ..ExportOptions::default()
        };
        assert_eq!(export_stem(&options, "orig.jpeg"), "renamed");
        assert_eq!(export_stem(&ExportOptions::default(), "orig.jpeg"), "orig");
    }
}
