// SPDX-License-Identifier: MPL-2.0
//! Transient request/response records.
//!
//! These are populated by the completion bridge from framework callbacks and
//! owned exclusively by the calling operation; nothing here is cached.

use crate::domain::identifier::LocalIdentifier;
use std::collections::HashMap;
use std::path::PathBuf;

/// Info-map key: result is a degraded (placeholder quality) rendition.
pub const INFO_DEGRADED_KEY: &str = "PHImageResultIsDegradedKey";
/// Info-map key: filesystem path backing the result, when one exists.
pub const INFO_FILE_PATH_KEY: &str = "PHImageFileURLKey";

/// One value in the framework's side-channel info map.
#[derive(Debug, Clone, PartialEq)]
pub enum InfoValue {
    Bool(bool),
    Text(String),
    Path(PathBuf),
}

impl InfoValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            InfoValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&PathBuf> {
        match self {
            InfoValue::Path(path) => Some(path),
            _ => None,
        }
    }
}

/// The framework's per-request side-channel map, passed to every result
/// handler alongside the payload.
pub type InfoMap = HashMap<String, InfoValue>;

/// Typed resource components an asset may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    /// Primary still image.
    Photo,
    /// Primary video.
    Video,
    /// RAW component of a RAW+JPEG pair.
    AlternatePhoto,
    /// Video component paired with a live photo's still.
    PairedVideo,
}

/// Descriptor of one typed resource belonging to an asset, as enumerated by
/// the framework's synchronous resource accessor.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    pub asset: LocalIdentifier,
    pub resource_type: ResourceType,
    pub original_filename: String,
    /// Format identifier (uniform type identifier) of the resource payload.
    pub uti: String,
}

/// Result of an image data request: payload bytes plus everything the
/// framework reported about them.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub data: Vec<u8>,
    pub uti: String,
    /// EXIF-style orientation value.
    pub orientation: u32,
    pub degraded: bool,
    pub info: InfoMap,
}

/// Opaque handle to an in-memory composition the framework assembled for an
/// edited slow-motion video. Compositions have no backing file; they must be
/// re-exported through an export session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionHandle {
    pub id: String,
    pub track_count: usize,
}

/// Playable handle returned by a video request.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoHandle {
    /// Flat file in the library originals store.
    File(PathBuf),
    /// In-memory composition (slow-motion edit).
    Composition(CompositionHandle),
}

/// Result of a video request.
#[derive(Debug, Clone)]
pub struct VideoRecord {
    pub handle: VideoHandle,
    pub info: InfoMap,
}

impl VideoRecord {
    /// Backing file path, resolved from the handle. Compositions have none.
    pub fn file_path(&self) -> Option<&PathBuf> {
        match &self.handle {
            VideoHandle::File(path) => Some(path),
            VideoHandle::Composition(_) => None,
        }
    }
}

/// The two resource components of a live photo.
#[derive(Debug, Clone)]
pub struct LivePhotoResources {
    pub photo: ResourceDescriptor,
    pub video: ResourceDescriptor,
}
