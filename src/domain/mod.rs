// SPDX-License-Identifier: MPL-2.0
//! Pure value types shared by the engines and facades.
//!
//! Nothing in this module talks to the framework; these are the records the
//! bridge marshals across threads and the snapshots the facades cache.

pub mod identifier;
pub mod media;
pub mod records;
pub mod version;

pub use identifier::LocalIdentifier;
pub use media::{AlbumMetadata, AssetMetadata, Location, MediaKind, MediaSubtypes, TimezoneInfo};
pub use records::{
    CompositionHandle, ImageRecord, InfoMap, InfoValue, LivePhotoResources, ResourceDescriptor,
    ResourceType, VideoHandle, VideoRecord, INFO_DEGRADED_KEY, INFO_FILE_PATH_KEY,
};
pub use version::{AccessLevel, AssetVersion};
