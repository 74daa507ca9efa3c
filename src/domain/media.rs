// SPDX-License-Identifier: MPL-2.0
//! Asset and album metadata snapshots.
//!
//! [`AssetMetadata`] is the synchronous accessor surface of a framework
//! asset, captured at fetch time. Facade objects cache one snapshot and must
//! replace it by re-fetching after any mutation; the framework does not
//! update handles in place.

use crate::domain::identifier::LocalIdentifier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Media kind of an asset. Raw kind values outside this set are a hard
/// error at classification time, not a fourth variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
}

impl MediaKind {
    /// Raw framework values: 1 = image, 2 = video, 3 = audio.
    pub fn from_raw(raw: i32) -> Option<MediaKind> {
        match raw {
            1 => Some(MediaKind::Photo),
            2 => Some(MediaKind::Video),
            3 => Some(MediaKind::Audio),
            _ => None,
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            MediaKind::Photo => 1,
            MediaKind::Video => 2,
            MediaKind::Audio => 3,
        }
    }
}

/// Media subtype flags, stored as the framework's bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaSubtypes(pub u32);

impl MediaSubtypes {
    pub const PANORAMA: u32 = 1 << 0;
    pub const HDR: u32 = 1 << 1;
    pub const SCREENSHOT: u32 = 1 << 2;
    pub const LIVE: u32 = 1 << 3;
    pub const PORTRAIT: u32 = 1 << 4;
    pub const STREAMED: u32 = 1 << 16;
    pub const SLOW_MO: u32 = 1 << 17;
    pub const TIME_LAPSE: u32 = 1 << 18;

    pub fn contains(self, flag: u32) -> bool {
        self.0 & flag != 0
    }

    pub fn with(self, flag: u32) -> Self {
        Self(self.0 | flag)
    }

    pub fn panorama(self) -> bool {
        self.contains(Self::PANORAMA)
    }

    pub fn hdr(self) -> bool {
        self.contains(Self::HDR)
    }

    pub fn screenshot(self) -> bool {
        self.contains(Self::SCREENSHOT)
    }

    pub fn live(self) -> bool {
        self.contains(Self::LIVE)
    }

    pub fn portrait(self) -> bool {
        self.contains(Self::PORTRAIT)
    }

    pub fn streamed(self) -> bool {
        self.contains(Self::STREAMED)
    }

    pub fn slow_mo(self) -> bool {
        self.contains(Self::SLOW_MO)
    }

    pub fn time_lapse(self) -> bool {
        self.contains(Self::TIME_LAPSE)
    }
}

/// Geolocation of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Timezone the asset was captured in, from the library metadata store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimezoneInfo {
    /// Offset from UTC in seconds.
    pub offset_secs: i32,
    /// IANA timezone name, e.g. `America/Los_Angeles`.
    pub name: String,
}

/// Snapshot of one asset's synchronous accessor properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub local_identifier: LocalIdentifier,
    /// Raw media kind value; see [`MediaKind::from_raw`]. Kept raw so an
    /// unknown kind survives until classification, where it becomes an error.
    pub kind_raw: i32,
    pub subtypes: MediaSubtypes,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub creation_date: Option<DateTime<Utc>>,
    pub modification_date: Option<DateTime<Utc>>,
    pub location: Option<Location>,
    pub favorite: bool,
    pub hidden: bool,
    /// Duration in seconds; 0.0 for photos.
    pub duration: f64,
    pub keywords: Vec<String>,
    pub burst_identifier: Option<String>,
    /// Filename the asset was imported with.
    pub original_filename: String,
    /// Original filename of the RAW component of a RAW+JPEG pair, if any.
    pub raw_filename: Option<String>,
    /// Format identifier of the RAW component, if any.
    pub raw_uti: Option<String>,
}

impl AssetMetadata {
    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_raw(self.kind_raw)
    }

    pub fn uuid(&self) -> &str {
        self.local_identifier.uuid()
    }

    pub fn is_burst(&self) -> bool {
        self.burst_identifier.is_some()
    }
}

/// Snapshot of one album's synchronous accessor properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumMetadata {
    pub local_identifier: LocalIdentifier,
    pub title: String,
    /// Estimated member count; the framework may report this without
    /// enumerating members.
    pub estimated_count: usize,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub approximate_location: Option<Location>,
}
