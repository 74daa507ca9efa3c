// SPDX-License-Identifier: MPL-2.0
//! Mutation transaction engine.
//!
//! All library mutations go through [`TransactionQueue::perform`]: a builder
//! closure collects change operations into a [`ChangeSet`], the batch is
//! submitted through the completion bridge, and the call blocks until the
//! framework commits or rejects the whole transaction. Submissions on one
//! queue are serialized by a mutex, so concurrent facade calls cannot
//! interleave their change sets.
//!
//! Objects created inside a transaction are addressed by placeholder
//! identifiers allocated here; they become real identifiers once the commit
//! succeeds, so callers re-fetch through them afterwards.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use uuid::Uuid;

use crate::bridge::{self, poll_until};
use crate::domain::{CompositionHandle, LocalIdentifier, Location, ResourceType};
use crate::error::{Error, Result};
use crate::framework::{ChangeOp, ExportStatus, LibrarySession, NewResource};
use chrono::{DateTime, Utc};

/// Allocates a placeholder identifier in the framework's identifier format.
fn placeholder_identifier() -> LocalIdentifier {
    LocalIdentifier::new(format!(
        "{}/L0/001",
        Uuid::new_v4().to_string().to_uppercase()
    ))
}

/// Collects the operations of one change transaction.
///
/// Creation methods validate their source files locally and return the
/// placeholder identifier of the object being created. Nothing is submitted
/// until the builder closure returns.
#[derive(Default)]
pub struct ChangeSet {
    ops: Vec<ChangeOp>,
    placeholders: Vec<LocalIdentifier>,
}

impl ChangeSet {
    fn create_asset(&mut self, resources: Vec<NewResource>) -> Result<LocalIdentifier> {
        for resource in &resources {
            if !resource.path.is_file() {
                return Err(Error::FileNotFound(resource.path.clone()));
            }
        }
        let placeholder = placeholder_identifier();
        self.placeholders.push(placeholder.clone());
        self.ops.push(ChangeOp::CreateAsset {
            placeholder: placeholder.clone(),
            resources,
        });
        Ok(placeholder)
    }

    pub fn create_photo(&mut self, path: &Path) -> Result<LocalIdentifier> {
        self.create_asset(vec![NewResource {
            resource_type: ResourceType::Photo,
            path: path.to_path_buf(),
        }])
    }

    pub fn create_video(&mut self, path: &Path) -> Result<LocalIdentifier> {
        self.create_asset(vec![NewResource {
            resource_type: ResourceType::Video,
            path: path.to_path_buf(),
        }])
    }

    /// Creates a live photo from its still and paired-video components.
    pub fn create_live_photo(&mut self, photo: &Path, video: &Path) -> Result<LocalIdentifier> {
        self.create_asset(vec![
            NewResource {
                resource_type: ResourceType::Photo,
                path: photo.to_path_buf(),
            },
            NewResource {
                resource_type: ResourceType::PairedVideo,
                path: video.to_path_buf(),
            },
        ])
    }

    /// Creates a RAW+JPEG pair; the JPEG is the primary resource.
    pub fn create_raw_pair(&mut self, raw: &Path, jpeg: &Path) -> Result<LocalIdentifier> {
        self.create_asset(vec![
            NewResource {
                resource_type: ResourceType::Photo,
                path: jpeg.to_path_buf(),
            },
            NewResource {
                resource_type: ResourceType::AlternatePhoto,
                path: raw.to_path_buf(),
            },
        ])
    }

    pub fn delete_assets(&mut self, assets: &[LocalIdentifier]) {
        self.ops.push(ChangeOp::DeleteAssets(assets.to_vec()));
    }

    pub fn create_album(&mut self, title: &str) -> LocalIdentifier {
        let placeholder = placeholder_identifier();
        self.placeholders.push(placeholder.clone());
        self.ops.push(ChangeOp::CreateAlbum {
            placeholder: placeholder.clone(),
            title: title.to_string(),
        });
        placeholder
    }

    pub fn delete_album(&mut self, album: &LocalIdentifier) {
        self.ops.push(ChangeOp::DeleteAlbum(album.clone()));
    }

    pub fn add_album_members(&mut self, album: &LocalIdentifier, assets: &[LocalIdentifier]) {
        self.ops.push(ChangeOp::AddAlbumMembers {
            album: album.clone(),
            assets: assets.to_vec(),
        });
    }

    pub fn remove_album_members(&mut self, album: &LocalIdentifier, assets: &[LocalIdentifier]) {
        self.ops.push(ChangeOp::RemoveAlbumMembers {
            album: album.clone(),
            assets: assets.to_vec(),
        });
    }

    pub fn set_favorite(&mut self, asset: &LocalIdentifier, value: bool) {
        self.ops.push(ChangeOp::SetFavorite {
            asset: asset.clone(),
            value,
        });
    }

    pub fn set_creation_date(&mut self, asset: &LocalIdentifier, value: Option<DateTime<Utc>>) {
        self.ops.push(ChangeOp::SetCreationDate {
            asset: asset.clone(),
            value,
        });
    }

    pub fn set_modification_date(
        &mut self,
        asset: &LocalIdentifier,
        value: Option<DateTime<Utc>>,
    ) {
        self.ops.push(ChangeOp::SetModificationDate {
            asset: asset.clone(),
            value,
        });
    }

    pub fn set_location(&mut self, asset: &LocalIdentifier, value: Option<Location>) {
        self.ops.push(ChangeOp::SetLocation {
            asset: asset.clone(),
            value,
        });
    }

    pub fn set_keywords(&mut self, asset: &LocalIdentifier, values: &[String]) {
        self.ops.push(ChangeOp::SetKeywords {
            asset: asset.clone(),
            values: values.to_vec(),
        });
    }

    pub fn set_date_added(&mut self, asset: &LocalIdentifier, value: DateTime<Utc>) {
        self.ops.push(ChangeOp::SetDateAdded {
            asset: asset.clone(),
            value,
        });
    }

    pub fn set_timezone(&mut self, asset: &LocalIdentifier, offset_secs: i32, name: &str) {
        self.ops.push(ChangeOp::SetTimezone {
            asset: asset.clone(),
            offset_secs,
            name: name.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Serializes change transactions against one library session.
#[derive(Default)]
pub struct TransactionQueue {
    lock: Mutex<()>,
}

impl TransactionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds and submits one transaction. `wrap` converts the framework's
    /// failure description into the caller's error category. Returns the
    /// placeholder identifiers allocated by the builder, in order.
    ///
    /// An empty change set is not submitted.
    pub fn perform(
        &self,
        session: &dyn LibrarySession,
        wrap: impl FnOnce(String) -> Error,
        build: impl FnOnce(&mut ChangeSet) -> Result<()>,
    ) -> Result<Vec<LocalIdentifier>> {
        let _serialized = self.lock.lock().expect("transaction queue poisoned");
        let mut changes = ChangeSet::default();
        build(&mut changes)?;
        if changes.is_empty() {
            return Ok(changes.placeholders);
        }
        log::debug!("submitting change transaction with {} ops", changes.ops.len());
        bridge::run_blocking(|done| session.perform_changes(changes.ops, done)).map_err(wrap)?;
        Ok(changes.placeholders)
    }
}

/// Exports an in-memory composition to `dest` by driving the framework's
/// export session to a terminal status. The session exposes no completion
/// callback, so progress is polled.
pub fn export_composition(
    session: &dyn LibrarySession,
    handle: &CompositionHandle,
    dest: &Path,
) -> Result<PathBuf> {
    let export = session
        .begin_composition_export(handle, dest)
        .map_err(Error::Export)?;
    let terminal = poll_until(|| {
        let status = export.status();
        status.is_terminal().then_some(status)
    });
    match terminal {
        ExportStatus::Completed => Ok(export.output_path().to_path_buf()),
        ExportStatus::Failed(description) => Err(Error::Export(description)),
        ExportStatus::Cancelled => Err(Error::Export("export session cancelled".to_string())),
        ExportStatus::Waiting | ExportStatus::Exporting => unreachable!("non-terminal status"),
    }
}
