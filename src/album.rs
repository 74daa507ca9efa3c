// SPDX-License-Identifier: MPL-2.0
//! Album facade.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::asset::Asset;
use crate::domain::{AlbumMetadata, LocalIdentifier};
use crate::error::{Error, Result};
use crate::library::LibraryCore;

/// One user album. Like assets, the metadata snapshot is replaced by a
/// re-fetch after every mutation.
pub struct Album {
    core: Arc<LibraryCore>,
    metadata: AlbumMetadata,
}

impl Album {
    pub(crate) fn new(core: Arc<LibraryCore>, metadata: AlbumMetadata) -> Self {
        Self { core, metadata }
    }

    pub fn metadata(&self) -> &AlbumMetadata {
        &self.metadata
    }

    pub fn local_identifier(&self) -> &LocalIdentifier {
        &self.metadata.local_identifier
    }

    pub fn uuid(&self) -> &str {
        self.metadata.local_identifier.uuid()
    }

    pub fn title(&self) -> &str {
        &self.metadata.title
    }

    /// Member count as estimated by the framework, available without
    /// enumerating members.
    pub fn estimated_count(&self) -> usize {
        self.metadata.estimated_count
    }

    pub fn start_date(&self) -> Option<DateTime<Utc>> {
        self.metadata.start_date
    }

    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        self.metadata.end_date
    }

    /// Enumerates the album's members as classified assets.
    pub fn assets(&self) -> Result<Vec<Asset>> {
        self.core
            .session
            .fetch_assets_in_album(&self.metadata.local_identifier)
            .into_iter()
            .map(|metadata| Asset::from_metadata(Arc::clone(&self.core), metadata))
            .collect()
    }

    /// Adds assets to the album in one transaction. Assets already in the
    /// album are left alone.
    pub fn add_assets(&mut self, assets: &[Asset]) -> Result<()> {
        let ids: Vec<LocalIdentifier> = assets
            .iter()
            .map(|asset| asset.local_identifier().clone())
            .collect();
        let album = self.metadata.local_identifier.clone();
        self.core.queue.perform(
            self.core.session.as_ref(),
            Error::AlbumAddAsset,
            |changes| {
                changes.add_album_members(&album, &ids);
                Ok(())
            },
        )?;
        self.refresh()
    }

    /// Removes assets from the album in one transaction. The assets stay in
    /// the library.
    pub fn remove_assets(&mut self, assets: &[Asset]) -> Result<()> {
        let ids: Vec<LocalIdentifier> = assets
            .iter()
            .map(|asset| asset.local_identifier().clone())
            .collect();
        let album = self.metadata.local_identifier.clone();
        self.core
            .queue
            .perform(self.core.session.as_ref(), Error::Mutation, |changes| {
                changes.remove_album_members(&album, &ids);
                Ok(())
            })?;
        self.refresh()
    }

    /// Replaces the cached snapshot with a fresh fetch.
    pub fn refresh(&mut self) -> Result<()> {
        self.metadata = self.core.refetch_album(self.metadata.local_identifier.uuid())?;
        Ok(())
    }
}
