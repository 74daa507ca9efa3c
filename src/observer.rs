// SPDX-License-Identifier: MPL-2.0
//! Change observation engine.
//!
//! The framework's change notifications carry no payload; they only say the
//! library changed. [`ChangeMonitor`] keeps a snapshot of the asset table,
//! queues raw notifications as they arrive from framework threads, and
//! resolves them into batches of classified facade assets when the owner
//! pumps it. Registration alone makes nothing happen: a monitor whose owner
//! never pumps never reports.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::asset::Asset;
use crate::bridge::MIN_SLEEP;
use crate::domain::AssetMetadata;
use crate::error::{Error, Result};
use crate::framework::{LibrarySession, ObserverToken};
use crate::library::LibraryCore;

/// One resolved batch of library changes. Members are facade assets, so a
/// callback can export or mutate them directly.
///
/// Removed assets are wrapped from the stale snapshot; their accessors
/// reflect the state before deletion and any further operation on them fails
/// at the framework.
#[derive(Default)]
pub struct AssetChanges {
    pub added: Vec<Asset>,
    pub removed: Vec<Asset>,
    pub updated: Vec<Asset>,
}

impl AssetChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

enum State {
    Unregistered,
    Observing {
        token: ObserverToken,
        snapshot: HashMap<String, AssetMetadata>,
    },
}

/// Observes one library session for asset changes.
///
/// Lifecycle: Unregistered, [`start`](ChangeMonitor::start), Observing,
/// [`stop`](ChangeMonitor::stop), Unregistered again. Dropping an observing
/// monitor unregisters it.
pub struct ChangeMonitor {
    core: Arc<LibraryCore>,
    state: State,
    pending: Arc<AtomicUsize>,
    handler: Box<dyn FnMut(AssetChanges)>,
}

impl ChangeMonitor {
    pub(crate) fn new(
        core: Arc<LibraryCore>,
        handler: impl FnMut(AssetChanges) + 'static,
    ) -> Self {
        Self {
            core,
            state: State::Unregistered,
            pending: Arc::new(AtomicUsize::new(0)),
            handler: Box::new(handler),
        }
    }

    /// Snapshots the library and registers for notifications. Changes that
    /// occurred before this call are not reported. Starting an already
    /// observing monitor is an error.
    pub fn start(&mut self) -> Result<()> {
        if matches!(self.state, State::Observing { .. }) {
            return Err(Error::Observer("monitor is already observing".to_string()));
        }
        let snapshot = snapshot_assets(self.core.session.as_ref());
        self.pending.store(0, Ordering::SeqCst);
        let pending = Arc::clone(&self.pending);
        let token = self.core.session.register_observer(Arc::new(move || {
            pending.fetch_add(1, Ordering::SeqCst);
        }));
        log::debug!("change monitor started over {} assets", snapshot.len());
        self.state = State::Observing { token, snapshot };
        Ok(())
    }

    /// Unregisters. Idempotent; queued notifications are discarded.
    pub fn stop(&mut self) {
        if let State::Observing { token, .. } =
            std::mem::replace(&mut self.state, State::Unregistered)
        {
            self.core.session.unregister_observer(token);
            self.pending.store(0, Ordering::SeqCst);
        }
    }

    /// Resolves queued notifications into one batch and invokes the handler
    /// if anything actually changed. Returns whether a batch was delivered.
    pub fn pump_once(&mut self) -> Result<bool> {
        let snapshot = match &mut self.state {
            State::Observing { snapshot, .. } => snapshot,
            State::Unregistered => {
                return Err(Error::Observer("monitor is not observing".to_string()))
            }
        };
        if self.pending.swap(0, Ordering::SeqCst) == 0 {
            return Ok(false);
        }

        let current = snapshot_assets(self.core.session.as_ref());
        let mut changes = AssetChanges::default();
        for (uuid, metadata) in &current {
            match snapshot.get(uuid) {
                None => changes
                    .added
                    .extend(wrap_asset(&self.core, metadata.clone())),
                Some(previous) if previous != metadata => changes
                    .updated
                    .extend(wrap_asset(&self.core, metadata.clone())),
                Some(_) => {}
            }
        }
        for (uuid, metadata) in snapshot.iter() {
            if !current.contains_key(uuid) {
                changes
                    .removed
                    .extend(wrap_asset(&self.core, metadata.clone()));
            }
        }
        *snapshot = current;

        if changes.is_empty() {
            return Ok(false);
        }
        log::debug!(
            "change batch: {} added, {} removed, {} updated",
            changes.added.len(),
            changes.removed.len(),
            changes.updated.len()
        );
        (self.handler)(changes);
        Ok(true)
    }

    /// Pumps cooperatively until `stop` is set, sleeping between polls.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<()> {
        while !stop.load(Ordering::SeqCst) {
            if !self.pump_once()? {
                std::thread::sleep(MIN_SLEEP);
            }
        }
        Ok(())
    }

    pub fn is_observing(&self) -> bool {
        matches!(self.state, State::Observing { .. })
    }
}

impl Drop for ChangeMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn snapshot_assets(session: &dyn LibrarySession) -> HashMap<String, AssetMetadata> {
    session
        .fetch_all_assets()
        .into_iter()
        .map(|asset| (asset.uuid().to_string(), asset))
        .collect()
}

/// Changed assets that no longer classify are dropped from the batch rather
/// than aborting the pump.
fn wrap_asset(core: &Arc<LibraryCore>, metadata: AssetMetadata) -> Option<Asset> {
    match Asset::from_metadata(Arc::clone(core), metadata) {
        Ok(asset) => Some(asset),
        Err(err) => {
            log::warn!("skipping unclassifiable changed asset: {}", err);
            None
        }
    }
}
