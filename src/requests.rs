// SPDX-License-Identifier: MPL-2.0
//! Resource request engine.
//!
//! Every operation here follows the same template: validate locally, submit
//! one asynchronous framework request through the completion bridge, block
//! until the callback fires, and hand back a typed record. Results are owned
//! by the caller; nothing is cached. Network retrieval is always permitted
//! and delivery is always full quality, so a cloud-only asset blocks until
//! downloaded rather than failing fast.

use std::sync::{Arc, Mutex};

use crate::bridge::{self, OneShot, NOTIFICATION_FINISHED_REQUEST};
use crate::domain::{
    AssetVersion, ImageRecord, LivePhotoResources, LocalIdentifier, ResourceDescriptor,
    VideoRecord,
};
use crate::error::{Error, Result};
use crate::framework::LibrarySession;

/// Requests the image data of an asset at the given version.
pub fn request_image(
    session: &dyn LibrarySession,
    asset: &LocalIdentifier,
    version: AssetVersion,
) -> Result<ImageRecord> {
    let latch: Arc<OneShot<std::result::Result<ImageRecord, String>>> = OneShot::new();
    let signal = Arc::clone(&latch);
    session.request_image_data(asset, version, Box::new(move |result| signal.post(result)));
    latch.wait().map_err(Error::Export)
}

/// Requests a playable handle for an asset's video at the given version.
///
/// The handle may be an in-memory composition rather than a file; callers
/// that need a flat file must export the composition through the
/// transaction engine.
pub fn request_video(
    session: &dyn LibrarySession,
    asset: &LocalIdentifier,
    version: AssetVersion,
) -> Result<VideoRecord> {
    let latch: Arc<OneShot<std::result::Result<VideoRecord, String>>> = OneShot::new();
    let signal = Arc::clone(&latch);
    session.request_video(asset, version, Box::new(move |result| signal.post(result)));
    latch.wait().map_err(Error::Export)
}

/// Streams the bytes of one typed resource and returns them fully
/// accumulated. On failure all accumulated bytes are discarded; a partial
/// payload is never returned.
pub fn request_resource(
    session: &dyn LibrarySession,
    resource: &ResourceDescriptor,
    version: AssetVersion,
) -> Result<Vec<u8>> {
    let buffer: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&buffer);
    let outcome = bridge::run_blocking(|done| {
        session.request_resource(
            resource,
            version,
            Box::new(move |chunk| {
                sink.lock().expect("resource buffer poisoned").extend(chunk);
            }),
            done,
        );
    });
    match outcome {
        Ok(()) => {
            let mut buffer = buffer.lock().expect("resource buffer poisoned");
            Ok(std::mem::take(&mut *buffer))
        }
        Err(description) => Err(Error::Export(description)),
    }
}

/// Requests a live photo and returns the descriptors of its two resource
/// components once the final, non-degraded result has been delivered.
///
/// The framework may deliver a degraded preliminary result first; this
/// operation ignores it and waits for the final delivery, signalled through
/// a one-shot notification pumped on the calling thread. The subscription is
/// torn down unconditionally, including on failure.
pub fn request_live_photo_resources(
    session: &dyn LibrarySession,
    asset: &LocalIdentifier,
    version: AssetVersion,
) -> Result<LivePhotoResources> {
    let guard =
        bridge::NotificationCenter::default_center().subscribe_once(NOTIFICATION_FINISHED_REQUEST);
    let poster = guard.poster();

    type FinalSlot = Arc<Mutex<Option<std::result::Result<LivePhotoResources, String>>>>;
    let slot: FinalSlot = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&slot);

    session.request_live_photo(
        asset,
        version,
        Box::new(move |delivery| {
            let outcome = match delivery {
                Ok(delivery) if delivery.degraded => return,
                Ok(delivery) => Ok(delivery.resources),
                Err(description) => Err(description),
            };
            *sink.lock().expect("live photo slot poisoned") = Some(outcome);
            poster.post();
        }),
    );

    guard.pump_until_posted();
    let outcome = slot
        .lock()
        .expect("live photo slot poisoned")
        .take()
        .ok_or_else(|| Error::Export("live photo request signalled without a result".to_string()))?;
    outcome.map_err(Error::Export)
}
