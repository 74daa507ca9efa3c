// SPDX-License-Identifier: MPL-2.0
//! Completion bridge: blocking wrappers around the framework's
//! callback-driven asynchronous calls.
//!
//! The framework executes every request on its own internal threads and
//! reports completion by invoking a callback from an arbitrary thread,
//! exactly once. [`OneShot`] is the single-use latch that carries that one
//! callback invocation back to the blocked caller; [`run_blocking`] is the
//! ok/error specialization used by mutation-style completions.
//!
//! There is deliberately no timeout anywhere here: the framework itself has
//! none, and a call that never completes hangs the caller. Operations that
//! expose only a pollable status field (composition export) use
//! [`poll_until`] with a fixed minimum sleep instead.

use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::time::Duration;

/// Minimum sleep between iterations of a polling or notification-pump loop.
pub const MIN_SLEEP: Duration = Duration::from_millis(15);

/// Name of the one-shot notification posted when a live-photo request
/// delivers its final, non-degraded result.
pub const NOTIFICATION_FINISHED_REQUEST: &str = "PhotoBridgeNotificationFinishedRequest";

// =============================================================================
// OneShot
// =============================================================================

/// Single-use, thread-safe latch carrying one value from a framework
/// callback thread to the blocked caller.
///
/// The first [`post`](OneShot::post) wins; later posts are ignored so a
/// misbehaving callback cannot corrupt an already-observed result. Both ends
/// hold an `Arc`; dropping the callback without posting leaves the waiter
/// blocked forever, which mirrors the framework's own no-timeout contract.
pub struct OneShot<T> {
    slot: Mutex<Option<T>>,
    signal: Condvar,
}

impl<T> OneShot<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(None),
            signal: Condvar::new(),
        })
    }

    /// Records the value and wakes the waiter. Ignored if a value was
    /// already posted.
    pub fn post(&self, value: T) {
        let mut slot = self.slot.lock().expect("oneshot lock poisoned");
        if slot.is_none() {
            *slot = Some(value);
            self.signal.notify_all();
        }
    }

    /// Blocks the calling thread until a value is posted, then takes it.
    pub fn wait(&self) -> T {
        let mut slot = self.slot.lock().expect("oneshot lock poisoned");
        loop {
            if let Some(value) = slot.take() {
                return value;
            }
            slot = self.signal.wait(slot).expect("oneshot lock poisoned");
        }
    }
}

// =============================================================================
// run_blocking
// =============================================================================

/// Completion handler handed to a submission function: `(ok, description)`.
pub type Completion = Box<dyn FnOnce(bool, Option<String>) + Send + 'static>;

/// Converts one fire-and-forget asynchronous call into a blocking one.
///
/// `submit` must trigger exactly one asynchronous framework operation and
/// arrange for the given completion handler to be invoked exactly once, from
/// any thread, when it finishes. The calling thread blocks until then.
///
/// On failure the framework's error description is returned; callers convert
/// it into the typed error of their category. Everything captured by the
/// handler is dropped before this function returns, on both paths.
pub fn run_blocking(submit: impl FnOnce(Completion)) -> Result<(), String> {
    let latch: Arc<OneShot<(bool, Option<String>)>> = OneShot::new();
    let signal = Arc::clone(&latch);
    submit(Box::new(move |ok, description| {
        signal.post((ok, description));
    }));
    match latch.wait() {
        (true, _) => Ok(()),
        (false, description) => Err(description.unwrap_or_else(|| "unknown error".to_string())),
    }
}

/// Polls `status` with a fixed [`MIN_SLEEP`] interval until it yields a
/// value. Unbounded, like every other wait in this module. Used only where
/// the framework offers no usable completion callback.
pub fn poll_until<T>(mut status: impl FnMut() -> Option<T>) -> T {
    loop {
        if let Some(value) = status() {
            return value;
        }
        std::thread::sleep(MIN_SLEEP);
    }
}

// =============================================================================
// Notification center
// =============================================================================

/// Process-wide notification center for the one request shape that cannot
/// use the latch: the live-photo request reports a possibly-degraded result
/// through its handler and the final result later, signalled here.
pub struct NotificationCenter {
    subscribers: Mutex<Vec<Subscriber>>,
    next_token: Mutex<u64>,
}

struct Subscriber {
    token: u64,
    name: &'static str,
    posted: Arc<(Mutex<bool>, Condvar)>,
}

static DEFAULT_CENTER: OnceLock<NotificationCenter> = OnceLock::new();

impl NotificationCenter {
    /// The process-wide default center.
    pub fn default_center() -> &'static NotificationCenter {
        DEFAULT_CENTER.get_or_init(|| NotificationCenter {
            subscribers: Mutex::new(Vec::new()),
            next_token: Mutex::new(0),
        })
    }

    /// Registers a one-shot subscription for `name`. The returned guard
    /// unsubscribes when dropped, so an interrupted wait cannot leak the
    /// registration.
    pub fn subscribe_once(&'static self, name: &'static str) -> NotificationGuard {
        let posted = Arc::new((Mutex::new(false), Condvar::new()));
        let token = {
            let mut next = self.next_token.lock().expect("notification lock poisoned");
            *next += 1;
            *next
        };
        self.subscribers
            .lock()
            .expect("notification lock poisoned")
            .push(Subscriber {
                token,
                name,
                posted: Arc::clone(&posted),
            });
        NotificationGuard {
            center: self,
            token,
            posted,
        }
    }

    /// Posts `name` to all current subscribers. Callable from any thread.
    pub fn post(&self, name: &str) {
        let subscribers = self.subscribers.lock().expect("notification lock poisoned");
        for subscriber in subscribers.iter().filter(|s| s.name == name) {
            let (flag, signal) = &*subscriber.posted;
            *flag.lock().expect("notification flag poisoned") = true;
            signal.notify_all();
        }
    }

    fn unsubscribe(&self, token: u64) {
        self.subscribers
            .lock()
            .expect("notification lock poisoned")
            .retain(|s| s.token != token);
    }
}

/// Scoped one-shot subscription; see [`NotificationCenter::subscribe_once`].
pub struct NotificationGuard {
    center: &'static NotificationCenter,
    token: u64,
    posted: Arc<(Mutex<bool>, Condvar)>,
}

impl NotificationGuard {
    /// Runs a dedicated event pump on the calling thread until the
    /// notification is posted. One iteration per [`MIN_SLEEP`]; no deadline.
    ///
    /// While this pump runs, no other blocking bridge call may be issued
    /// from the same thread; the two would deadlock against each other.
    pub fn pump_until_posted(&self) {
        let (flag, signal) = &*self.posted;
        let mut posted = flag.lock().expect("notification flag poisoned");
        while !*posted {
            let (guard, _timeout) = signal
                .wait_timeout(posted, MIN_SLEEP)
                .expect("notification flag poisoned");
            posted = guard;
        }
    }

    /// A handle the posting side can use to signal this subscription
    /// directly, bypassing name lookup.
    pub fn poster(&self) -> NotificationPoster {
        NotificationPoster {
            posted: Arc::clone(&self.posted),
        }
    }
}

impl Drop for NotificationGuard {
    fn drop(&mut self) {
        self.center.unsubscribe(self.token);
    }
}

/// Cloneable posting handle for one subscription.
#[derive(Clone)]
pub struct NotificationPoster {
    posted: Arc<(Mutex<bool>, Condvar)>,
}

impl NotificationPoster {
    pub fn post(&self) {
        let (flag, signal) = &*self.posted;
        *flag.lock().expect("notification flag poisoned") = true;
        signal.notify_all();
    }
}
