//! Remote client abstraction for the lobby server.
//!
//! The [`RemoteClient`] trait issues one [`Request`] and yields the decoded
//! JSON body of the response. Everything about how the request travels (HTTP
//! library, base URL, TLS, headers) stays behind the trait; the session
//! controller only sees bodies and [`SessionError`]s.
//!
//! # Error mapping
//!
//! Implementations are expected to map failures as follows:
//!
//! | Situation                       | Error                                    |
//! |---------------------------------|------------------------------------------|
//! | Server unreachable / I/O failed | [`SessionError::TransportFailure`]        |
//! | HTTP 401                        | [`SessionError::AuthInvalid`]             |
//! | Any other non-success status    | [`SessionError::rejected`]                |
//! | Body is not JSON                | [`SessionError::Serialization`]           |
//!
//! An empty success body must be returned as [`Value::Null`].
//!
//! # Implementing a Custom Remote
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use lobby_session_client::error::SessionError;
//! use lobby_session_client::protocol::Request;
//! use lobby_session_client::remote::RemoteClient;
//! use serde_json::Value;
//!
//! struct MyRemote { /* ... */ }
//!
//! #[async_trait]
//! impl RemoteClient for MyRemote {
//!     async fn request(&self, request: Request) -> Result<Value, SessionError> {
//!         // Send `request` to the server and decode the body
//!         todo!()
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

use crate::error::SessionError;
use crate::protocol::Request;

/// Issues requests to the remote authority.
///
/// The trait is object-safe; the session controller stores it as
/// `Box<dyn RemoteClient>` and calls it concurrently from user operations and
/// poll ticks, hence `&self` and `Send + Sync`.
///
/// # Cancel Safety
///
/// Poll ticks are aborted when polling stops, which drops the future returned
/// by [`request`](RemoteClient::request) mid-flight. Implementations must
/// tolerate that (any `reqwest`/`hyper` based client does).
#[async_trait]
pub trait RemoteClient: Send + Sync + 'static {
    /// Send `request` and return the decoded response body.
    ///
    /// # Errors
    ///
    /// See the [module documentation](self) for the expected error mapping.
    async fn request(&self, request: Request) -> Result<Value, SessionError>;
}

#[async_trait]
impl<R: RemoteClient + ?Sized> RemoteClient for Arc<R> {
    async fn request(&self, request: Request) -> Result<Value, SessionError> {
        (**self).request(request).await
    }
}

/// Counts requests in flight and publishes whether any are outstanding.
///
/// Every remote call made by the controller holds an [`InFlight`] guard for
/// its duration, so the busy flag falls back to `false` whether the request
/// succeeded, failed, or was cancelled.
#[derive(Debug)]
pub struct RequestTracker {
    in_flight: AtomicUsize,
    busy_tx: watch::Sender<bool>,
}

impl RequestTracker {
    pub fn new() -> Self {
        let (busy_tx, _) = watch::channel(false);
        Self {
            in_flight: AtomicUsize::new(0),
            busy_tx,
        }
    }

    /// Mark a request as started. The returned guard marks it finished on drop.
    pub fn begin(self: &Arc<Self>) -> InFlight {
        if self.in_flight.fetch_add(1, Ordering::AcqRel) == 0 {
            self.busy_tx.send_replace(true);
        }
        InFlight {
            tracker: Arc::clone(self),
        }
    }

    /// Returns `true` while at least one request is outstanding.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) > 0
    }

    /// Subscribe to busy-flag changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.busy_tx.subscribe()
    }

    fn finish(&self) {
        if self.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.busy_tx.send_replace(false);
        }
    }
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard for one outstanding request. See [`RequestTracker::begin`].
#[derive(Debug)]
pub struct InFlight {
    tracker: Arc<RequestTracker>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.tracker.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_until_last_guard_drops() {
        let tracker = Arc::new(RequestTracker::new());
        let rx = tracker.subscribe();
        assert!(!tracker.is_busy());

        let first = tracker.begin();
        let second = tracker.begin();
        assert!(tracker.is_busy());
        assert!(*rx.borrow());

        drop(first);
        assert!(tracker.is_busy());

        drop(second);
        assert!(!tracker.is_busy());
        assert!(!*rx.borrow());
    }
}
