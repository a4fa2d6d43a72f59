//! Pluggable update sources.
//!
//! External crates implement these against the hosted backend. Both the
//! subscription channel and the polling fetch produce the same
//! `RequestUpdate` payloads, so either can feed the reducer first.

use std::future::Future;
use std::pin::Pin;

use futures_core::Stream;

use super::types::{RequestUpdate, Responder};
use resq_directory::ResponderId;

pub type UpdateStream = Pin<Box<dyn Stream<Item = RequestUpdate> + Send>>;

#[derive(Debug, thiserror::Error)]
#[error("update feed unavailable: {0}")]
pub struct FeedError(pub String);

/// Retained channel handle; releasing it (or dropping it) unsubscribes.
pub struct SubscriptionGuard(Option<Box<dyn FnOnce() + Send>>);

impl SubscriptionGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(release)))
    }

    pub fn noop() -> Self {
        Self(None)
    }

    pub fn release(mut self) {
        if let Some(release) = self.0.take() {
            release();
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(release) = self.0.take() {
            release();
        }
    }
}

pub struct UpdateSubscription {
    pub updates: UpdateStream,
    pub guard: SubscriptionGuard,
}

/// Change-subscription channel delivering partial-record payloads for
/// every request owned by a user. Delivery order, deduplication, and
/// latency are all unspecified; the reducer tolerates that.
pub trait UpdateFeed: Send + Sync {
    fn subscribe<'a>(
        &'a self,
        user_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<UpdateSubscription, FeedError>> + Send + 'a>>;
}

/// Authoritative listing of a user's non-terminal requests. Used for the
/// cold-start reconciliation pass and as the polling fallback when the
/// subscription channel is silent or unavailable.
pub trait RequestDirectory: Send + Sync {
    fn list_active_requests<'a>(
        &'a self,
        user_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RequestUpdate>, FeedError>> + Send + 'a>>;
}

/// Best-effort responder detail lookup. Failures surface as `None` and
/// are simply skipped; the trip stays usable with partial responder info.
pub trait ResponderLookup: Send + Sync {
    fn get_responder<'a>(
        &'a self,
        id: &'a ResponderId,
    ) -> Pin<Box<dyn Future<Output = Option<Responder>> + Send + 'a>>;
}
