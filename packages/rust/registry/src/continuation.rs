//! Per-channel continuation state for multi-match replies.
//!
//! When matching yields several entities, one is delivered immediately and the
//! rest queue here. Each follow-up request takes exactly one entity. Every new
//! delivery for a channel cancels the token of the previous one, so an
//! in-flight multi-chunk delivery stops instead of interleaving.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use crate::entity::LocationEntity;

/// Identifier of one conversation channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub u64);

struct Pending {
    tail: VecDeque<Arc<LocationEntity>>,
    token: CancellationToken,
}

/// Undelivered match tails keyed by channel.
#[derive(Default)]
pub struct ContinuationStore {
    inner: Mutex<HashMap<ChannelId, Pending>>,
}

impl ContinuationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new delivery for `channel`, storing `tail` for follow-ups.
    ///
    /// Cancels the channel's previous delivery token. Returns the token that
    /// guards the new delivery; an empty `tail` clears the channel state.
    pub fn begin(
        &self,
        channel: ChannelId,
        tail: Vec<Arc<LocationEntity>>,
    ) -> CancellationToken {
        let token = CancellationToken::new();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(previous) = inner.remove(&channel) {
            previous.token.cancel();
        }
        if !tail.is_empty() {
            inner.insert(
                channel,
                Pending {
                    tail: tail.into(),
                    token: token.clone(),
                },
            );
        }
        token
    }

    /// Take the next pending entity for `channel`.
    ///
    /// Cancels the previous delivery token and returns the entity together
    /// with a fresh token guarding its delivery. The channel state clears
    /// once the tail is exhausted; `None` when nothing is pending.
    pub fn advance(&self, channel: ChannelId) -> Option<(Arc<LocationEntity>, CancellationToken)> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut pending = inner.remove(&channel)?;
        pending.token.cancel();

        let next = pending.tail.pop_front()?;
        let token = CancellationToken::new();
        if !pending.tail.is_empty() {
            inner.insert(
                channel,
                Pending {
                    tail: pending.tail,
                    token: token.clone(),
                },
            );
        }
        Some((next, token))
    }

    /// Display name of the next pending entity, for continuation hints.
    pub fn peek_name(&self, channel: ChannelId) -> Option<String> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let pending = inner.get(&channel)?;
        pending
            .tail
            .front()
            .map(|e| e.display_name().unwrap_or(&e.key).to_string())
    }

    /// Number of entities still pending for `channel`.
    pub fn pending(&self, channel: ChannelId) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.get(&channel).map_or(0, |p| p.tail.len())
    }

    /// Drop any pending state for `channel`, cancelling its delivery.
    pub fn clear(&self, channel: ChannelId) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = inner.remove(&channel) {
            previous.token.cancel();
        }
    }
}
