//! Latest-wins request tokens for split/merge runs that may be superseded
//! before they finish.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn id(self) -> u64 {
        self.0
    }

    pub fn from_id(id: u64) -> Self {
        RequestToken(id)
    }
}

#[derive(Debug, Default)]
pub struct RequestGate {
    latest: AtomicU64,
}

impl RequestGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a token that supersedes every token issued before it.
    pub fn begin(&self) -> RequestToken {
        RequestToken(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        self.latest.load(Ordering::Acquire) == token.0
    }

    /// Passes `value` through only if no newer request has begun.
    pub fn accept<T>(&self, token: RequestToken, value: T) -> Option<T> {
        if self.is_current(token) {
            Some(value)
        } else {
            tracing::trace!(token = token.0, "dropping superseded result");
            None
        }
    }
}
