//! LRU of recently relayed envelope digests.
//!
//! Gossip can deliver the same envelope more than once (several peers relay
//! it). Remembering recent digests keeps a duplicate delivery from reaching
//! the payment check and the chain a second time.

use lru::LruCache;
use parking_lot::Mutex;
use sha3::{Digest, Keccak256};
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Keccak-256 digest of a raw envelope.
pub type EnvelopeDigest = [u8; 32];

/// Default capacity (10,000 entries ≈ 320KB of digests).
pub const DEFAULT_DEDUPE_CAPACITY: usize = 10_000;

/// Digest of raw envelope bytes.
#[must_use]
pub fn envelope_digest(data: &[u8]) -> EnvelopeDigest {
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&Keccak256::digest(data));
    digest
}

/// Duplicate suppression statistics.
#[derive(Debug, Default, Clone)]
pub struct DedupeStats {
    /// Envelopes seen for the first time.
    pub fresh: u64,
    /// Envelopes dropped as duplicates.
    pub duplicates: u64,
}

/// Bounded set of recently seen envelope digests.
#[derive(Clone)]
pub struct SeenEnvelopes {
    inner: Arc<Mutex<LruCache<EnvelopeDigest, ()>>>,
    stats: Arc<Mutex<DedupeStats>>,
}

impl SeenEnvelopes {
    /// Create a set with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_DEDUPE_CAPACITY)
    }

    /// Create a set holding at most `capacity` digests (minimum 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(cap))),
            stats: Arc::new(Mutex::new(DedupeStats::default())),
        }
    }

    /// Record `digest`, returning `true` if it had not been seen recently.
    ///
    /// Check and insert happen under one lock, so of two concurrent
    /// deliveries exactly one is reported fresh.
    pub fn first_sighting(&self, digest: EnvelopeDigest) -> bool {
        let fresh = self.inner.lock().put(digest, ()).is_none();

        let mut stats = self.stats.lock();
        if fresh {
            stats.fresh += 1;
        } else {
            stats.duplicates += 1;
        }

        fresh
    }

    /// Drop `digest` so the next delivery of the same envelope is fresh.
    pub fn forget(&self, digest: &EnvelopeDigest) {
        self.inner.lock().pop(digest);
    }

    /// Get current statistics.
    #[must_use]
    pub fn stats(&self) -> DedupeStats {
        self.stats.lock().clone()
    }

    /// Number of remembered digests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether nothing has been seen yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Default for SeenEnvelopes {
    fn default() -> Self {
        Self::new()
    }
}
