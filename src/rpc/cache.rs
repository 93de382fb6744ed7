//! Per-turn result cache for idempotent RPC methods.
//!
//! A burst of calls to, say, `eth_blockNumber` issued within one scheduler
//! turn shares a single upstream call. Each entry moves through
//!
//! ```text
//! Empty ──first call──▶ Pending(gen) ──resolves──▶ Ready(gen)
//!   ▲                        │                        │
//!   └──── end-of-turn callback for gen ◀──────────────┘
//! ```
//!
//! The end-of-turn callback is scheduled through a [`TurnBoundary`] when the
//! entry is created, and only clears the entry if it still carries the same
//! generation, so a late callback never drops a newer entry.

use crate::rpc::error::RpcResult;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Once, Weak};
use tracing::{trace, warn};

type SharedCall = Shared<BoxFuture<'static, RpcResult<Value>>>;

/// Deferred work run once the current scheduler turn has finished.
pub type TurnCallback = Box<dyn FnOnce() + Send + 'static>;

/// Schedules callbacks strictly after the current turn.
pub trait TurnBoundary: Send + Sync {
    /// Run `callback` after the work of the current turn has completed.
    fn at_end_of_turn(&self, callback: TurnCallback);
}

/// Turn boundary of the tokio scheduler: the callback runs in a task that
/// yields once before running, so every task already runnable gets polled first.
///
/// Only meaningful inside a tokio runtime. Called from anywhere else (for
/// example under `futures::executor::block_on`) the callback runs at once,
/// which clears each entry as soon as it is created and disables coalescing.
/// Such callers should supply their own [`TurnBoundary`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioTurnBoundary;

impl TurnBoundary for TokioTurnBoundary {
    fn at_end_of_turn(&self, callback: TurnCallback) {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                tokio::task::yield_now().await;
                callback();
            });
        } else {
            static OUTSIDE_RUNTIME: Once = Once::new();
            OUTSIDE_RUNTIME.call_once(|| {
                warn!("No tokio runtime: per-turn RPC caching is disabled");
            });
            callback();
        }
    }
}

/// Turn boundary driven by hand: callbacks queue up until [`flush`](Self::flush).
#[derive(Default)]
pub struct ManualTurnBoundary {
    queued: Mutex<Vec<TurnCallback>>,
}

impl ManualTurnBoundary {
    /// Create an empty boundary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// End the current turn, running every queued callback.
    pub fn flush(&self) {
        let queued = std::mem::take(&mut *self.queued.lock());
        for callback in queued {
            callback();
        }
    }

    /// Number of callbacks waiting for the end of the turn.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queued.lock().len()
    }
}

impl TurnBoundary for ManualTurnBoundary {
    fn at_end_of_turn(&self, callback: TurnCallback) {
        self.queued.lock().push(callback);
    }
}

/// Observable state of one cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// No result for this turn.
    Empty,
    /// Upstream call in flight.
    Pending,
    /// Result available for the rest of the turn.
    Ready,
}

enum Entry {
    Pending {
        generation: u64,
        call: SharedCall,
    },
    Ready {
        generation: u64,
        result: RpcResult<Value>,
    },
}

impl Entry {
    const fn generation(&self) -> u64 {
        match self {
            Self::Pending { generation, .. } | Self::Ready { generation, .. } => *generation,
        }
    }
}

#[derive(Default)]
struct Entries {
    by_method: HashMap<String, Entry>,
    next_generation: u64,
}

enum Lookup {
    Ready(RpcResult<Value>),
    Pending { generation: u64, call: SharedCall },
}

/// Cache of per-turn results keyed by method name.
pub struct TurnCache {
    entries: Arc<Mutex<Entries>>,
    boundary: Arc<dyn TurnBoundary>,
}

impl TurnCache {
    /// Create a cache whose entries expire at `boundary`'s turn ends.
    #[must_use]
    pub fn new(boundary: Arc<dyn TurnBoundary>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Entries::default())),
            boundary,
        }
    }

    /// State of the entry for `method`.
    #[must_use]
    pub fn state(&self, method: &str) -> EntryState {
        match self.entries.lock().by_method.get(method) {
            None => EntryState::Empty,
            Some(Entry::Pending { .. }) => EntryState::Pending,
            Some(Entry::Ready { .. }) => EntryState::Ready,
        }
    }

    /// Return this turn's result for `method`, starting the call with `start`
    /// only if the entry is empty.
    pub async fn get_or_call<F>(&self, method: &str, start: F) -> RpcResult<Value>
    where
        F: FnOnce() -> BoxFuture<'static, RpcResult<Value>>,
    {
        let (lookup, created) = self.lookup_or_insert(method, start);

        if let Some(generation) = created {
            let entries = Arc::downgrade(&self.entries);
            let method = method.to_string();
            self.boundary.at_end_of_turn(Box::new(move || {
                invalidate(&entries, &method, generation);
            }));
        }

        match lookup {
            Lookup::Ready(result) => result,
            Lookup::Pending { generation, call } => {
                let result = call.await;
                self.complete(method, generation, &result);
                result
            }
        }
    }

    /// Atomically find the current entry or insert a pending one.
    /// Returns the generation of a newly created entry.
    fn lookup_or_insert<F>(&self, method: &str, start: F) -> (Lookup, Option<u64>)
    where
        F: FnOnce() -> BoxFuture<'static, RpcResult<Value>>,
    {
        let mut entries = self.entries.lock();

        match entries.by_method.get(method) {
            Some(Entry::Ready { result, .. }) => {
                trace!("{method} served from this turn's result");
                return (Lookup::Ready(result.clone()), None);
            }
            Some(Entry::Pending { generation, call }) => {
                trace!("{method} joined in-flight call");
                return (
                    Lookup::Pending {
                        generation: *generation,
                        call: call.clone(),
                    },
                    None,
                );
            }
            None => {}
        }

        let generation = entries.next_generation;
        entries.next_generation += 1;

        let call = start().shared();
        entries.by_method.insert(
            method.to_string(),
            Entry::Pending {
                generation,
                call: call.clone(),
            },
        );

        (Lookup::Pending { generation, call }, Some(generation))
    }

    fn complete(&self, method: &str, generation: u64, result: &RpcResult<Value>) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.by_method.get_mut(method) {
            if matches!(entry, Entry::Pending { .. }) && entry.generation() == generation {
                *entry = Entry::Ready {
                    generation,
                    result: result.clone(),
                };
            }
        }
    }
}

fn invalidate(entries: &Weak<Mutex<Entries>>, method: &str, generation: u64) {
    let Some(entries) = entries.upgrade() else {
        return;
    };
    let mut entries = entries.lock();
    if entries
        .by_method
        .get(method)
        .is_some_and(|entry| entry.generation() == generation)
    {
        entries.by_method.remove(method);
        trace!("{method} result expired at end of turn");
    }
}
