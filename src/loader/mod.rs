//! Background brick loader (C9): a bounded priority queue of outstanding
//! fetches, at most one in flight per brick, cancellable on eviction or
//! purge, with backpressure that replaces the lowest-priority queued entry
//! rather than growing without bound.
//!
//! Grounded on the teacher's `AsyncChunkLoader` (`voxel/streaming/async_loader.rs`):
//! a `pending` map plus a `completed` buffer drained once per frame. That
//! type's queue was unbounded and synchronous; this one adds the priority
//! ordering, capacity bound, and real `tokio::spawn` fetches the spec calls
//! for, fed by either a local [`brickvol_core::format::Reader`] or a
//! [`brickvol_net::dataset::RemoteDataset`] through the same `FetchFn` seam.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::{Notify, Semaphore};

use brickvol_core::error::Result;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Fetches a single brick's raw payload, local reader or remote client alike.
pub type FetchFn = Arc<dyn Fn(u64) -> BoxFuture<Result<Vec<u8>>> + Send + Sync>;

#[derive(Clone, Debug)]
pub struct LoadedBrick {
    pub brick_index: u64,
    pub payload: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct QueueEntry {
    brick_index: u64,
    priority: f32,
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.brick_index.cmp(&self.brick_index))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Inner {
    queue: BinaryHeap<QueueEntry>,
    inflight: HashSet<u64>,
    cancelled: HashSet<u64>,
    completed: Vec<LoadedBrick>,
}

/// Coalescing, priority-ordered background fetch queue.
pub struct BackgroundLoader {
    inner: Mutex<Inner>,
    capacity: usize,
    fetch: FetchFn,
    concurrency: Arc<Semaphore>,
    notify: Notify,
}

impl BackgroundLoader {
    pub fn new(fetch: FetchFn, capacity: usize, max_concurrent: usize) -> Arc<Self> {
        Arc::new(BackgroundLoader {
            inner: Mutex::new(Inner {
                queue: BinaryHeap::new(),
                inflight: HashSet::new(),
                cancelled: HashSet::new(),
                completed: Vec::new(),
            }),
            capacity,
            fetch,
            concurrency: Arc::new(Semaphore::new(max_concurrent.max(1))),
            notify: Notify::new(),
        })
    }

    /// Enqueue a fetch at `priority` (higher runs first). Returns `false`
    /// if the queue was at capacity and `priority` did not beat the lowest
    /// queued priority (request dropped, no backpressure stall).
    pub fn request(&self, brick_index: u64, priority: f32) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.inflight.contains(&brick_index) {
            return true;
        }
        inner.cancelled.remove(&brick_index);

        if inner.queue.iter().any(|e| e.brick_index == brick_index) {
            return true;
        }

        if inner.queue.len() < self.capacity {
            inner.queue.push(QueueEntry { brick_index, priority });
            drop(inner);
            self.notify.notify_one();
            return true;
        }

        let lowest = inner.queue.iter().copied().min();
        match lowest {
            Some(lowest) if priority > lowest.priority => {
                inner.queue.retain(|e| e.brick_index != lowest.brick_index);
                inner.queue.push(QueueEntry { brick_index, priority });
                drop(inner);
                self.notify.notify_one();
                true
            }
            _ => false,
        }
    }

    /// Cancel a queued or in-flight fetch. In-flight fetches still run to
    /// completion but their result is dropped on arrival (spec §4.9:
    /// cancellation on eviction/purge is best-effort, not preemptive).
    pub fn cancel(&self, brick_index: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.queue.retain(|e| e.brick_index != brick_index);
        inner.cancelled.insert(brick_index);
    }

    pub fn cancel_all(&self) {
        let mut inner = self.inner.lock().unwrap();
        for e in inner.queue.drain() {
            inner.cancelled.insert(e.brick_index);
        }
    }

    /// Drain all bricks completed since the last poll (spec: consumed once
    /// per frame by the atlas manager's admission step).
    pub fn poll_completed(&self) -> Vec<LoadedBrick> {
        std::mem::take(&mut self.inner.lock().unwrap().completed)
    }

    pub fn queued_count(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    pub fn inflight_count(&self) -> usize {
        self.inner.lock().unwrap().inflight.len()
    }

    /// Run the drain loop until `self` is dropped. Pops the highest-priority
    /// queued brick, waits for a concurrency permit, and spawns the fetch;
    /// at most one fetch per brick index is ever in flight at a time.
    pub async fn run(self: Arc<Self>) {
        loop {
            let next = {
                let mut inner = self.inner.lock().unwrap();
                loop {
                    match inner.queue.pop() {
                        Some(entry) if inner.inflight.contains(&entry.brick_index) => continue,
                        other => break other,
                    }
                }
            };

            let Some(entry) = next else {
                self.notify.notified().await;
                continue;
            };

            {
                let mut inner = self.inner.lock().unwrap();
                inner.inflight.insert(entry.brick_index);
            }

            let permit = match self.concurrency.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => return,
            };
            let this = self.clone();
            let fetch = self.fetch.clone();
            tokio::spawn(async move {
                let result = fetch(entry.brick_index).await;
                drop(permit);
                let mut inner = this.inner.lock().unwrap();
                inner.inflight.remove(&entry.brick_index);
                let was_cancelled = inner.cancelled.remove(&entry.brick_index);
                if !was_cancelled {
                    if let Ok(payload) = result {
                        inner.completed.push(LoadedBrick {
                            brick_index: entry.brick_index,
                            payload,
                        });
                    }
                }
            });
        }
    }
}
