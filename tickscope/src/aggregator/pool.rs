//! Sharded merge pool
//!
//! Each worker thread exclusively owns the roots whose group key hashes to its
//! shard, so merging needs no locks at all:
//!
//! ```text
//!  submit(batch) ──► split by hash(key) % shards
//!                       │            │            │
//!                   ┌───▼───┐    ┌───▼───┐    ┌───▼───┐
//!                   │shard 0│    │shard 1│    │shard 2│   unbounded FIFO queues
//!                   │ roots │    │ roots │    │ roots │   (owned HashMap each)
//!                   └───────┘    └───────┘    └───────┘
//! ```
//!
//! A key always lands on the same shard, so merges for one key apply in
//! submission order while different shards run in parallel. Reading is a
//! `Collect` job queued behind everything submitted before it, which makes
//! "flush pending merges, then read" a single round trip per shard.

use crossbeam_channel::{unbounded, Sender};
use log::{debug, warn};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::thread::{self, JoinHandle};

use tickscope_common::ThreadSnapshot;

use crate::domain::SamplerError;
use crate::tree::ThreadNode;

/// A sample already resolved to its group key
pub(crate) type KeyedSnapshot = (String, ThreadSnapshot);

enum Job {
    Merge(Vec<KeyedSnapshot>),
    Collect(Sender<Vec<(String, ThreadNode)>>),
}

pub(crate) struct MergePool {
    shards: Vec<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
}

impl MergePool {
    /// Spawn `workers` shard threads, each attributing `weight` per sample
    pub(crate) fn new(workers: usize, weight: f64) -> Result<Self, SamplerError> {
        let mut shards = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for index in 0..workers {
            let (tx, rx) = unbounded::<Job>();
            let name = format!("tickscope-merge-{index}");
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || {
                    let mut roots: HashMap<String, ThreadNode> = HashMap::new();
                    // ends once every sender is dropped
                    for job in rx {
                        match job {
                            Job::Merge(batch) => {
                                for (key, snapshot) in batch {
                                    roots
                                        .entry(key)
                                        .or_insert_with_key(|key| ThreadNode::new(key.as_str()))
                                        .log(&snapshot.frames, weight);
                                }
                            }
                            Job::Collect(reply) => {
                                let copy = roots
                                    .iter()
                                    .map(|(k, v)| (k.clone(), v.clone()))
                                    .collect();
                                // reader may have given up; nothing to do then
                                let _ = reply.send(copy);
                            }
                        }
                    }
                })
                .map_err(|error| SamplerError::SpawnFailed { name, error })?;
            shards.push(tx);
            handles.push(handle);
        }

        debug!("Merge pool started with {workers} shards");
        Ok(Self { shards, handles })
    }

    fn shard_for(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        #[allow(clippy::cast_possible_truncation)]
        let shard = (hasher.finish() % self.shards.len() as u64) as usize;
        shard
    }

    /// Queue a batch of keyed samples; never blocks on merge work
    pub(crate) fn submit(&self, batch: Vec<KeyedSnapshot>) {
        if batch.is_empty() {
            return;
        }

        let mut per_shard: Vec<Vec<KeyedSnapshot>> =
            (0..self.shards.len()).map(|_| Vec::new()).collect();
        for entry in batch {
            let shard = self.shard_for(&entry.0);
            per_shard[shard].push(entry);
        }

        for (shard, batch) in per_shard.into_iter().enumerate() {
            if batch.is_empty() {
                continue;
            }
            if self.shards[shard].send(Job::Merge(batch)).is_err() {
                warn!("Merge shard {shard} has exited; dropping its batch");
            }
        }
    }

    /// Wait for every merge submitted so far, then copy out all roots
    pub(crate) fn collect(&self) -> HashMap<String, ThreadNode> {
        let (reply_tx, reply_rx) = unbounded();
        for (shard, tx) in self.shards.iter().enumerate() {
            if tx.send(Job::Collect(reply_tx.clone())).is_err() {
                warn!("Merge shard {shard} has exited; its roots are unavailable");
            }
        }
        drop(reply_tx);

        reply_rx.iter().flatten().collect()
    }
}

impl Drop for MergePool {
    fn drop(&mut self) {
        self.shards.clear();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("Merge shard panicked during shutdown");
            }
        }
    }
}
