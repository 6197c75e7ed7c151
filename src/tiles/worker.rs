//! Shared background pool for tile jobs.
//!
//! One pool serves every layer of a map. Jobs are keyed by `(layer instance,
//! tile)`; the same key is never in flight twice. Concurrency is bounded by a
//! semaphore, decoding runs on the blocking pool, and results come back over
//! a channel that the map drains once per frame.

use crate::{
    layers::{image::decode_image_tile, vector::decode_vector_tile, SubLayerStyle, TilePayload},
    prelude::{Arc, HashMap},
    runtime::{spawn, AsyncHandle},
    tiles::{fetch::TileFetcher, id::TileId},
    Result,
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use tokio::sync::Semaphore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Maximum concurrent fetch-and-decode jobs.
    pub max_concurrent: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self { max_concurrent: 16 }
    }
}

impl WorkerPoolConfig {
    pub fn low_resource() -> Self {
        Self { max_concurrent: 4 }
    }

    pub fn for_testing() -> Self {
        Self { max_concurrent: 2 }
    }
}

/// What to do with the fetched bytes.
#[derive(Debug, Clone)]
pub enum JobKind {
    Vector { sub_layers: Arc<Vec<SubLayerStyle>> },
    Image,
}

/// One tile request: the tile, where to get it, and the slice of the layer
/// description needed to decode it.
#[derive(Debug, Clone)]
pub struct TileJob {
    pub layer: u64,
    pub tile: TileId,
    pub url: String,
    pub kind: JobKind,
}

impl TileJob {
    pub fn key(&self) -> (u64, TileId) {
        (self.layer, self.tile)
    }

    pub async fn fetch(&self, fetcher: &dyn TileFetcher) -> Result<Vec<u8>> {
        log::trace!("fetching tile {} from {}", self.tile, self.url);
        fetcher.fetch(&self.url).await
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<TilePayload> {
        match &self.kind {
            JobKind::Vector { sub_layers } => {
                decode_vector_tile(bytes, &self.tile, sub_layers).map(TilePayload::Vector)
            }
            JobKind::Image => decode_image_tile(bytes, &self.tile).map(TilePayload::Image),
        }
    }

    /// Fetch and decode on the current task.
    pub async fn run(&self, fetcher: &dyn TileFetcher) -> Result<TilePayload> {
        let bytes = self.fetch(fetcher).await?;
        self.decode(&bytes)
    }
}

/// Outcome of a background job. `payload` is `None` when the job failed.
#[derive(Debug)]
pub struct TileJobResult {
    pub layer: u64,
    pub tile: TileId,
    pub payload: Option<TilePayload>,
}

pub struct TileWorkerPool {
    fetcher: Arc<dyn TileFetcher>,
    permits: Arc<Semaphore>,
    result_tx: Sender<TileJobResult>,
    result_rx: Receiver<TileJobResult>,
    jobs: HashMap<(u64, TileId), Box<dyn AsyncHandle>>,
    config: WorkerPoolConfig,
}

impl TileWorkerPool {
    pub fn new(fetcher: Arc<dyn TileFetcher>, config: WorkerPoolConfig) -> Self {
        let (result_tx, result_rx) = unbounded();
        log::debug!(
            "TileWorkerPool starting with max_concurrent: {}",
            config.max_concurrent
        );
        Self {
            fetcher,
            permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            result_tx,
            result_rx,
            jobs: HashMap::default(),
            config,
        }
    }

    pub fn fetcher(&self) -> Arc<dyn TileFetcher> {
        self.fetcher.clone()
    }

    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    /// Jobs submitted and not yet collected.
    pub fn pending_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_pending(&self, layer: u64, tile: &TileId) -> bool {
        self.jobs.contains_key(&(layer, *tile))
    }

    /// Queues a job. Returns `Ok(false)` if the same key is already in flight.
    pub fn submit(&mut self, job: TileJob) -> Result<bool> {
        let key = job.key();
        if self.jobs.contains_key(&key) {
            log::debug!("Skipping duplicate tile job: {}", job.tile);
            return Ok(false);
        }

        let fetcher = self.fetcher.clone();
        let permits = self.permits.clone();
        let result_tx = self.result_tx.clone();

        let handle = spawn(async move {
            let payload = match permits.acquire_owned().await {
                Ok(_permit) => {
                    match AssertUnwindSafe(Self::execute(job.clone(), fetcher.as_ref()))
                        .catch_unwind()
                        .await
                    {
                        Ok(payload) => payload,
                        Err(_) => {
                            log::warn!("tile job {} panicked", job.tile);
                            None
                        }
                    }
                }
                Err(e) => {
                    log::warn!("worker pool closed before tile {} ran: {e}", job.tile);
                    None
                }
            };
            let _ = result_tx.send(TileJobResult {
                layer: job.layer,
                tile: job.tile,
                payload,
            });
        })?;

        self.jobs.insert(key, handle);
        Ok(true)
    }

    async fn execute(job: TileJob, fetcher: &dyn TileFetcher) -> Option<TilePayload> {
        let bytes = match job.fetch(fetcher).await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Failed to fetch tile {}: {e}", job.tile);
                return None;
            }
        };
        let tile = job.tile;
        match tokio::task::spawn_blocking(move || job.decode(&bytes)).await {
            Ok(Ok(payload)) => Some(payload),
            Ok(Err(e)) => {
                log::warn!("Failed to decode tile {tile}: {e}");
                None
            }
            Err(e) => {
                log::warn!("Decode task for tile {tile} did not complete: {e}");
                None
            }
        }
    }

    /// Drains finished jobs without blocking.
    pub fn try_recv_results(&mut self) -> Vec<TileJobResult> {
        let results: Vec<TileJobResult> = self.result_rx.try_iter().collect();
        for result in &results {
            self.jobs.remove(&(result.layer, result.tile));
        }
        results
    }

    /// Aborts every outstanding job of a layer and drops its queued results.
    pub fn cancel_layer(&mut self, layer: u64) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|(owner, _), handle| {
            if *owner == layer {
                handle.cancel();
                false
            } else {
                true
            }
        });
        let cancelled = before - self.jobs.len();

        let kept: Vec<TileJobResult> = self
            .result_rx
            .try_iter()
            .filter(|r| r.layer != layer)
            .collect();
        for result in kept {
            let _ = self.result_tx.send(result);
        }
        cancelled
    }
}

impl Drop for TileWorkerPool {
    fn drop(&mut self) {
        for handle in self.jobs.values() {
            handle.cancel();
        }
    }
}
