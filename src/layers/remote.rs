use crate::{
    layers::{LayerProperties, TilePayload},
    tiles::{
        cache::{TileCache, TileState},
        id::TileId,
        visibility::VisibleTiles,
        worker::{JobKind, TileJob, TileJobResult, TileWorkerPool},
    },
};
use futures::future::join_all;

/// URL template plus the tile cache behind a remote layer.
#[derive(Debug)]
pub(crate) struct RemoteTiles {
    url: String,
    cache: TileCache<TilePayload>,
}

impl RemoteTiles {
    pub fn new(url: String) -> Self {
        Self {
            url,
            cache: TileCache::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self, tile: &TileId) -> TileState {
        self.cache.state(tile)
    }

    pub fn get(&self, tile: &TileId) -> Option<&TilePayload> {
        self.cache.get(tile)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Reserves every absent tile, awaits the in-view ones and hands the rest
    /// to the pool. Returns the tiles that failed on this call.
    pub async fn ensure(
        &mut self,
        props: &LayerProperties,
        kind: JobKind,
        visible: &VisibleTiles,
        pool: &mut TileWorkerPool,
    ) -> Vec<TileId> {
        let mut failed = Vec::new();
        let mut in_view = Vec::new();

        for tile in &visible.to_load {
            if !self.cache.reserve(*tile) {
                continue;
            }
            let job = TileJob {
                layer: props.instance,
                tile: *tile,
                url: tile.url(&self.url),
                kind: kind.clone(),
            };
            if visible.is_in_view(tile) {
                in_view.push(job);
            } else if let Err(e) = pool.submit(job) {
                log::warn!("Failed to queue tile {tile} for layer '{}': {e}", props.id);
                self.cache.resolve(*tile, None);
                failed.push(*tile);
            }
        }

        if in_view.is_empty() {
            return failed;
        }

        log::trace!("layer '{}': awaiting {} in-view tiles", props.id, in_view.len());
        let mut reservation = Reservation {
            cache: &mut self.cache,
            tiles: in_view.iter().map(|job| job.tile).collect(),
        };
        let fetcher = pool.fetcher();
        let results = join_all(in_view.iter().map(|job| job.run(fetcher.as_ref()))).await;
        for (job, result) in in_view.iter().zip(results) {
            match result {
                Ok(payload) => {
                    reservation.cache.resolve(job.tile, Some(payload));
                }
                Err(e) => {
                    log::warn!("Failed to load tile {} for layer '{}': {e}", job.tile, props.id);
                    reservation.cache.resolve(job.tile, None);
                    failed.push(job.tile);
                }
            }
        }
        reservation.tiles.clear();
        failed
    }

    /// Stores a background result if its payload has the expected shape.
    /// Returns the settled state, or `None` if the tile was not pending.
    pub fn accept(&mut self, result: TileJobResult, expected: fn(&TilePayload) -> bool) -> Option<TileState> {
        let payload = result.payload.filter(|p| expected(p));
        if !self.cache.resolve(result.tile, payload) {
            log::debug!("dropping result for tile {} that is not pending", result.tile);
            return None;
        }
        Some(self.cache.state(&result.tile))
    }
}

/// In-view tiles reserved by an `ensure` call. Whatever is still pending when
/// this drops (the call was cancelled mid-await) settles as failed.
struct Reservation<'a> {
    cache: &'a mut TileCache<TilePayload>,
    tiles: Vec<TileId>,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        for tile in self.tiles.drain(..) {
            if self.cache.resolve(tile, None) {
                log::debug!("tile {tile} abandoned while loading");
            }
        }
    }
}
