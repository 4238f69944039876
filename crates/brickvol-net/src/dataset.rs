//! The dataset seam (spec §4.7, §9): after a successful `OPEN`, a remote
//! client exposes the same interface a local C4 `Reader` does, so the atlas
//! manager (C8) can be built once against a trait and fed either source.

use std::time::Duration;

use brickvol_core::error::{Error, Result};
use brickvol_core::format::Reader;
use brickvol_core::meta::DatasetMetadata;

use crate::cache::LocalCache;

/// Deadline used when [`Dataset::brick`] bridges onto [`RemoteDataset::fetch_bricks`];
/// callers who need a different deadline should call `fetch_bricks` directly.
const TRAIT_BRIDGE_DEADLINE: Duration = Duration::from_secs(10);

/// Anything that can serve brick payloads by global index, local file or
/// remote connection alike.
pub trait Dataset: Send + Sync {
    fn metadata(&self) -> &DatasetMetadata;
    fn brick(&self, i: u64, buf: &mut Vec<u8>) -> Result<()>;
}

impl Dataset for Reader {
    fn metadata(&self) -> &DatasetMetadata {
        Reader::metadata(self)
    }

    fn brick(&self, i: u64, buf: &mut Vec<u8>) -> Result<()> {
        Reader::brick(self, i, buf)
    }
}

/// An opened remote dataset: holds the connection that performed `OPEN`
/// and the metadata it returned. Implements [`Dataset`] so it can stand in
/// for a local [`Reader`] anywhere one is expected (the atlas manager, C8),
/// though the background loader (C9) should prefer calling
/// [`RemoteDataset::fetch_bricks`] directly -- it batches requests and
/// avoids the runtime-bridging cost `Dataset::brick` pays per call.
pub struct RemoteDataset {
    client: tokio::sync::Mutex<crate::client::Client>,
    metadata: DatasetMetadata,
    local_cache: Option<tokio::sync::Mutex<LocalCache>>,
}

impl RemoteDataset {
    pub fn new(client: crate::client::Client, metadata: DatasetMetadata) -> Self {
        RemoteDataset {
            client: tokio::sync::Mutex::new(client),
            metadata,
            local_cache: None,
        }
    }

    /// Attach a write-through local cache (spec §4.7, scenario 6): every
    /// brick this dataset fetches is also recorded in `cache`, so progress
    /// can be queried via [`LocalCache::local_ratio`] and persisted with
    /// [`LocalCache::finalize`].
    pub fn with_local_cache(mut self, cache: LocalCache) -> Self {
        self.local_cache = Some(tokio::sync::Mutex::new(cache));
        self
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    pub fn local_ratio(&self) -> Option<f64> {
        self.local_cache.as_ref().map(|c| c.try_lock().map(|c| c.local_ratio()).unwrap_or(0.0))
    }

    /// Fetch raw (on-disk) payloads for a batch of brick indices, in
    /// request order, within `deadline`. Mirrors [`crate::client::Client::get_bricks`];
    /// callers split the concatenated result using `brickTable[i].size`. If a
    /// local cache is attached, already-present bricks are skipped on the
    /// wire and every freshly fetched one is recorded before returning.
    pub async fn fetch_bricks(&self, indices: &[u64], deadline: std::time::Duration) -> Result<Vec<u8>> {
        let to_fetch: Vec<u64> = if let Some(cache) = &self.local_cache {
            let cache = cache.lock().await;
            indices.iter().copied().filter(|&i| !cache.is_present(i)).collect()
        } else {
            indices.to_vec()
        };

        if to_fetch.is_empty() {
            return self.read_from_cache(indices).await;
        }

        let mut client = self.client.lock().await;
        let payload = client.get_bricks(&to_fetch, deadline).await?;
        drop(client);

        if let Some(cache) = &self.local_cache {
            let mut cache = cache.lock().await;
            let mut offset = 0usize;
            for &i in &to_fetch {
                let size = self.metadata.bricks[i as usize].size as usize;
                cache.mark_present(i, payload[offset..offset + size].to_vec());
                offset += size;
            }
        }

        if to_fetch.as_slice() == indices {
            Ok(payload)
        } else {
            self.read_from_cache(indices).await
        }
    }

    async fn read_from_cache(&self, indices: &[u64]) -> Result<Vec<u8>> {
        let cache = self
            .local_cache
            .as_ref()
            .expect("read_from_cache only called when a local cache is attached");
        let cache = cache.lock().await;
        let mut out = Vec::new();
        for &i in indices {
            out.extend_from_slice(cache.payload(i).unwrap_or(&[]));
        }
        Ok(out)
    }
}

impl Dataset for RemoteDataset {
    fn metadata(&self) -> &DatasetMetadata {
        RemoteDataset::metadata(self)
    }

    /// Bridges onto [`RemoteDataset::fetch_bricks`] so the atlas manager (C8)
    /// can be built once over `Arc<dyn Dataset>` and handed either a local
    /// `Reader` or a remote connection. `block_in_place` needs a
    /// multi-threaded runtime under it; a current-thread runtime can't park
    /// the calling task without stalling everything else on it, so this
    /// returns an error there instead of deadlocking. Callers already async
    /// (the background loader, C9) should call `fetch_bricks` directly and
    /// skip the bridge.
    fn brick(&self, i: u64, buf: &mut Vec<u8>) -> Result<()> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| Error::Transport("RemoteDataset::brick called outside a Tokio runtime".into()))?;
        if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::CurrentThread {
            return Err(Error::Transport(
                "RemoteDataset::brick needs a multi-threaded Tokio runtime to block in place; \
                 call fetch_bricks directly from async code running on a current-thread runtime"
                    .into(),
            ));
        }
        let payload = tokio::task::block_in_place(|| handle.block_on(self.fetch_bricks(&[i], TRAIT_BRIDGE_DEADLINE)))?;
        buf.clear();
        buf.extend_from_slice(&payload);
        Ok(())
    }
}
