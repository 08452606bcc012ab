use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use formats::model::{ModelDecodeError, decode_model};
use foundation::bounds::Aabb3;
use foundation::math::Vec3;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use scene::components::{DisplayFlags, ModelAsset, Rotation, Transform};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::io::{FetchError, Fetcher};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    #[error("fetching model {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("decoding model {url} failed: {source}")]
    Decode {
        url: String,
        #[source]
        source: ModelDecodeError,
    },
}

type PendingModel = Shared<BoxFuture<'static, Result<Arc<ModelAsset>, ModelError>>>;

/// Deduplicating model loader.
///
/// Each URL has at most one fetch in flight. Concurrent requesters share the
/// pending resolution and receive the same canonical `Arc`. Failures are not
/// cached: once a failed load resolves, its entry is dropped so a later call
/// retries.
pub struct ModelCache<F: Fetcher> {
    fetcher: Arc<F>,
    entries: Mutex<HashMap<String, PendingModel>>,
    fetches: Arc<AtomicUsize>,
}

impl<F: Fetcher> ModelCache<F> {
    pub fn new(fetcher: Arc<F>) -> Self {
        Self {
            fetcher,
            entries: Mutex::new(HashMap::new()),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn get_or_load(&self, url: &str) -> Result<Arc<ModelAsset>, ModelError> {
        let pending = {
            let mut entries = self.entries.lock();
            match entries.get(url) {
                Some(pending) => {
                    debug!(url, "model cache hit");
                    pending.clone()
                }
                None => {
                    let pending = self.load(url).boxed().shared();
                    entries.insert(url.to_string(), pending.clone());
                    pending
                }
            }
        };

        let result = pending.clone().await;
        if let Err(err) = &result {
            let mut entries = self.entries.lock();
            if entries.get(url).is_some_and(|p| p.ptr_eq(&pending)) {
                entries.remove(url);
                warn!(url, error = %err, "model load failed; entry evicted");
            }
        }
        result
    }

    fn load(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Arc<ModelAsset>, ModelError>> + Send + 'static {
        let fetcher = Arc::clone(&self.fetcher);
        let fetches = Arc::clone(&self.fetches);
        let url = url.to_string();
        async move {
            fetches.fetch_add(1, Ordering::Relaxed);
            let bytes = fetcher
                .fetch(&url)
                .await
                .map_err(|source| ModelError::Fetch {
                    url: url.clone(),
                    source,
                })?;
            let model = decode_model(&url, &bytes).map_err(|source| ModelError::Decode {
                url: url.clone(),
                source,
            })?;
            info!(
                url = %url,
                bytes = bytes.len(),
                triangles = model.triangle_count(),
                "model loaded"
            );
            Ok(Arc::new(model))
        }
    }

    /// Underlying fetches started so far, across all URLs.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Entries currently cached or in flight.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.lock().contains_key(url)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// One placement of a canonical model.
///
/// The geometry is shared; transform and display flags are owned, so editing
/// one instance never shows up on another or in the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInstance {
    pub model: Arc<ModelAsset>,
    pub transform: Transform,
    pub display: DisplayFlags,
}

impl ModelInstance {
    pub fn set_wireframe(&mut self, on: bool) {
        self.display.wireframe = on;
    }

    pub fn set_highlighted(&mut self, on: bool) {
        self.display.highlighted = on;
    }

    /// Axis-aligned bounds of the transformed model-space box.
    pub fn world_bounds(&self) -> Option<Aabb3> {
        let b = self.model.bounds?;
        let corners = (0..8).map(|i| {
            let pick = |axis: usize| if i >> axis & 1 == 0 { b.min[axis] } else { b.max[axis] };
            self.transform
                .transform_point(Vec3::new(pick(0), pick(1), pick(2)))
        });
        Aabb3::from_points(corners)
    }
}

pub fn instantiate(
    canonical: &Arc<ModelAsset>,
    position: Vec3,
    scale: f64,
    rotation: Rotation,
) -> ModelInstance {
    ModelInstance {
        model: Arc::clone(canonical),
        transform: Transform::translate(position)
            .with_rotation(rotation)
            .with_uniform_scale(scale),
        display: DisplayFlags::default(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{ModelCache, ModelError, instantiate};
    use crate::io::{FetchError, MemoryFetcher};
    use foundation::math::Vec3;
    use scene::components::Rotation;

    const MODEL: &str = r#"{"meshes":[{"positions":[[0,0,0],[1,0,0],[0,1,0]]}]}"#;

    fn cache() -> (Arc<MemoryFetcher>, ModelCache<MemoryFetcher>) {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.insert("models/pump.json", MODEL.as_bytes().to_vec());
        (Arc::clone(&fetcher), ModelCache::new(fetcher))
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_fetch() {
        let (fetcher, cache) = cache();
        let (a, b) = tokio::join!(
            cache.get_or_load("models/pump.json"),
            cache.get_or_load("models/pump.json")
        );
        let (a, b) = (a.expect("a"), b.expect("b"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(fetcher.requests("models/pump.json"), 1);
        assert_eq!(cache.fetch_count(), 1);

        let again = cache.get_or_load("models/pump.json").await.expect("cached");
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(fetcher.requests("models/pump.json"), 1);
    }

    #[tokio::test]
    async fn instances_are_independent() {
        let (_fetcher, cache) = cache();
        let canonical = cache.get_or_load("models/pump.json").await.expect("load");

        let mut first = instantiate(&canonical, Vec3::new(1.0, 0.0, 0.0), 1.0, Rotation::default());
        let second = instantiate(&canonical, Vec3::new(5.0, 0.0, 0.0), 2.0, Rotation::default());
        first.transform.position = Vec3::new(-3.0, 0.0, 0.0);
        first.set_wireframe(true);

        assert_eq!(second.transform.position, Vec3::new(5.0, 0.0, 0.0));
        assert!(!second.display.wireframe);
        assert!(Arc::ptr_eq(&first.model, &second.model));
        assert_eq!(*canonical, *first.model);

        let bounds = second.world_bounds().expect("bounds");
        assert_eq!(bounds.min, [5.0, 0.0, 0.0]);
        assert_eq!(bounds.max, [7.0, 2.0, 0.0]);
    }

    #[tokio::test]
    async fn failures_are_evicted_and_retried() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.fail("broken.json", FetchError::Network("reset".to_string()));
        let cache = ModelCache::new(Arc::clone(&fetcher));

        let (a, b) = tokio::join!(cache.get_or_load("broken.json"), cache.get_or_load("broken.json"));
        assert!(matches!(a, Err(ModelError::Fetch { .. })));
        assert_eq!(a, b);
        assert_eq!(fetcher.requests("broken.json"), 1);
        assert!(!cache.contains("broken.json"));

        fetcher.insert("broken.json", MODEL.as_bytes().to_vec());
        cache.get_or_load("broken.json").await.expect("retry succeeds");
        assert_eq!(fetcher.requests("broken.json"), 2);
    }

    #[tokio::test]
    async fn undecodable_models_report_decode_errors() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.insert("bad.json", &b"{\"meshes\": []}"[..]);
        let cache = ModelCache::new(fetcher);
        assert!(matches!(
            cache.get_or_load("bad.json").await,
            Err(ModelError::Decode { .. })
        ));
    }
}
