//! Address resolution with caching and request coalescing.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use hashbrown::HashMap;
use tokio::sync::{Mutex, OnceCell};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{CoordKey, GeocodeCache, GeocodingProvider};
use crate::config::GeocodeConfig;
use crate::error::{SpotError, SpotResult};

type Lookup = Shared<BoxFuture<'static, SpotResult<String>>>;

/// A provider call that other callers may join
struct InFlight {
    id: u64,
    lookup: Lookup,
}

struct ResolverState {
    cache: GeocodeCache,
    in_flight: HashMap<CoordKey, InFlight>,
    next_id: u64,
}

/// Turns coordinates into addresses on top of a [`GeocodingProvider`].
///
/// Resolution fails fast with `NotReady` until [`initialize`] has succeeded.
/// Successful lookups are cached under rounded coordinates; concurrent
/// lookups for the same key share a single provider call.
///
/// [`initialize`]: GeoAddressResolver::initialize
pub struct GeoAddressResolver {
    source: Arc<dyn GeocodingProvider>,
    handle: OnceCell<Arc<dyn GeocodingProvider>>,
    state: Mutex<ResolverState>,
    precision: u32,
    lookup_timeout: Duration,
    shutdown: CancellationToken,
}

impl GeoAddressResolver {
    pub fn new(provider: Arc<dyn GeocodingProvider>, config: &GeocodeConfig) -> Self {
        Self {
            source: provider,
            handle: OnceCell::new(),
            state: Mutex::new(ResolverState {
                cache: GeocodeCache::new(config.cache_capacity),
                in_flight: HashMap::new(),
                next_id: 0,
            }),
            precision: config.key_precision(),
            lookup_timeout: config.lookup_timeout(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Acquire the provider handle. Safe to call again after a failure.
    pub async fn initialize(&self) -> SpotResult<()> {
        if self.shutdown.is_cancelled() {
            return Err(SpotError::Cancelled);
        }

        self.handle
            .get_or_try_init(|| async {
                self.source.ready().await?;
                info!("Geocoding provider ready");
                Ok::<_, SpotError>(Arc::clone(&self.source))
            })
            .await?;

        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.handle.initialized() && !self.shutdown.is_cancelled()
    }

    /// Resolve a position to an address.
    pub async fn resolve(&self, lat: f64, long: f64) -> SpotResult<String> {
        let provider = match self.handle.get() {
            Some(p) if !self.shutdown.is_cancelled() => Arc::clone(p),
            _ => {
                return Err(SpotError::NotReady {
                    provider: "geocoding",
                })
            }
        };

        let key = CoordKey::new(lat, long, self.precision);

        let (id, lookup) = {
            let mut state = self.state.lock().await;

            if let Some(address) = state.cache.get(&key) {
                debug!("Geocode cache hit for ({}, {})", lat, long);
                return Ok(address);
            }

            match state.in_flight.get(&key) {
                Some(pending) => {
                    debug!("Joining in-flight geocode for ({}, {})", lat, long);
                    (pending.id, pending.lookup.clone())
                }
                None => {
                    state.next_id += 1;
                    let id = state.next_id;
                    let lookup = self.lookup(provider, lat, long);
                    state.in_flight.insert(
                        key,
                        InFlight {
                            id,
                            lookup: lookup.clone(),
                        },
                    );
                    (id, lookup)
                }
            }
        };

        let result = lookup.await;

        let mut state = self.state.lock().await;
        if let Ok(address) = &result {
            if !self.shutdown.is_cancelled() {
                state.cache.insert(key, address.clone());
            }
        }
        // A later lookup may already own the slot; leave it alone
        if state.in_flight.get(&key).is_some_and(|f| f.id == id) {
            state.in_flight.remove(&key);
        }

        result
    }

    fn lookup(&self, provider: Arc<dyn GeocodingProvider>, lat: f64, long: f64) -> Lookup {
        let shutdown = self.shutdown.clone();
        let limit = self.lookup_timeout;

        async move {
            tokio::select! {
                _ = shutdown.cancelled() => Err(SpotError::Cancelled),
                result = tokio::time::timeout(limit, provider.reverse_geocode(lat, long)) => {
                    result.unwrap_or(Err(SpotError::Timeout(limit)))
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Stop serving lookups. Pending lookups finish with `Cancelled`.
    pub fn shutdown(&self) {
        info!("Shutting down address resolver");
        self.shutdown.cancel();
    }

    pub async fn cache_len(&self) -> usize {
        self.state.lock().await.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Counts calls; optionally waits on a gate before answering
    struct FakeGeocoder {
        calls: AtomicUsize,
        ready: bool,
        fail_with: Option<String>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeGeocoder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                ready: true,
                fail_with: None,
                gate: None,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GeocodingProvider for FakeGeocoder {
        async fn ready(&self) -> SpotResult<()> {
            if self.ready {
                Ok(())
            } else {
                Err(SpotError::NotReady {
                    provider: "geocoding",
                })
            }
        }

        async fn reverse_geocode(&self, lat: f64, long: f64) -> SpotResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match &self.fail_with {
                Some(status) => Err(SpotError::GeocodeFailed {
                    status: status.clone(),
                }),
                None => Ok(format!("{:.4}, {:.4}", lat, long)),
            }
        }
    }

    async fn ready_resolver(provider: Arc<FakeGeocoder>) -> GeoAddressResolver {
        let resolver = GeoAddressResolver::new(provider, &GeocodeConfig::default());
        resolver.initialize().await.unwrap();
        resolver
    }

    #[tokio::test]
    async fn test_not_ready_before_initialize() {
        let provider = Arc::new(FakeGeocoder::new());
        let resolver = GeoAddressResolver::new(provider.clone(), &GeocodeConfig::default());

        assert!(matches!(
            resolver.resolve(49.1, -122.8).await,
            Err(SpotError::NotReady { .. })
        ));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_initialize_can_be_retried() {
        let provider = Arc::new(FakeGeocoder {
            ready: false,
            ..FakeGeocoder::new()
        });
        let resolver = GeoAddressResolver::new(provider, &GeocodeConfig::default());

        assert!(resolver.initialize().await.is_err());
        assert!(!resolver.is_ready());
        assert!(matches!(
            resolver.resolve(1.0, 1.0).await,
            Err(SpotError::NotReady { .. })
        ));
    }

    #[tokio::test]
    async fn test_repeated_lookup_hits_cache() {
        let provider = Arc::new(FakeGeocoder::new());
        let resolver = ready_resolver(provider.clone()).await;

        let first = resolver.resolve(49.1, -122.8).await.unwrap();
        let second = resolver.resolve(49.1, -122.8).await.unwrap();
        // Rounds to the same key at 6 decimal places
        let third = resolver.resolve(49.1000000004, -122.8).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first, third);
        assert_eq!(provider.calls(), 1);
        assert_eq!(resolver.cache_len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_lookups_are_coalesced() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(FakeGeocoder {
            gate: Some(gate.clone()),
            ..FakeGeocoder::new()
        });
        let resolver = Arc::new(ready_resolver(provider.clone()).await);

        let a = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.resolve(49.1, -122.8).await }
        });
        let b = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.resolve(49.1, -122.8).await }
        });

        // Let both callers reach the shared lookup before releasing it
        while provider.calls() == 0 {
            tokio::task::yield_now().await;
        }
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        gate.notify_one();

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();
        assert_eq!(a, b);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let provider = Arc::new(FakeGeocoder {
            fail_with: Some("OVER_QUERY_LIMIT".to_string()),
            ..FakeGeocoder::new()
        });
        let resolver = ready_resolver(provider.clone()).await;

        for _ in 0..2 {
            assert_eq!(
                resolver.resolve(49.1, -122.8).await,
                Err(SpotError::GeocodeFailed {
                    status: "OVER_QUERY_LIMIT".to_string()
                })
            );
        }
        assert_eq!(provider.calls(), 2);
        assert_eq!(resolver.cache_len().await, 0);
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let provider = Arc::new(FakeGeocoder {
            gate: Some(Arc::new(Notify::new())),
            ..FakeGeocoder::new()
        });
        let config = GeocodeConfig {
            lookup_timeout_ms: 20,
            ..GeocodeConfig::default()
        };
        let resolver = GeoAddressResolver::new(provider, &config);
        resolver.initialize().await.unwrap();

        assert_eq!(
            resolver.resolve(49.1, -122.8).await,
            Err(SpotError::Timeout(Duration::from_millis(20)))
        );
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_lookup() {
        let provider = Arc::new(FakeGeocoder {
            gate: Some(Arc::new(Notify::new())),
            ..FakeGeocoder::new()
        });
        let resolver = Arc::new(ready_resolver(provider.clone()).await);

        let pending = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.resolve(49.1, -122.8).await }
        });
        while provider.calls() == 0 {
            tokio::task::yield_now().await;
        }
        resolver.shutdown();

        assert_eq!(pending.await.unwrap(), Err(SpotError::Cancelled));
        assert!(matches!(
            resolver.resolve(49.1, -122.8).await,
            Err(SpotError::NotReady { .. })
        ));
        assert!(!resolver.is_ready());
    }
}
