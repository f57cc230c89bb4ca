//! Pluggable route providers used by deviation checks.
//!
//! - **`StraightLineRouteProvider`**: pickup→drop as a single segment. Always available.
//! - Network-backed providers (OSRM) live in the backend crate and are usually
//!   wrapped in [`CachedRouteProvider`] with straight-line fallback.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use h3o::LatLng;
use lru::LruCache;

use crate::geo::haversine_km;

/// Average speed assumed when a provider has no travel-time data.
const FALLBACK_SPEED_KMH: f64 = 40.0;

/// Planned route between two coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    /// Ordered waypoints from origin to destination.
    pub waypoints: Vec<LatLng>,
    /// Road-network distance in kilometres.
    pub distance_km: f64,
    /// Free-flow travel time in seconds.
    pub duration_secs: f64,
}

/// Trait for routing backends. Returns `None` if no route exists.
pub trait RouteProvider: Send + Sync {
    fn route(&self, from: LatLng, to: LatLng) -> Option<Route>;
}

pub struct StraightLineRouteProvider;

impl RouteProvider for StraightLineRouteProvider {
    fn route(&self, from: LatLng, to: LatLng) -> Option<Route> {
        let distance_km = haversine_km(from, to);
        let duration_secs = if distance_km > 0.0 {
            (distance_km / FALLBACK_SPEED_KMH) * 3600.0
        } else {
            0.0
        };
        Some(Route {
            waypoints: vec![from, to],
            distance_km,
            duration_secs,
        })
    }
}

type RouteKey = (u64, u64, u64, u64);

fn route_key(from: LatLng, to: LatLng) -> RouteKey {
    (
        from.lat().to_bits(),
        from.lng().to_bits(),
        to.lat().to_bits(),
        to.lng().to_bits(),
    )
}

/// LRU-cached wrapper around any [`RouteProvider`].
///
/// Cache key is the exact coordinate pair (directional). On inner failure the
/// optional straight-line fallback is tried before returning `None`.
pub struct CachedRouteProvider {
    inner: Box<dyn RouteProvider>,
    cache: Mutex<LruCache<RouteKey, Route>>,
    fallback_to_straight_line: bool,
}

impl CachedRouteProvider {
    pub fn new(
        inner: Box<dyn RouteProvider>,
        capacity: usize,
        fallback_to_straight_line: bool,
    ) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            fallback_to_straight_line,
        }
    }
}

impl RouteProvider for CachedRouteProvider {
    fn route(&self, from: LatLng, to: LatLng) -> Option<Route> {
        let key = route_key(from, to);

        if let Ok(mut cache) = self.cache.lock() {
            if let Some(cached) = cache.get(&key) {
                return Some(cached.clone());
            }
        }

        let result = self.inner.route(from, to).or_else(|| {
            if self.fallback_to_straight_line {
                tracing::debug!("route provider returned nothing; using straight line");
                StraightLineRouteProvider.route(from, to)
            } else {
                None
            }
        });

        if let Some(ref route) = result {
            if let Ok(mut cache) = self.cache.lock() {
                cache.put(key, route.clone());
            }
        }

        result
    }
}
