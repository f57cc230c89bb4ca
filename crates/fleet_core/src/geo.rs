//! Geodesy helpers: great-circle distance and nearest point on a polyline.

use h3o::LatLng;

pub const EARTH_RADIUS_KM: f64 = 6371.0;
const EARTH_RADIUS_M: f64 = EARTH_RADIUS_KM * 1000.0;

/// Haversine distance in kilometres.
pub fn haversine_km(a: LatLng, b: LatLng) -> f64 {
    let (lat1, lon1) = (a.lat().to_radians(), a.lng().to_radians());
    let (lat2, lon2) = (b.lat().to_radians(), b.lng().to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

pub fn haversine_m(a: LatLng, b: LatLng) -> f64 {
    haversine_km(a, b) * 1000.0
}

/// Closest point on a route to an observed position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutePoint {
    pub coordinate: LatLng,
    pub distance_m: f64,
    /// Index of the segment start waypoint the point lies on.
    pub segment_index: usize,
}

/// Find the closest point on the polyline `waypoints` to `observed`.
///
/// Each segment is projected into a local equirectangular plane centred on
/// `observed`, which is accurate for the segment lengths a road route has.
/// The reported distance is the haversine distance to the projected point.
pub fn nearest_point_on_route(waypoints: &[LatLng], observed: LatLng) -> Option<RoutePoint> {
    let first = *waypoints.first()?;
    if waypoints.len() == 1 {
        return Some(RoutePoint {
            coordinate: first,
            distance_m: haversine_m(observed, first),
            segment_index: 0,
        });
    }

    let plane = LocalPlane::centred_on(observed);
    let mut best: Option<RoutePoint> = None;

    for (idx, pair) in waypoints.windows(2).enumerate() {
        let a = plane.project(pair[0]);
        let b = plane.project(pair[1]);
        let (dx, dy) = (b.0 - a.0, b.1 - a.1);
        let len_sq = dx * dx + dy * dy;
        // The observed point is the plane origin.
        let t = if len_sq > 0.0 {
            (-(a.0 * dx + a.1 * dy) / len_sq).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let candidate = match plane.unproject((a.0 + t * dx, a.1 + t * dy)) {
            Some(coordinate) => coordinate,
            None => pair[0],
        };
        let distance_m = haversine_m(observed, candidate);

        if best.map_or(true, |current| distance_m < current.distance_m) {
            best = Some(RoutePoint {
                coordinate: candidate,
                distance_m,
                segment_index: idx,
            });
        }
    }

    best
}

struct LocalPlane {
    origin: LatLng,
    cos_lat: f64,
}

impl LocalPlane {
    fn centred_on(origin: LatLng) -> Self {
        Self {
            origin,
            cos_lat: origin.lat().to_radians().cos().max(1e-12),
        }
    }

    fn project(&self, point: LatLng) -> (f64, f64) {
        let dlng = wrap_degrees(point.lng() - self.origin.lng());
        let dlat = point.lat() - self.origin.lat();
        (
            dlng.to_radians() * self.cos_lat * EARTH_RADIUS_M,
            dlat.to_radians() * EARTH_RADIUS_M,
        )
    }

    fn unproject(&self, (x, y): (f64, f64)) -> Option<LatLng> {
        let lat = self.origin.lat() + (y / EARTH_RADIUS_M).to_degrees();
        let lng = self.origin.lng() + (x / (EARTH_RADIUS_M * self.cos_lat)).to_degrees();
        LatLng::new(lat, wrap_degrees(lng)).ok()
    }
}

/// Normalise a longitude difference into `[-180, 180)`.
fn wrap_degrees(value: f64) -> f64 {
    (value + 180.0).rem_euclid(360.0) - 180.0
}
