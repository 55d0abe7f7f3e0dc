use crate::models::GeoPoint;
use geo::HaversineDistance;

/// Earth's mean radius in kilometers, as used by `geo`'s haversine
pub const EARTH_MEAN_RADIUS_KM: f64 = 6371.0088;

/// Tolerance applied to the inclusive radius boundary
pub const DISTANCE_EPSILON_KM: f64 = 1e-9;

/// Great-circle distance between two points in kilometers
///
/// Uses the spherical model: cheap and accurate enough for radius searches, at the
/// cost of up to ~0.5% error against the WGS84 ellipsoid.
#[inline]
pub fn haversine_distance(from: GeoPoint, to: GeoPoint) -> f64 {
    let from = geo::Point::from(from);
    let to = geo::Point::from(to);
    from.haversine_distance(&to) / 1000.0
}

/// Whether `point` lies within `radius_km` of `center`, boundary included
#[inline]
pub fn is_within_radius(center: GeoPoint, radius_km: f64, point: GeoPoint) -> bool {
    haversine_distance(center, point) <= radius_km + DISTANCE_EPSILON_KM
}

/// Latitude/longitude box enclosing a search circle.
///
/// When `min_lon > max_lon` the box crosses the antimeridian and covers
/// `[min_lon, 180] ∪ [-180, max_lon]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn wraps_antimeridian(&self) -> bool {
        self.min_lon > self.max_lon
    }

    /// Check if a point is within the box
    #[inline]
    pub fn contains(&self, point: GeoPoint) -> bool {
        let lat_ok = point.latitude >= self.min_lat && point.latitude <= self.max_lat;
        let lon_ok = if self.wraps_antimeridian() {
            point.longitude >= self.min_lon || point.longitude <= self.max_lon
        } else {
            point.longitude >= self.min_lon && point.longitude <= self.max_lon
        };
        lat_ok && lon_ok
    }
}

/// Calculate a bounding box containing every point within `radius_km` of `center`
///
/// This is only a pre-filter for stores; the exact test is [`is_within_radius`].
/// The longitude half-width is `asin(sin(r) / cos(lat))`, which is wider than the
/// naive `r / cos(lat)` at high latitudes. Circles reaching a pole span every
/// longitude.
pub fn calculate_bounding_box(center: GeoPoint, radius_km: f64) -> BoundingBox {
    // Slack so that points on the boundary survive the pre-filter
    let padded_km = radius_km * 1.0001 + 0.001;
    let angular = padded_km / EARTH_MEAN_RADIUS_KM;
    let angular_deg = angular.to_degrees();

    let min_lat = center.latitude - angular_deg;
    let max_lat = center.latitude + angular_deg;

    if min_lat <= -90.0 || max_lat >= 90.0 {
        return BoundingBox {
            min_lat: min_lat.max(-90.0),
            max_lat: max_lat.min(90.0),
            min_lon: -180.0,
            max_lon: 180.0,
        };
    }

    let ratio = angular.sin() / center.latitude.to_radians().cos();
    let lon_delta = ratio.min(1.0).asin().to_degrees();

    let mut min_lon = center.longitude - lon_delta;
    let mut max_lon = center.longitude + lon_delta;
    if max_lon - min_lon >= 360.0 {
        min_lon = -180.0;
        max_lon = 180.0;
    } else {
        if min_lon < -180.0 {
            min_lon += 360.0;
        }
        if max_lon > 180.0 {
            max_lon -= 360.0;
        }
    }

    BoundingBox {
        min_lat,
        max_lat,
        min_lon,
        max_lon,
    }
}
