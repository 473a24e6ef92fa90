use crate::models::{Coordinate, ListableEntity, RankedEntity};

/// Earth's radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Slack added to bounding box edges so float error never drops a point
/// sitting exactly on the radius
const BOX_MARGIN_DEG: f64 = 1e-6;

/// Calculate the Haversine distance between two coordinates in kilometers
///
/// Inputs are not range-checked. Out-of-range degrees give a defined but
/// meaningless result.
#[inline]
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1_rad = a.latitude.to_radians();
    let lat2_rad = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Geospatial bounding box in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// Calculate a box that contains every point within `radius_km` of `origin`
///
/// Used as a cheap pre-filter before the exact Haversine test. Returns `None`
/// when the circle reaches a pole or crosses the antimeridian, in which case
/// no box pre-filter applies.
pub fn calculate_bounding_box(origin: Coordinate, radius_km: f64) -> Option<BoundingBox> {
    if !radius_km.is_finite() || radius_km < 0.0 {
        return None;
    }

    let angular = radius_km / EARTH_RADIUS_KM;
    let lat_delta = angular.to_degrees() + BOX_MARGIN_DEG;

    let min_lat = origin.latitude - lat_delta;
    let max_lat = origin.latitude + lat_delta;
    if min_lat <= -90.0 || max_lat >= 90.0 {
        return None;
    }

    // Widest longitude reach of a spherical cap centred at this latitude
    let ratio = angular.sin() / origin.latitude.to_radians().cos();
    if !(0.0..1.0).contains(&ratio) {
        return None;
    }
    let lon_delta = ratio.asin().to_degrees() + BOX_MARGIN_DEG;

    let min_lon = origin.longitude - lon_delta;
    let max_lon = origin.longitude + lon_delta;
    if min_lon < -180.0 || max_lon > 180.0 {
        return None;
    }

    Some(BoundingBox { min_lat, max_lat, min_lon, max_lon })
}

/// Check if a point is within a bounding box
#[inline]
pub fn is_within_bounding_box(point: Coordinate, bbox: &BoundingBox) -> bool {
    point.latitude >= bbox.min_lat
        && point.latitude <= bbox.max_lat
        && point.longitude >= bbox.min_lon
        && point.longitude <= bbox.max_lon
}

/// Keep entities within `radius_km` of `origin`, nearest first
///
/// Entities without a coordinate are dropped. The boundary is inclusive and
/// equal distances keep their input order.
pub fn filter_by_radius<I>(entities: I, origin: Coordinate, radius_km: f64) -> Vec<RankedEntity>
where
    I: IntoIterator<Item = ListableEntity>,
{
    let bbox = calculate_bounding_box(origin, radius_km);

    let mut ranked: Vec<RankedEntity> = entities
        .into_iter()
        .filter_map(|entity| {
            let point = entity.coordinate?;

            if let Some(bbox) = &bbox {
                if !is_within_bounding_box(point, bbox) {
                    return None;
                }
            }

            let distance = distance_km(origin, point);
            if distance <= radius_km {
                Some(RankedEntity { entity, distance_km: Some(distance) })
            } else {
                None
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        a.distance_km
            .partial_cmp(&b.distance_km)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    ranked
}
