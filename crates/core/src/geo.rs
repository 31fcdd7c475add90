//! Spherical distance helpers for the tours-within and distances endpoints.
//!
//! Points are stored GeoJSON style: `{ "type": "Point", "coordinates": [lng, lat] }`.

use std::str::FromStr;

use crate::document::lookup;
use crate::error::CoreError;
use crate::types::Document;

/// Earth radius in miles.
pub const EARTH_RADIUS_MI: f64 = 3963.2;

/// Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6378.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    Miles,
    Kilometers,
}

impl DistanceUnit {
    pub fn earth_radius(&self) -> f64 {
        match self {
            DistanceUnit::Miles => EARTH_RADIUS_MI,
            DistanceUnit::Kilometers => EARTH_RADIUS_KM,
        }
    }
}

impl FromStr for DistanceUnit {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mi" => Ok(DistanceUnit::Miles),
            "km" => Ok(DistanceUnit::Kilometers),
            other => Err(CoreError::Validation(format!(
                "Unit must be either mi or km, got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl FromStr for LatLng {
    type Err = CoreError;

    /// Parse `"34.111745,-118.113491"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            CoreError::Validation(
                "Please provide latitude and longitude in the format lat,lng.".into(),
            )
        };
        let (lat, lng) = s.split_once(',').ok_or_else(invalid)?;
        let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
        let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(invalid());
        }
        Ok(Self { lat, lng })
    }
}

/// Read a GeoJSON point stored under `field`.
pub fn point_of(doc: &Document, field: &str) -> Option<LatLng> {
    let coords = lookup(doc, field)?.get("coordinates")?.as_array()?;
    match coords.as_slice() {
        [lng, lat, ..] => Some(LatLng {
            lat: lat.as_f64()?,
            lng: lng.as_f64()?,
        }),
        _ => None,
    }
}

/// Central angle between two points in radians (haversine formula).
pub fn central_angle(a: LatLng, b: LatLng) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let d_lat = lat2 - lat1;
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * h.sqrt().min(1.0).asin()
}

/// Great-circle distance expressed in `unit`.
pub fn distance(a: LatLng, b: LatLng, unit: DistanceUnit) -> f64 {
    central_angle(a, b) * unit.earth_radius()
}

/// Documents whose point at `field` lies within `radius` (in `unit`) of
/// `center`. Documents without a point are skipped.
pub fn within<'a>(
    docs: impl IntoIterator<Item = &'a Document>,
    field: &str,
    center: LatLng,
    radius: f64,
    unit: DistanceUnit,
) -> Vec<&'a Document> {
    let max_angle = radius / unit.earth_radius();
    docs.into_iter()
        .filter(|doc| point_of(doc, field).is_some_and(|p| central_angle(center, p) <= max_angle))
        .collect()
}

/// Every document with a point at `field`, paired with its distance from
/// `center`, nearest first.
pub fn distances<'a>(
    docs: impl IntoIterator<Item = &'a Document>,
    field: &str,
    center: LatLng,
    unit: DistanceUnit,
) -> Vec<(f64, &'a Document)> {
    let mut measured: Vec<(f64, &Document)> = docs
        .into_iter()
        .filter_map(|doc| point_of(doc, field).map(|p| (distance(center, p, unit), doc)))
        .collect();
    measured.sort_by(|a, b| a.0.total_cmp(&b.0));
    measured
}
