use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::constants::{
    INITIAL_LATITUDE, INITIAL_LATITUDE_DELTA, INITIAL_LONGITUDE, INITIAL_LONGITUDE_DELTA,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Finite and inside the valid latitude/longitude ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryImage {
    pub src: String,
}

/// A single geotagged feed item. `link` is its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub link: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<EntryImage>,
    #[serde(default)]
    pub emoji: String,
    pub coordinates: Coordinates,
}

impl Entry {
    /// Publication time, if `date` is RFC 3339 or RFC 2822.
    pub fn published(&self) -> Option<DateTime<FixedOffset>> {
        let raw = self.date.as_deref()?.trim();
        DateTime::parse_from_rfc3339(raw)
            .or_else(|_| DateTime::parse_from_rfc2822(raw))
            .ok()
    }
}

/// Map viewport: centre plus angular span in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl Default for Region {
    fn default() -> Self {
        Self {
            latitude: INITIAL_LATITUDE,
            longitude: INITIAL_LONGITUDE,
            latitude_delta: INITIAL_LATITUDE_DELTA,
            longitude_delta: INITIAL_LONGITUDE_DELTA,
        }
    }
}

impl Region {
    pub fn bbox(&self) -> BBox {
        let half_lat = self.latitude_delta.abs() / 2.0;
        let half_lng = self.longitude_delta.abs() / 2.0;
        BBox {
            west: self.longitude - half_lng,
            south: (self.latitude - half_lat).max(-90.0),
            east: self.longitude + half_lng,
            north: (self.latitude + half_lat).min(90.0),
        }
    }

    /// Finite centre and a finite, non-negative span.
    pub fn is_usable(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude_delta.is_finite()
            && self.longitude_delta.is_finite()
            && self.latitude_delta >= 0.0
            && self.longitude_delta >= 0.0
    }

    /// Centred on `center` at the default span.
    pub fn focused_on(center: Coordinates) -> Self {
        Self {
            latitude: center.latitude,
            longitude: center.longitude,
            latitude_delta: INITIAL_LATITUDE_DELTA,
            longitude_delta: INITIAL_LONGITUDE_DELTA,
        }
    }
}

/// `[west, south, east, north]` in degrees. `west > east` crosses the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self { west, south, east, north }
    }

    pub fn world() -> Self {
        Self::new(-180.0, -90.0, 180.0, 90.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_bbox_is_centered() {
        let region = Region {
            latitude: 10.0,
            longitude: 20.0,
            latitude_delta: 2.0,
            longitude_delta: 4.0,
        };
        assert_eq!(region.bbox(), BBox::new(18.0, 9.0, 22.0, 11.0));
    }

    #[test]
    fn region_bbox_clamps_latitude() {
        let region = Region {
            latitude: 89.0,
            longitude: 0.0,
            latitude_delta: 10.0,
            longitude_delta: 10.0,
        };
        let bbox = region.bbox();
        assert_eq!(bbox.north, 90.0);
        assert_eq!(bbox.south, 84.0);
    }

    #[test]
    fn region_uses_camel_case_on_the_wire() {
        let json = serde_json::to_value(Region::default()).unwrap();
        assert_eq!(json["latitudeDelta"], INITIAL_LATITUDE_DELTA);
        assert_eq!(json["longitudeDelta"], INITIAL_LONGITUDE_DELTA);
    }

    #[test]
    fn published_parses_rfc3339_and_rfc2822() {
        let mut entry = Entry {
            link: "https://example.com/a".to_string(),
            title: "a".to_string(),
            body: String::new(),
            date: Some("2024-05-01T12:00:00Z".to_string()),
            image: None,
            emoji: "hockey".to_string(),
            coordinates: Coordinates::new(39.9, -75.1),
        };
        assert!(entry.published().is_some());

        entry.date = Some("Wed, 01 May 2024 12:00:00 +0000".to_string());
        assert!(entry.published().is_some());

        entry.date = Some("next tuesday".to_string());
        assert!(entry.published().is_none());
    }

    #[test]
    fn coordinates_validity() {
        assert!(Coordinates::new(39.9, -75.1).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, 181.0).is_valid());
    }
}
