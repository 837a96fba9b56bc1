#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Coordinate, viewport, and base layer types for the pollution map.
//!
//! These types are shared between the location capture controller, the
//! draft/submission flow, and the API server. A [`Coordinate`] is validated
//! at construction and immutable afterwards, so anything holding one can
//! rely on it being in range.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Default map center when no geolocation fix is available (Addis Ababa).
pub const DEFAULT_CENTER: (f64, f64) = (9.03, 38.75);

/// Zoom level for the default viewport.
pub const DEFAULT_ZOOM: u8 = 14;

/// Zoom level applied after a successful geolocation fix.
pub const PRECISE_ZOOM: u8 = 18;

/// A fix with worse accuracy than this (in meters) is declared imprecise.
pub const IMPRECISE_ACCURACY_METERS: f64 = 1000.0;

/// A WGS-84 coordinate pair.
///
/// Construction validates lat ∈ [-90, 90] and lng ∈ [-180, 180]; the
/// fields are private so an existing value is always in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

/// Unvalidated wire form of [`Coordinate`], used for deserialization.
#[derive(Debug, Clone, Copy, Deserialize)]
struct RawCoordinate {
    lat: f64,
    lng: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = InvalidCoordinateError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Self::new(raw.lat, raw.lng)
    }
}

impl Coordinate {
    /// Creates a coordinate, validating the latitude/longitude ranges.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCoordinateError`] if either component is out of
    /// range or not a finite number.
    pub fn new(lat: f64, lng: f64) -> Result<Self, InvalidCoordinateError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(InvalidCoordinateError { lat, lng });
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(InvalidCoordinateError { lat, lng });
        }
        Ok(Self { lat, lng })
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn lat(self) -> f64 {
        self.lat
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn lng(self) -> f64 {
        self.lng
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.4}, {:.4})", self.lat, self.lng)
    }
}

/// Error returned when constructing a [`Coordinate`] from out-of-range
/// values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidCoordinateError {
    /// The rejected latitude.
    pub lat: f64,
    /// The rejected longitude.
    pub lng: f64,
}

impl std::fmt::Display for InvalidCoordinateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid coordinate ({}, {}): expected lat in [-90, 90] and lng in [-180, 180]",
            self.lat, self.lng
        )
    }
}

impl std::error::Error for InvalidCoordinateError {}

/// Selectable background tile imagery styles.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BaseLayer {
    /// OpenStreetMap street tiles.
    Street,
    /// OpenTopoMap topographic tiles.
    Topographic,
    /// ArcGIS World Imagery satellite tiles.
    Satellite,
}

impl BaseLayer {
    /// Returns the raster tile URL template for this layer.
    ///
    /// The satellite provider addresses tiles as `{z}/{y}/{x}`; the other
    /// two use the usual `{z}/{x}/{y}` order.
    #[must_use]
    pub const fn tile_url_template(self) -> &'static str {
        match self {
            Self::Street => "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png",
            Self::Topographic => "https://{s}.tile.opentopomap.org/{z}/{x}/{y}.png",
            Self::Satellite => {
                "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}"
            }
        }
    }

    /// Returns the attribution string required by the tile provider.
    #[must_use]
    pub const fn attribution(self) -> &'static str {
        match self {
            Self::Street => "© OpenStreetMap contributors",
            Self::Topographic => "Map data: © OpenTopoMap & contributors",
            Self::Satellite => {
                "© Esri, DigitalGlobe, GeoEye, Earthstar Geographics, and the GIS User Community"
            }
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Street, Self::Topographic, Self::Satellite]
    }
}

/// The map viewport: center, zoom, and active base layer.
///
/// Owned exclusively by the location capture controller; renderers get
/// read-only snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportState {
    /// Current map center.
    pub center: Coordinate,
    /// Current zoom level.
    pub zoom: u8,
    /// Selected background imagery.
    pub active_base_layer: BaseLayer,
}

impl ViewportState {
    /// The default viewport shown before any geolocation fix.
    #[must_use]
    pub const fn default_viewport() -> Self {
        let (lat, lng) = DEFAULT_CENTER;
        Self {
            // In range by construction.
            center: Coordinate { lat, lng },
            zoom: DEFAULT_ZOOM,
            active_base_layer: BaseLayer::Street,
        }
    }
}

/// Confidence classification of a geolocation fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FixConfidence {
    /// Accuracy within the acceptable radius.
    Precise,
    /// Accuracy worse than [`IMPRECISE_ACCURACY_METERS`].
    Imprecise,
}

/// A single geolocation measurement.
///
/// Produced once per request and consumed immediately into the viewport;
/// not retained afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    /// Where the device claims to be.
    pub coordinate: Coordinate,
    /// Reported accuracy radius in meters.
    pub accuracy_meters: f64,
    /// Classification derived from `accuracy_meters` at construction.
    pub confidence: FixConfidence,
}

impl LocationFix {
    /// Creates a fix, classifying its confidence from the accuracy radius.
    #[must_use]
    pub fn new(coordinate: Coordinate, accuracy_meters: f64) -> Self {
        let confidence = if accuracy_meters > IMPRECISE_ACCURACY_METERS {
            FixConfidence::Imprecise
        } else {
            FixConfidence::Precise
        };
        Self {
            coordinate,
            accuracy_meters,
            confidence,
        }
    }
}

/// The single user-selected report location.
///
/// At most one exists at a time; a new map click replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedPin {
    /// The clicked coordinate.
    pub coordinate: Coordinate,
}
