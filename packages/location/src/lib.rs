#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map surface events and the location capture controller.
//!
//! The controller owns the viewport (center, zoom, active base layer) and
//! the currently selected pin, and orchestrates the device geolocation
//! provider. Renderers get read-only snapshots and a
//! [`ViewportTransition`] telling them whether to animate or jump.
//!
//! A geolocation request can resolve long after the user has moved on, so
//! every request is tagged with a monotonically increasing sequence number
//! at issue time. A completion is applied only if it still carries the
//! latest issued sequence; stale completions are discarded silently. A
//! detached controller (view torn down) likewise ignores late completions.

mod controller;

pub use controller::{LocatePhase, LocationController, LocationUpdate, ViewportTransition};

use std::time::Duration;

use async_trait::async_trait;
use pollution_map_geo_models::{Coordinate, LocationFix};

/// How long a viewport fly-to animation takes.
pub const FLY_DURATION: Duration = Duration::from_secs(2);

/// Options for a single geolocation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    /// Ask the device for its best (e.g. GPS) fix.
    pub enable_high_accuracy: bool,
    /// Give up after this long.
    pub timeout: Duration,
    /// Maximum acceptable age of a cached fix. Zero means no cached
    /// results are accepted.
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout: Duration::from_secs(20),
            maximum_age: Duration::ZERO,
        }
    }
}

/// Why a geolocation request produced no fix.
///
/// These are values surfaced as dismissible warnings, never panics; the
/// viewport falls back to the default center either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    /// The device has no geolocation capability.
    #[error("Geolocation is not supported on this device")]
    Unsupported,

    /// The user denied the permission prompt.
    #[error("Location permission was denied")]
    Denied,

    /// The device could not produce a fix.
    #[error("Unable to determine your location")]
    Unavailable,

    /// No fix arrived within the request timeout.
    #[error("Timed out waiting for a location fix")]
    Timeout,
}

impl PositionError {
    /// Human-readable message for the dismissible warning banner.
    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::Unsupported => "Geolocation is not supported by your device.",
            Self::Denied | Self::Unavailable | Self::Timeout => {
                "Unable to get your location. Using default center."
            }
        }
    }
}

/// Device/browser geolocation capability.
///
/// One request produces one fix or one error, asynchronously. All failure
/// is delivered through the same channel as success — implementations must
/// not panic.
#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    /// Whether the capability exists at all on this device.
    fn supported(&self) -> bool {
        true
    }

    /// Requests a single position fix.
    ///
    /// # Errors
    ///
    /// Returns a [`PositionError`] describing why no fix was produced.
    async fn current_position(&self, options: PositionOptions) -> Result<LocationFix, PositionError>;
}

/// Events the map surface emits toward the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MapEvent {
    /// The user clicked the viewport at this coordinate.
    Click(Coordinate),
    /// The user pressed "use my location".
    LocateRequested,
}
