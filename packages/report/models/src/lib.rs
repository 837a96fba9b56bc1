#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Pollution category, report status, and role taxonomies.
//!
//! This crate defines the canonical enums used across the pollution map
//! system, plus the report and comment record types shared between the
//! store, the submission pipeline, and the API server.

use chrono::{DateTime, Utc};
use pollution_map_geo_models::Coordinate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Pollution incident categories a citizen can report.
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
pub enum ReportCategory {
    /// Smoke, emissions, odors.
    Air,
    /// Contaminated rivers, lakes, drinking water.
    Water,
    /// Illegal dumping, overflowing waste.
    SolidWaste,
    /// Persistent excessive noise.
    Noise,
    /// Anything not covered above.
    Other,
}

impl ReportCategory {
    /// Human-readable label shown in forms and dashboards.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Air => "Air Pollution",
            Self::Water => "Water Pollution",
            Self::SolidWaste => "Solid Waste",
            Self::Noise => "Noise Pollution",
            Self::Other => "Other",
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Air,
            Self::Water,
            Self::SolidWaste,
            Self::Noise,
            Self::Other,
        ]
    }
}

/// Lifecycle status of a submitted report.
///
/// Every report starts `Active`; regulators move it through the rest.
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReportStatus {
    /// Newly submitted, awaiting review.
    Active,
    /// Under investigation by a regulator.
    Investigating,
    /// Closed out.
    Resolved,
}

impl ReportStatus {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Active, Self::Investigating, Self::Resolved]
    }
}

/// A user's role, determining which dashboards they may open.
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    /// Reports incidents from the map.
    Citizen,
    /// Reviews and comments on reports.
    Student,
    /// Reviews, comments, and changes report status.
    Regulator,
}

/// Route destinations gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RouteTag {
    /// Landing page.
    Home,
    /// The map with pin selection and the report form.
    ReportMap,
    /// Draft review and submission screen.
    DraftReview,
    /// Single report detail with comment thread.
    ReportDetail,
    /// Student review dashboard.
    StudentDashboard,
    /// Regulator dashboard with status controls.
    RegulatoryDashboard,
}

impl Role {
    /// Returns the routes this role may open.
    ///
    /// Resolved once at route entry.
    #[must_use]
    pub const fn allowed_routes(self) -> &'static [RouteTag] {
        match self {
            Self::Citizen => &[
                RouteTag::Home,
                RouteTag::ReportMap,
                RouteTag::DraftReview,
                RouteTag::ReportDetail,
            ],
            Self::Student => &[
                RouteTag::Home,
                RouteTag::ReportDetail,
                RouteTag::StudentDashboard,
            ],
            Self::Regulator => &[
                RouteTag::Home,
                RouteTag::ReportDetail,
                RouteTag::RegulatoryDashboard,
            ],
        }
    }

    /// Whether this role may open the given route.
    #[must_use]
    pub fn can_access(self, route: RouteTag) -> bool {
        self.allowed_routes().contains(&route)
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Citizen, Self::Student, Self::Regulator]
    }
}

/// An authenticated user, carried explicitly through the session instead
/// of being looked up from ambient global state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    /// Stable user ID.
    pub id: String,
    /// Login email, also shown as comment authorship.
    pub email: String,
    /// Dashboard role.
    pub role: Role,
}

/// A submitted pollution report as stored in the report store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
    /// Report UUID.
    pub id: String,
    /// Submitting user's ID.
    pub user_id: String,
    /// Where the incident was pinned.
    pub coordinate: Coordinate,
    /// Incident category.
    pub category: ReportCategory,
    /// Free-text description (may be empty).
    pub description: String,
    /// Public URLs of uploaded media, in attachment order.
    pub media_urls: Vec<String>,
    /// Current lifecycle status.
    pub status: ReportStatus,
    /// When the report was submitted.
    pub created_at: DateTime<Utc>,
}

/// A comment on a report.
///
/// Authorship is tracked by authenticated user identity; the email is
/// joined in for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    /// Comment UUID.
    pub id: String,
    /// The report this comment belongs to.
    pub report_id: String,
    /// Author's user ID.
    pub user_id: String,
    /// Author's email, when the user row still exists.
    pub author_email: Option<String>,
    /// Comment body.
    pub body: String,
    /// Public URLs of media attached to the comment.
    pub media_urls: Vec<String>,
    /// When the comment was created.
    pub created_at: DateTime<Utc>,
}
