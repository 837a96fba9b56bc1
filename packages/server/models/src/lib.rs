#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the pollution map server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the store record types to allow independent evolution of the API
//! contract.

use chrono::{DateTime, Utc};
use pollution_map_report_models::{CommentRecord, ReportCategory, ReportRecord, ReportStatus};
use serde::{Deserialize, Serialize};

/// A pollution report as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReport {
    /// Report UUID.
    pub id: String,
    /// Submitting user's ID.
    pub user_id: String,
    /// Latitude of the pinned location.
    pub lat: f64,
    /// Longitude of the pinned location.
    pub lng: f64,
    /// Incident category.
    pub category: ReportCategory,
    /// Human-readable category label.
    pub category_label: String,
    /// Free-text description.
    pub description: String,
    /// Public URLs of uploaded media.
    pub media_urls: Vec<String>,
    /// Current lifecycle status.
    pub status: ReportStatus,
    /// When the report was submitted.
    pub created_at: DateTime<Utc>,
}

impl From<ReportRecord> for ApiReport {
    fn from(record: ReportRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            lat: record.coordinate.lat(),
            lng: record.coordinate.lng(),
            category: record.category,
            category_label: record.category.label().to_string(),
            description: record.description,
            media_urls: record.media_urls,
            status: record.status,
            created_at: record.created_at,
        }
    }
}

/// A comment as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiComment {
    /// Comment UUID.
    pub id: String,
    /// The report this comment belongs to.
    pub report_id: String,
    /// Author's email, when the user row still exists.
    pub author_email: Option<String>,
    /// Comment body.
    pub body: String,
    /// Public URLs of attached media.
    pub media_urls: Vec<String>,
    /// When the comment was created.
    pub created_at: DateTime<Utc>,
}

impl From<CommentRecord> for ApiComment {
    fn from(record: CommentRecord) -> Self {
        Self {
            id: record.id,
            report_id: record.report_id,
            author_email: record.author_email,
            body: record.body,
            media_urls: record.media_urls,
            created_at: record.created_at,
        }
    }
}

/// One entry in the category taxonomy returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCategory {
    /// Wire name (`SCREAMING_SNAKE_CASE`).
    pub name: String,
    /// Label shown in forms and dashboards.
    pub label: String,
}

/// Query parameters for the reports endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQueryParams {
    /// Lifecycle status to filter by (defaults to `active`).
    pub status: Option<String>,
}

/// Comment count response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCommentCount {
    /// Number of comments on the report.
    pub count: u64,
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}
