#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Draft assembly and the local durable draft slot.
//!
//! A draft is an unsubmitted pollution report in progress. It lives in a
//! single string-keyed slot in the local `SQLite` database so an
//! interrupted session can resume on the review screen. One in-flight
//! draft at a time: creating a second draft overwrites the first.
//!
//! A draft never contains uploaded media URLs — media upload is deferred
//! to submission time.
//!
//! Uses `switchy_database` for storage, following the same patterns as
//! the report store package.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use moosicbox_json_utils::database::ToValue as _;
use pollution_map_geo_models::{Coordinate, SelectedPin};
use pollution_map_report_models::ReportCategory;
use serde::{Deserialize, Serialize};
use switchy_database::{Database, DatabaseValue};
use switchy_database_connection::init_sqlite_rusqlite;
use thiserror::Error;

/// Default path for the local draft database.
pub const DEFAULT_DB_PATH: &str = "data/drafts.db";

/// The singleton slot key. One in-flight draft at a time.
const DRAFT_SLOT_KEY: &str = "draftReport";

/// Errors from draft assembly and storage.
#[derive(Debug, Error)]
pub enum DraftError {
    /// The report form was confirmed without a pollution category.
    #[error("A pollution category is required")]
    MissingCategory,

    /// A database query or command failed.
    #[error("Database error: {0}")]
    Database(String),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// An unsubmitted, locally persisted pollution report in progress.
///
/// The coordinate is fixed at creation from the selected pin and never
/// changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    /// Where the incident was pinned.
    pub coordinate: Coordinate,
    /// Incident category.
    pub category: ReportCategory,
    /// Free-text description (may be empty).
    pub description: String,
    /// When the draft was created.
    pub created_at: DateTime<Utc>,
}

/// Assembles a draft from a confirmed pin and the report form fields.
///
/// The description may be empty; the category may not.
///
/// # Errors
///
/// Returns [`DraftError::MissingCategory`] if no category was chosen.
pub fn create_draft(
    pin: SelectedPin,
    category: Option<ReportCategory>,
    description: impl Into<String>,
) -> Result<Draft, DraftError> {
    let category = category.ok_or(DraftError::MissingCategory)?;
    Ok(Draft {
        coordinate: pin.coordinate,
        category,
        description: description.into(),
        created_at: Utc::now(),
    })
}

/// Opens (or creates) the local draft `SQLite` database and ensures the
/// schema exists.
///
/// # Errors
///
/// Returns [`DraftError`] if the database cannot be opened or schema
/// creation fails.
pub async fn open_db(path: &Path) -> Result<Box<dyn Database>, DraftError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db = init_sqlite_rusqlite(Some(path)).map_err(|e| DraftError::Database(e.to_string()))?;

    ensure_schema(db.as_ref()).await?;

    Ok(db)
}

/// Creates the slot table if it doesn't already exist.
///
/// # Errors
///
/// Returns [`DraftError`] if the database operation fails.
pub async fn ensure_schema(db: &dyn Database) -> Result<(), DraftError> {
    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS draft_slots (
            slot        TEXT PRIMARY KEY,
            payload     TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        )",
    )
    .await
    .map_err(|e| DraftError::Database(e.to_string()))?;

    Ok(())
}

/// The single durable slot holding the in-flight draft.
///
/// Holds its database handle explicitly rather than reaching into a
/// process-wide storage namespace, so its lifecycle is tied to the
/// application session.
pub struct DraftSlot {
    db: Arc<dyn Database>,
}

impl DraftSlot {
    /// Creates a slot over the given local database.
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Persists the draft, overwriting any prior draft in the slot.
    ///
    /// # Errors
    ///
    /// Returns [`DraftError`] if serialization or the write fails.
    pub async fn save(&self, draft: &Draft) -> Result<(), DraftError> {
        let payload = serde_json::to_string(draft)?;
        let now = Utc::now().to_rfc3339();

        self.db
            .exec_raw_params(
                "INSERT INTO draft_slots (slot, payload, updated_at)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (slot) DO UPDATE SET
                   payload = excluded.payload,
                   updated_at = excluded.updated_at",
                &[
                    DatabaseValue::String(DRAFT_SLOT_KEY.to_string()),
                    DatabaseValue::String(payload),
                    DatabaseValue::String(now),
                ],
            )
            .await
            .map_err(|e| DraftError::Database(e.to_string()))?;

        Ok(())
    }

    /// Loads the in-flight draft, if one exists.
    ///
    /// A malformed stored payload (for example truncated JSON) reads as
    /// absent rather than an error, so draft recovery degrades to "start
    /// over" instead of breaking the review screen. The caller should
    /// redirect to pin selection when this returns `None`.
    ///
    /// # Errors
    ///
    /// Returns [`DraftError`] only if the database read itself fails.
    pub async fn load(&self) -> Result<Option<Draft>, DraftError> {
        let rows = self
            .db
            .query_raw_params(
                "SELECT payload FROM draft_slots WHERE slot = $1",
                &[DatabaseValue::String(DRAFT_SLOT_KEY.to_string())],
            )
            .await
            .map_err(|e| DraftError::Database(e.to_string()))?;

        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let payload: String = row.to_value("payload").unwrap_or_default();
        match serde_json::from_str(&payload) {
            Ok(draft) => Ok(Some(draft)),
            Err(e) => {
                log::warn!("discarding malformed stored draft: {e}");
                Ok(None)
            }
        }
    }

    /// Clears the slot unconditionally.
    ///
    /// # Errors
    ///
    /// Returns [`DraftError`] if the delete fails.
    pub async fn discard(&self) -> Result<(), DraftError> {
        self.db
            .exec_raw_params(
                "DELETE FROM draft_slots WHERE slot = $1",
                &[DatabaseValue::String(DRAFT_SLOT_KEY.to_string())],
            )
            .await
            .map_err(|e| DraftError::Database(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_slot() -> DraftSlot {
        let db = init_sqlite_rusqlite(None).expect("in-memory sqlite");
        ensure_schema(db.as_ref()).await.unwrap();
        DraftSlot::new(Arc::from(db))
    }

    fn pin(lat: f64, lng: f64) -> SelectedPin {
        SelectedPin {
            coordinate: Coordinate::new(lat, lng).unwrap(),
        }
    }

    #[test]
    fn create_draft_requires_a_category() {
        let err = create_draft(pin(9.05, 38.77), None, "smoke").unwrap_err();
        assert!(matches!(err, DraftError::MissingCategory));
    }

    #[test]
    fn create_draft_accepts_empty_description() {
        let draft = create_draft(pin(9.05, 38.77), Some(ReportCategory::Air), "").unwrap();
        assert_eq!(draft.category, ReportCategory::Air);
        assert!(draft.description.is_empty());
    }

    #[tokio::test]
    async fn draft_round_trips_through_the_slot() {
        let slot = memory_slot().await;
        let draft =
            create_draft(pin(9.05, 38.77), Some(ReportCategory::Water), "oily runoff").unwrap();

        slot.save(&draft).await.unwrap();
        let loaded = slot.load().await.unwrap().expect("draft should be present");
        assert_eq!(loaded, draft);
    }

    #[tokio::test]
    async fn empty_slot_loads_as_absent() {
        let slot = memory_slot().await;
        assert!(slot.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_save_overwrites_the_first() {
        let slot = memory_slot().await;
        let first = create_draft(pin(9.05, 38.77), Some(ReportCategory::Air), "first").unwrap();
        let second = create_draft(pin(9.06, 38.78), Some(ReportCategory::Noise), "second").unwrap();

        slot.save(&first).await.unwrap();
        slot.save(&second).await.unwrap();

        assert_eq!(slot.load().await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn discard_clears_the_slot() {
        let slot = memory_slot().await;
        let draft = create_draft(pin(9.05, 38.77), Some(ReportCategory::Other), "x").unwrap();
        slot.save(&draft).await.unwrap();

        slot.discard().await.unwrap();
        assert!(slot.load().await.unwrap().is_none());

        // Discarding an already-empty slot is fine.
        slot.discard().await.unwrap();
    }

    #[tokio::test]
    async fn malformed_stored_payload_reads_as_absent() {
        let slot = memory_slot().await;
        slot.db
            .exec_raw_params(
                "INSERT INTO draft_slots (slot, payload, updated_at) VALUES ($1, $2, $3)",
                &[
                    DatabaseValue::String("draftReport".to_string()),
                    DatabaseValue::String("{\"coordinate\":{\"lat\":9.0".to_string()),
                    DatabaseValue::String(Utc::now().to_rfc3339()),
                ],
            )
            .await
            .unwrap();

        assert!(slot.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn saved_draft_survives_a_new_session_over_the_same_db() {
        let db: Arc<dyn Database> = Arc::from(init_sqlite_rusqlite(None).expect("in-memory sqlite"));
        ensure_schema(db.as_ref()).await.unwrap();

        let draft = create_draft(
            pin(9.05, 38.77),
            Some(ReportCategory::Water),
            "plastic waste along the river bank",
        )
        .unwrap();
        DraftSlot::new(db.clone()).save(&draft).await.unwrap();

        // A fresh slot over the same database, as after an app reload.
        let resumed = DraftSlot::new(db).load().await.unwrap().unwrap();
        assert_eq!(resumed.coordinate, Coordinate::new(9.05, 38.77).unwrap());
        assert_eq!(resumed.category, ReportCategory::Water);
        assert_eq!(resumed.category.label(), "Water Pollution");
    }
}
