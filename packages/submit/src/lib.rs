#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Two-phase upload-then-persist submission pipeline.
//!
//! Submitting a report (or a comment) is an ordered, non-atomic protocol:
//!
//! 1. **Upload phase** — every attachment is uploaded to the blob store
//!    under a fresh unique key. All uploads must complete before anything
//!    is persisted; a single failure aborts the submission with no record
//!    created. Blobs already uploaded earlier in the batch are not rolled
//!    back — an orphaned blob is an accepted trade-off, not a crash.
//! 2. **Persist phase** — exactly one record is inserted referencing the
//!    uploaded URLs. A failure here surfaces to the caller for an explicit
//!    retry; the pipeline never retries on its own.
//!
//! On any failure the local draft is preserved so the user can retry
//! without re-entering data; only a fully successful submission discards
//! it.

use std::sync::Arc;

use pollution_map_database::queries::{self, NewComment, NewReport};
use pollution_map_database::DbError;
use pollution_map_draft::{Draft, DraftSlot};
use pollution_map_media::{MediaAttachment, MediaError, MediaStore, object_key};
use pollution_map_report_models::{CommentRecord, ReportRecord, SessionUser};
use switchy_database::Database;
use thiserror::Error;

/// Errors from the submission pipeline. Both variants are retryable by
/// the user; the pipeline performs no automatic retries.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// An attachment failed to upload; no record was created.
    #[error("Failed to upload {file_name}: {source}")]
    Upload {
        /// Original file name of the failed attachment.
        file_name: String,
        /// Underlying blob store error.
        #[source]
        source: MediaError,
    },

    /// The record insert failed after all uploads succeeded.
    #[error("Failed to persist record: {0}")]
    Persist(#[from] DbError),
}

/// Submits reports and comments against an explicit store pair.
///
/// Holds its collaborators directly rather than looking them up from
/// ambient global state; lifecycle is tied to the application session.
pub struct SubmissionPipeline {
    db: Arc<dyn Database>,
    media: Arc<dyn MediaStore>,
}

impl SubmissionPipeline {
    /// Creates a pipeline over the report store and blob store.
    #[must_use]
    pub fn new(db: Arc<dyn Database>, media: Arc<dyn MediaStore>) -> Self {
        Self { db, media }
    }

    /// Submits a draft with its attachments on behalf of the user.
    ///
    /// On success the draft slot is cleared and the stored report is
    /// returned for navigation/confirmation. On any failure the slot is
    /// left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Upload`] if any attachment upload fails
    /// (no report record is created), or [`SubmitError::Persist`] if the
    /// report insert fails.
    pub async fn submit(
        &self,
        slot: &DraftSlot,
        draft: &Draft,
        attachments: Vec<MediaAttachment>,
        user: &SessionUser,
    ) -> Result<ReportRecord, SubmitError> {
        let media_urls = self.upload_all(attachments).await?;

        let report = queries::insert_report(
            self.db.as_ref(),
            &NewReport {
                user_id: user.id.clone(),
                coordinate: draft.coordinate,
                category: draft.category,
                description: draft.description.clone(),
                media_urls,
            },
        )
        .await?;

        log::info!("submitted report {} by {}", report.id, user.email);
        discard_draft_best_effort(slot).await;

        Ok(report)
    }

    /// Adds a comment with its attachments on behalf of the user.
    ///
    /// Same two-phase shape and failure policy as [`Self::submit`]: no
    /// comment record on upload failure, and the caller's compose state
    /// is never touched by the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Upload`] if any attachment upload fails,
    /// or [`SubmitError::Persist`] if the comment insert fails.
    pub async fn add_comment(
        &self,
        report_id: &str,
        user: &SessionUser,
        body: impl Into<String> + Send,
        attachments: Vec<MediaAttachment>,
    ) -> Result<CommentRecord, SubmitError> {
        let media_urls = self.upload_all(attachments).await?;

        let comment = queries::insert_comment(
            self.db.as_ref(),
            &NewComment {
                report_id: report_id.to_string(),
                user_id: user.id.clone(),
                body: body.into(),
                media_urls,
            },
        )
        .await?;

        Ok(comment)
    }

    /// Uploads every attachment under a fresh unique key, collecting the
    /// public URLs in input order. Barrier semantics: the whole set must
    /// succeed before the caller may persist anything.
    async fn upload_all(
        &self,
        attachments: Vec<MediaAttachment>,
    ) -> Result<Vec<String>, SubmitError> {
        let mut urls = Vec::with_capacity(attachments.len());

        for attachment in attachments {
            let key = object_key(&attachment.file_name);
            let url = self
                .media
                .upload(&key, attachment.bytes, &attachment.content_type)
                .await
                .map_err(|source| SubmitError::Upload {
                    file_name: attachment.file_name,
                    source,
                })?;
            urls.push(url);
        }

        Ok(urls)
    }
}

/// Clears the draft slot after a successful submission.
///
/// The report already exists at this point, so a failing local delete
/// must not fail the submission — surfacing an error here would invite a
/// retry and a duplicate report. Logged and dropped instead.
async fn discard_draft_best_effort(slot: &DraftSlot) {
    if let Err(e) = slot.discard().await {
        log::error!("failed to clear draft slot after submission: {e}");
    }
}
