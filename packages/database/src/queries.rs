//! Insert and query operations for reports, comments, and users.

use chrono::{DateTime, Utc};
use moosicbox_json_utils::database::ToValue as _;
use pollution_map_geo_models::Coordinate;
use pollution_map_report_models::{
    CommentRecord, ReportCategory, ReportRecord, ReportStatus, Role, SessionUser,
};
use switchy_database::{Database, DatabaseValue};

use crate::DbError;

/// A report ready to be inserted, as assembled by the submission pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
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
}

/// A comment ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    /// The report being commented on.
    pub report_id: String,
    /// Authoring user's ID.
    pub user_id: String,
    /// Comment body.
    pub body: String,
    /// Public URLs of media attached to the comment.
    pub media_urls: Vec<String>,
}

/// Inserts exactly one report row with initial status
/// [`ReportStatus::Active`] and returns the stored record.
///
/// # Errors
///
/// Returns [`DbError`] if the insert fails.
pub async fn insert_report(db: &dyn Database, report: &NewReport) -> Result<ReportRecord, DbError> {
    let id = uuid::Uuid::new_v4().to_string();
    let created_at = Utc::now();
    let media_urls_json =
        serde_json::to_string(&report.media_urls).map_err(|e| DbError::Conversion {
            message: format!("Failed to serialize media URLs: {e}"),
        })?;

    db.exec_raw_params(
        "INSERT INTO reports (id, user_id, lat, lng, category, description,
                              media_urls, status, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        &[
            DatabaseValue::String(id.clone()),
            DatabaseValue::String(report.user_id.clone()),
            DatabaseValue::Real64(report.coordinate.lat()),
            DatabaseValue::Real64(report.coordinate.lng()),
            DatabaseValue::String(report.category.as_ref().to_string()),
            DatabaseValue::String(report.description.clone()),
            DatabaseValue::String(media_urls_json),
            DatabaseValue::String(ReportStatus::Active.as_ref().to_string()),
            DatabaseValue::String(created_at.to_rfc3339()),
        ],
    )
    .await
    .map_err(|e| DbError::Database(e.to_string()))?;

    Ok(ReportRecord {
        id,
        user_id: report.user_id.clone(),
        coordinate: report.coordinate,
        category: report.category,
        description: report.description.clone(),
        media_urls: report.media_urls.clone(),
        status: ReportStatus::Active,
        created_at,
    })
}

/// Queries reports with the given status, newest first.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn query_reports_by_status(
    db: &dyn Database,
    status: ReportStatus,
) -> Result<Vec<ReportRecord>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, user_id, lat, lng, category, description,
                    media_urls, status, created_at
             FROM reports WHERE status = $1
             ORDER BY created_at DESC",
            &[DatabaseValue::String(status.as_ref().to_string())],
        )
        .await
        .map_err(|e| DbError::Database(e.to_string()))?;

    Ok(rows.iter().filter_map(report_from_row).collect())
}

/// Loads a single report by ID.
///
/// Returns `None` if the report doesn't exist.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_report(db: &dyn Database, id: &str) -> Result<Option<ReportRecord>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, user_id, lat, lng, category, description,
                    media_urls, status, created_at
             FROM reports WHERE id = $1",
            &[DatabaseValue::String(id.to_string())],
        )
        .await
        .map_err(|e| DbError::Database(e.to_string()))?;

    Ok(rows.first().and_then(report_from_row))
}

/// Moves a report to a new lifecycle status.
///
/// Returns `false` if no report with that ID exists.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn update_report_status(
    db: &dyn Database,
    id: &str,
    status: ReportStatus,
) -> Result<bool, DbError> {
    let updated = db
        .exec_raw_params(
            "UPDATE reports SET status = $1 WHERE id = $2",
            &[
                DatabaseValue::String(status.as_ref().to_string()),
                DatabaseValue::String(id.to_string()),
            ],
        )
        .await
        .map_err(|e| DbError::Database(e.to_string()))?;

    Ok(updated > 0)
}

/// Inserts exactly one comment row and returns the stored record with the
/// author's email joined in.
///
/// # Errors
///
/// Returns [`DbError`] if the insert fails.
pub async fn insert_comment(
    db: &dyn Database,
    comment: &NewComment,
) -> Result<CommentRecord, DbError> {
    let id = uuid::Uuid::new_v4().to_string();
    let created_at = Utc::now();
    let media_urls_json =
        serde_json::to_string(&comment.media_urls).map_err(|e| DbError::Conversion {
            message: format!("Failed to serialize media URLs: {e}"),
        })?;

    db.exec_raw_params(
        "INSERT INTO comments (id, report_id, user_id, body, media_urls, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
        &[
            DatabaseValue::String(id.clone()),
            DatabaseValue::String(comment.report_id.clone()),
            DatabaseValue::String(comment.user_id.clone()),
            DatabaseValue::String(comment.body.clone()),
            DatabaseValue::String(media_urls_json),
            DatabaseValue::String(created_at.to_rfc3339()),
        ],
    )
    .await
    .map_err(|e| DbError::Database(e.to_string()))?;

    let author_email = get_user_email(db, &comment.user_id).await?;

    Ok(CommentRecord {
        id,
        report_id: comment.report_id.clone(),
        user_id: comment.user_id.clone(),
        author_email,
        body: comment.body.clone(),
        media_urls: comment.media_urls.clone(),
        created_at,
    })
}

/// Queries all comments on a report, newest first, with author emails
/// joined from the users table.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn query_comments_by_report(
    db: &dyn Database,
    report_id: &str,
) -> Result<Vec<CommentRecord>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT c.id, c.report_id, c.user_id, c.body, c.media_urls,
                    c.created_at, u.email
             FROM comments c
             LEFT JOIN users u ON u.id = c.user_id
             WHERE c.report_id = $1
             ORDER BY c.created_at DESC",
            &[DatabaseValue::String(report_id.to_string())],
        )
        .await
        .map_err(|e| DbError::Database(e.to_string()))?;

    Ok(rows
        .iter()
        .filter_map(|row| {
            let created_at = parse_timestamp(&row.to_value::<String>("created_at").ok()?)?;
            Some(CommentRecord {
                id: row.to_value("id").unwrap_or_default(),
                report_id: row.to_value("report_id").unwrap_or_default(),
                user_id: row.to_value("user_id").unwrap_or_default(),
                author_email: row.to_value("email").unwrap_or(None),
                body: row.to_value("body").unwrap_or_default(),
                media_urls: parse_media_urls(&row.to_value::<String>("media_urls").ok()?),
                created_at,
            })
        })
        .collect())
}

/// Counts comments on a report.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn count_comments(db: &dyn Database, report_id: &str) -> Result<u64, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT COUNT(*) as cnt FROM comments WHERE report_id = $1",
            &[DatabaseValue::String(report_id.to_string())],
        )
        .await
        .map_err(|e| DbError::Database(e.to_string()))?;

    let count: i64 = rows.first().map_or(0, |r| r.to_value("cnt").unwrap_or(0));

    #[allow(clippy::cast_sign_loss)]
    Ok(count as u64)
}

/// Creates a user row for the email if none exists, returning the stored
/// identity either way.
///
/// Auth mechanics (credentials, login) live outside this crate; this only
/// maintains the identity rows that report and comment authorship
/// reference.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn upsert_user(db: &dyn Database, email: &str, role: Role) -> Result<SessionUser, DbError> {
    if let Some(existing) = get_user_by_email(db, email).await? {
        return Ok(existing);
    }

    let id = uuid::Uuid::new_v4().to_string();
    db.exec_raw_params(
        "INSERT INTO users (id, email, role, created_at)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (email) DO NOTHING",
        &[
            DatabaseValue::String(id),
            DatabaseValue::String(email.to_string()),
            DatabaseValue::String(role.as_ref().to_string()),
            DatabaseValue::String(Utc::now().to_rfc3339()),
        ],
    )
    .await
    .map_err(|e| DbError::Database(e.to_string()))?;

    // Re-read so a concurrent insert of the same email resolves to one row.
    get_user_by_email(db, email)
        .await?
        .ok_or_else(|| DbError::Conversion {
            message: format!("User row missing after upsert for {email}"),
        })
}

/// Looks up a user by login email.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_user_by_email(
    db: &dyn Database,
    email: &str,
) -> Result<Option<SessionUser>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, email, role FROM users WHERE email = $1",
            &[DatabaseValue::String(email.to_string())],
        )
        .await
        .map_err(|e| DbError::Database(e.to_string()))?;

    Ok(rows.first().and_then(|row| {
        let role_name: String = row.to_value("role").unwrap_or_default();
        let Ok(role) = role_name.parse() else {
            log::warn!("skipping user with unknown role {role_name:?}");
            return None;
        };
        Some(SessionUser {
            id: row.to_value("id").unwrap_or_default(),
            email: row.to_value("email").unwrap_or_default(),
            role,
        })
    }))
}

async fn get_user_email(db: &dyn Database, user_id: &str) -> Result<Option<String>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT email FROM users WHERE id = $1",
            &[DatabaseValue::String(user_id.to_string())],
        )
        .await
        .map_err(|e| DbError::Database(e.to_string()))?;

    Ok(rows.first().and_then(|r| r.to_value("email").unwrap_or(None)))
}

/// Builds a [`ReportRecord`] from a row, skipping rows with values we
/// can't interpret (logged at warn, never an error).
fn report_from_row(row: &switchy_database::Row) -> Option<ReportRecord> {
    let id: String = row.to_value("id").unwrap_or_default();

    let lat: f64 = row.to_value("lat").unwrap_or(0.0);
    let lng: f64 = row.to_value("lng").unwrap_or(0.0);
    let Ok(coordinate) = Coordinate::new(lat, lng) else {
        log::warn!("skipping report {id} with out-of-range coordinate ({lat}, {lng})");
        return None;
    };

    let category_name: String = row.to_value("category").unwrap_or_default();
    let Ok(category) = category_name.parse() else {
        log::warn!("skipping report {id} with unknown category {category_name:?}");
        return None;
    };

    let status_name: String = row.to_value("status").unwrap_or_default();
    let Ok(status) = status_name.parse() else {
        log::warn!("skipping report {id} with unknown status {status_name:?}");
        return None;
    };

    let created_at = parse_timestamp(&row.to_value::<String>("created_at").ok()?)?;

    Some(ReportRecord {
        id,
        user_id: row.to_value("user_id").unwrap_or_default(),
        coordinate,
        category,
        description: row.to_value("description").unwrap_or_default(),
        media_urls: parse_media_urls(&row.to_value::<String>("media_urls").unwrap_or_default()),
        status,
        created_at,
    })
}

fn parse_media_urls(json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_else(|e| {
        log::warn!("discarding malformed media URL list: {e}");
        Vec::new()
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            log::warn!("skipping row with malformed timestamp {raw:?}: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchy_database_connection::init_sqlite_rusqlite;

    async fn memory_db() -> Box<dyn Database> {
        let db = init_sqlite_rusqlite(None).expect("in-memory sqlite");
        crate::ensure_schema(db.as_ref()).await.unwrap();
        db
    }

    fn new_report(user_id: &str) -> NewReport {
        NewReport {
            user_id: user_id.to_string(),
            coordinate: Coordinate::new(9.05, 38.77).unwrap(),
            category: ReportCategory::Water,
            description: "oily runoff into the river".to_string(),
            media_urls: vec!["https://media.example/a.jpg".to_string()],
        }
    }

    #[tokio::test]
    async fn inserted_report_starts_active_and_round_trips() {
        let db = memory_db().await;
        let stored = insert_report(db.as_ref(), &new_report("u1")).await.unwrap();
        assert_eq!(stored.status, ReportStatus::Active);

        let fetched = get_report(db.as_ref(), &stored.id).await.unwrap().unwrap();
        assert_eq!(fetched.coordinate, stored.coordinate);
        assert_eq!(fetched.category, ReportCategory::Water);
        assert_eq!(fetched.media_urls, stored.media_urls);
    }

    #[tokio::test]
    async fn status_query_filters_and_update_moves_reports() {
        let db = memory_db().await;
        let a = insert_report(db.as_ref(), &new_report("u1")).await.unwrap();
        let b = insert_report(db.as_ref(), &new_report("u2")).await.unwrap();

        assert!(
            update_report_status(db.as_ref(), &a.id, ReportStatus::Investigating)
                .await
                .unwrap()
        );

        let active = query_reports_by_status(db.as_ref(), ReportStatus::Active)
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, b.id);

        let investigating = query_reports_by_status(db.as_ref(), ReportStatus::Investigating)
            .await
            .unwrap();
        assert_eq!(investigating.len(), 1);
        assert_eq!(investigating[0].id, a.id);

        assert!(
            !update_report_status(db.as_ref(), "missing", ReportStatus::Resolved)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn comments_come_back_newest_first_with_author_email() {
        let db = memory_db().await;
        let user = upsert_user(db.as_ref(), "student@example.org", Role::Student)
            .await
            .unwrap();
        let report = insert_report(db.as_ref(), &new_report(&user.id)).await.unwrap();

        for body in ["first", "second"] {
            insert_comment(
                db.as_ref(),
                &NewComment {
                    report_id: report.id.clone(),
                    user_id: user.id.clone(),
                    body: body.to_string(),
                    media_urls: Vec::new(),
                },
            )
            .await
            .unwrap();
            // Distinct timestamps so the DESC ordering is observable.
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let comments = query_comments_by_report(db.as_ref(), &report.id)
            .await
            .unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].body, "second");
        assert_eq!(comments[1].body, "first");
        assert_eq!(
            comments[0].author_email.as_deref(),
            Some("student@example.org")
        );

        assert_eq!(count_comments(db.as_ref(), &report.id).await.unwrap(), 2);
        assert_eq!(count_comments(db.as_ref(), "missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn upsert_user_is_idempotent_on_email() {
        let db = memory_db().await;
        let first = upsert_user(db.as_ref(), "reg@example.org", Role::Regulator)
            .await
            .unwrap();
        let second = upsert_user(db.as_ref(), "reg@example.org", Role::Regulator)
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.role, Role::Regulator);

        let found = get_user_by_email(db.as_ref(), "reg@example.org")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, first.id);
        assert!(
            get_user_by_email(db.as_ref(), "nobody@example.org")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn empty_media_url_list_round_trips() {
        let db = memory_db().await;
        let mut report = new_report("u1");
        report.media_urls = Vec::new();
        let stored = insert_report(db.as_ref(), &report).await.unwrap();

        let fetched = get_report(db.as_ref(), &stored.id).await.unwrap().unwrap();
        assert!(fetched.media_urls.is_empty());
    }
}
