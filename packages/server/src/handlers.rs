//! HTTP handler functions for the pollution map API.

use actix_web::{HttpResponse, web};
use pollution_map_database::queries;
use pollution_map_report_models::{ReportCategory, ReportStatus};
use pollution_map_server_models::{
    ApiCategory, ApiComment, ApiCommentCount, ApiHealth, ApiReport, ReportQueryParams,
};

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/categories`
///
/// Returns the pollution category taxonomy with display labels.
pub async fn categories() -> HttpResponse {
    let categories: Vec<ApiCategory> = ReportCategory::all()
        .iter()
        .map(|cat| ApiCategory {
            name: cat.to_string(),
            label: cat.label().to_string(),
        })
        .collect();

    HttpResponse::Ok().json(categories)
}

/// `GET /api/reports`
///
/// Lists reports filtered by lifecycle status, newest first. Defaults to
/// `active` when no status is given; an unrecognized status is a 400.
pub async fn reports(
    state: web::Data<AppState>,
    params: web::Query<ReportQueryParams>,
) -> HttpResponse {
    let status = match params.status.as_deref() {
        None => ReportStatus::Active,
        Some(s) => match s.parse() {
            Ok(status) => status,
            Err(_) => {
                return HttpResponse::BadRequest().json(serde_json::json!({
                    "error": format!("Unknown report status: {s}")
                }));
            }
        },
    };

    match queries::query_reports_by_status(state.db.as_ref(), status).await {
        Ok(rows) => {
            let api_reports: Vec<ApiReport> = rows.into_iter().map(ApiReport::from).collect();
            HttpResponse::Ok().json(api_reports)
        }
        Err(e) => {
            log::error!("Failed to query reports: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to query reports"
            }))
        }
    }
}

/// `GET /api/reports/{id}`
///
/// Loads a single report by ID.
pub async fn report_detail(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let id = path.into_inner();

    match queries::get_report(state.db.as_ref(), &id).await {
        Ok(Some(record)) => HttpResponse::Ok().json(ApiReport::from(record)),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "Report not found"
        })),
        Err(e) => {
            log::error!("Failed to load report {id}: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to load report"
            }))
        }
    }
}

/// `GET /api/reports/{id}/comments`
///
/// Lists comments on a report, newest first, with the author's email
/// joined in where the user row still exists.
pub async fn report_comments(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let report_id = path.into_inner();

    match queries::query_comments_by_report(state.db.as_ref(), &report_id).await {
        Ok(rows) => {
            let api_comments: Vec<ApiComment> = rows.into_iter().map(ApiComment::from).collect();
            HttpResponse::Ok().json(api_comments)
        }
        Err(e) => {
            log::error!("Failed to query comments for report {report_id}: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to query comments"
            }))
        }
    }
}

/// `GET /api/reports/{id}/comments/count`
pub async fn report_comment_count(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let report_id = path.into_inner();

    match queries::count_comments(state.db.as_ref(), &report_id).await {
        Ok(count) => HttpResponse::Ok().json(ApiCommentCount { count }),
        Err(e) => {
            log::error!("Failed to count comments for report {report_id}: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to count comments"
            }))
        }
    }
}
