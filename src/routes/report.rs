use actix_web::{delete, get, post, put, web, HttpMessage, HttpRequest, HttpResponse};
use mongodb::bson::DateTime;
use serde::Deserialize;

use crate::error::error_response;
use crate::lifecycle::TransitionActor;
use crate::models::{
    report::{Report, ReportKind, ReportQuery, ReportRequest, ReportStatus, ReportStatusRequest},
    user::{UserAuthentication, UserRole},
};

#[derive(Deserialize)]
pub struct ReportFilterParams {
    pub status: Option<ReportStatus>,
    pub limit: Option<usize>,
}

#[get("/reports")]
pub async fn get_reports(query: web::Query<ReportFilterParams>, req: HttpRequest) -> HttpResponse {
    let issuer = match req.extensions().get::<UserAuthentication>().cloned() {
        Some(issuer) => issuer,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };

    // Citizens only ever see their own reports; operators see everything.
    let author_id = if issuer.permits(&[UserRole::Operator, UserRole::Administrator]) {
        None
    } else if issuer.permits(&[UserRole::Citizen]) {
        issuer._id
    } else {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    };

    let query = ReportQuery {
        status: query.status,
        author_id,
        limit: query.limit,
    };

    match Report::find_many(&query).await {
        Ok(reports) => HttpResponse::Ok().json(reports),
        Err(error) => error_response(&error),
    }
}
#[get("/reports/{report_id}")]
pub async fn get_report(report_id: web::Path<String>, req: HttpRequest) -> HttpResponse {
    let issuer = match req.extensions().get::<UserAuthentication>().cloned() {
        Some(issuer) => issuer,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };

    let report_id = match report_id.parse() {
        Ok(report_id) => report_id,
        _ => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    match Report::find_by_id(&report_id).await {
        Ok(Some(report)) => {
            if issuer.permits(&[UserRole::Citizen]) && Some(report.author_id) != issuer._id {
                return HttpResponse::Unauthorized().body("UNAUTHORIZED");
            }
            HttpResponse::Ok().json(report)
        }
        Ok(None) => HttpResponse::NotFound().body("REPORT_NOT_FOUND"),
        Err(error) => error_response(&error),
    }
}
#[post("/reports")]
pub async fn create_report(payload: web::Json<ReportRequest>, req: HttpRequest) -> HttpResponse {
    let issuer = match req.extensions().get::<UserAuthentication>().cloned() {
        Some(issuer) => issuer,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };
    if !issuer.permits(&[UserRole::Citizen]) {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let payload: ReportRequest = payload.into_inner();

    if payload.kind == ReportKind::Other && payload.other_detail.is_none() {
        return HttpResponse::BadRequest().body("REPORT_MUST_HAVE_OTHER_DETAIL");
    }

    let now = DateTime::now();
    let mut report: Report = Report {
        _id: None,
        title: payload.title,
        description: payload.description,
        status: ReportStatus::Pending,
        author_id: issuer._id.unwrap(),
        operator_id: None,
        location: payload.location,
        kind: payload.kind,
        other_detail: if payload.kind == ReportKind::Other {
            payload.other_detail
        } else {
            None
        },
        image: payload.image.unwrap_or_default(),
        task_assigned: false,
        approved_at: None,
        completed_at: None,
        deleted_at: None,
        created_at: now,
        updated_at: now,
    };

    match report.save().await {
        Ok(id) => HttpResponse::Created().body(id.to_string()),
        Err(error) => error_response(&error),
    }
}
#[put("/reports/{report_id}/status")]
pub async fn update_report_status(
    report_id: web::Path<String>,
    payload: web::Json<ReportStatusRequest>,
    req: HttpRequest,
) -> HttpResponse {
    let issuer = match req.extensions().get::<UserAuthentication>().cloned() {
        Some(issuer) => issuer,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };
    if !issuer.permits(&[UserRole::Operator]) {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let report_id = match report_id.parse() {
        Ok(report_id) => report_id,
        _ => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    let mut report = match Report::find_by_id(&report_id).await {
        Ok(Some(report)) => report,
        Ok(None) => return HttpResponse::NotFound().body("REPORT_NOT_FOUND"),
        Err(error) => return error_response(&error),
    };

    match report
        .transition(payload.status, TransitionActor::Operator, issuer._id)
        .await
    {
        Ok(id) => HttpResponse::Ok().body(id.to_string()),
        Err(error) => error_response(&error),
    }
}
#[delete("/reports/{report_id}")]
pub async fn delete_report(report_id: web::Path<String>, req: HttpRequest) -> HttpResponse {
    let issuer = match req.extensions().get::<UserAuthentication>().cloned() {
        Some(issuer) => issuer,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };

    let report_id = match report_id.parse() {
        Ok(report_id) => report_id,
        _ => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    let mut report = match Report::find_by_id(&report_id).await {
        Ok(Some(report)) => report,
        Ok(None) => return HttpResponse::NotFound().body("REPORT_NOT_FOUND"),
        Err(error) => return error_response(&error),
    };

    // Authors may retract their own report; operators may retire any.
    let is_author = issuer.permits(&[UserRole::Citizen]) && Some(report.author_id) == issuer._id;
    if !is_author && !issuer.permits(&[UserRole::Operator, UserRole::Administrator]) {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    match report.delete().await {
        Ok(id) => HttpResponse::Ok().body(id.to_string()),
        Err(error) => error_response(&error),
    }
}
