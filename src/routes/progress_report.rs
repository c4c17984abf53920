use actix_web::{delete, get, post, put, web, HttpMessage, HttpRequest, HttpResponse};
use mongodb::bson::{oid::ObjectId, DateTime};
use serde::Deserialize;

use crate::cascade;
use crate::error::error_response;
use crate::models::{
    crew::Crew,
    progress_report::{
        ProgressReport, ProgressReportQuery, ProgressReportRequest, ProgressReportUpdateRequest,
        ProgressStatus,
    },
    task::Task,
    user::{UserAuthentication, UserRole},
};

#[derive(Deserialize)]
pub struct ProgressFilterParams {
    pub task_id: Option<String>,
    pub crew_id: Option<String>,
    pub limit: Option<usize>,
}

#[get("/progress-reports")]
pub async fn get_progress_reports(
    query: web::Query<ProgressFilterParams>,
    req: HttpRequest,
) -> HttpResponse {
    let issuer = match req.extensions().get::<UserAuthentication>().cloned() {
        Some(issuer) => issuer,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };
    if !issuer.permits(&[UserRole::Worker, UserRole::Operator, UserRole::Administrator]) {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let task_id = match &query.task_id {
        Some(task_id) => match ObjectId::parse_str(task_id) {
            Ok(task_id) => Some(task_id),
            _ => return HttpResponse::BadRequest().body("INVALID_ID"),
        },
        None => None,
    };
    let crew_id = match &query.crew_id {
        Some(crew_id) => match ObjectId::parse_str(crew_id) {
            Ok(crew_id) => Some(crew_id),
            _ => return HttpResponse::BadRequest().body("INVALID_ID"),
        },
        None => None,
    };

    let query = ProgressReportQuery {
        task_id,
        crew_id,
        limit: query.limit,
    };

    match ProgressReport::find_many(&query).await {
        Ok(entries) => HttpResponse::Ok().json(entries),
        Err(error) => error_response(&error),
    }
}
#[post("/progress-reports")]
pub async fn create_progress_report(
    payload: web::Json<ProgressReportRequest>,
    req: HttpRequest,
) -> HttpResponse {
    let issuer = match req.extensions().get::<UserAuthentication>().cloned() {
        Some(issuer) => issuer,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };
    if !issuer.permits(&[UserRole::Worker]) {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let payload: ProgressReportRequest = payload.into_inner();

    let task = match Task::find_by_id(&payload.task_id).await {
        Ok(Some(task)) => task,
        Ok(None) => return HttpResponse::NotFound().body("TASK_NOT_FOUND"),
        Err(error) => return error_response(&error),
    };
    if task.crew_id != Some(payload.crew_id) {
        return HttpResponse::BadRequest().body("TASK_NOT_ASSIGNED_TO_CREW");
    }

    // Only the crew leader logs progress.
    match Crew::find_by_id(&payload.crew_id).await {
        Ok(Some(crew)) => {
            if Some(crew.leader_id) != issuer._id {
                return HttpResponse::Unauthorized().body("UNAUTHORIZED");
            }
        }
        Ok(None) => return HttpResponse::NotFound().body("CREW_NOT_FOUND"),
        Err(error) => return error_response(&error),
    }

    let status = payload.status.unwrap_or(ProgressStatus::Pending);
    // A terminal entry must find its task En Progreso, or the entry would
    // persist with a cascade it can never run.
    if status == ProgressStatus::Completed && !cascade::task_ready_for_completion(task.status) {
        return HttpResponse::BadRequest().body("TASK_MUST_BE_IN_PROGRESS");
    }

    let now = DateTime::now();
    let mut progress: ProgressReport = ProgressReport {
        _id: None,
        title: payload.title,
        description: payload.description,
        worker_id: issuer._id.unwrap(),
        crew_id: payload.crew_id,
        task_id: payload.task_id,
        status,
        image: payload.image.unwrap_or_default(),
        location: payload.location,
        deleted_at: None,
        created_at: now,
        updated_at: now,
    };

    let _id = match progress.save().await {
        Ok(_id) => _id,
        Err(error) => return error_response(&error),
    };

    // A terminal entry completes the task and its reports before we answer.
    match cascade::apply_progress_completion(&progress).await {
        Ok(_) => HttpResponse::Created().body(_id.to_string()),
        Err(error) => error_response(&error),
    }
}
#[put("/progress-reports/{progress_id}")]
pub async fn update_progress_report(
    progress_id: web::Path<String>,
    payload: web::Json<ProgressReportUpdateRequest>,
    req: HttpRequest,
) -> HttpResponse {
    let issuer = match req.extensions().get::<UserAuthentication>().cloned() {
        Some(issuer) => issuer,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };
    if !issuer.permits(&[UserRole::Worker]) {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let progress_id = match progress_id.parse() {
        Ok(progress_id) => progress_id,
        _ => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    let mut progress = match ProgressReport::find_by_id(&progress_id).await {
        Ok(Some(progress)) => progress,
        Ok(None) => return HttpResponse::NotFound().body("PROGRESS_REPORT_NOT_FOUND"),
        Err(error) => return error_response(&error),
    };
    if Some(progress.worker_id) != issuer._id {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let payload: ProgressReportUpdateRequest = payload.into_inner();

    // Same guard as creation: do not let a terminal entry land while its
    // task cannot legally complete.
    if payload.status == Some(ProgressStatus::Completed)
        && progress.status != ProgressStatus::Completed
    {
        match Task::find_by_id(&progress.task_id).await {
            Ok(Some(task)) => {
                if !cascade::task_ready_for_completion(task.status) {
                    return HttpResponse::BadRequest().body("TASK_MUST_BE_IN_PROGRESS");
                }
            }
            Ok(None) => return HttpResponse::NotFound().body("TASK_NOT_FOUND"),
            Err(error) => return error_response(&error),
        }
    }

    if let Some(title) = payload.title {
        progress.title = title;
    }
    if let Some(description) = payload.description {
        progress.description = description;
    }
    if let Some(image) = payload.image {
        progress.image = image;
    }

    let fire_cascade = match payload.status {
        Some(requested) => match progress.update_status(requested).await {
            Ok(effects) => effects.fire_cascade,
            Err(error) => return error_response(&error),
        },
        None => match progress.update().await {
            Ok(_) => false,
            Err(error) => return error_response(&error),
        },
    };

    if fire_cascade {
        if let Err(error) = cascade::apply_progress_completion(&progress).await {
            return error_response(&error);
        }
    }

    HttpResponse::Ok().body(progress_id.to_string())
}
#[delete("/progress-reports/{progress_id}")]
pub async fn delete_progress_report(
    progress_id: web::Path<String>,
    req: HttpRequest,
) -> HttpResponse {
    let issuer = match req.extensions().get::<UserAuthentication>().cloned() {
        Some(issuer) => issuer,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };

    let progress_id = match progress_id.parse() {
        Ok(progress_id) => progress_id,
        _ => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    let mut progress = match ProgressReport::find_by_id(&progress_id).await {
        Ok(Some(progress)) => progress,
        Ok(None) => return HttpResponse::NotFound().body("PROGRESS_REPORT_NOT_FOUND"),
        Err(error) => return error_response(&error),
    };

    let is_author = issuer.permits(&[UserRole::Worker]) && Some(progress.worker_id) == issuer._id;
    if !is_author && !issuer.permits(&[UserRole::Operator, UserRole::Administrator]) {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    match progress.delete().await {
        Ok(id) => HttpResponse::Ok().body(id.to_string()),
        Err(error) => error_response(&error),
    }
}
