use actix_web::{get, HttpMessage, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::error::error_response;
use crate::models::{
    crew::Crew,
    report::{Report, ReportStatusCount},
    task::{Task, TaskStatusCount},
    user::{User, UserAuthentication, UserRole},
};

#[derive(Debug, Deserialize, Serialize)]
pub struct DashboardResponse {
    pub report: Vec<ReportStatusCount>,
    pub task: Vec<TaskStatusCount>,
    pub crew_count: u64,
    pub user_count: u64,
}

#[get("/dashboard")]
pub async fn get_dashboard(req: HttpRequest) -> HttpResponse {
    let issuer = match req.extensions().get::<UserAuthentication>().cloned() {
        Some(issuer) => issuer,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };
    if !issuer.permits(&[UserRole::Operator, UserRole::Administrator]) {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let report = match Report::count_by_status().await {
        Ok(report) => report,
        Err(error) => return error_response(&error),
    };
    let task = match Task::count_by_status().await {
        Ok(task) => task,
        Err(error) => return error_response(&error),
    };
    let crew_count = match Crew::count().await {
        Ok(count) => count,
        Err(error) => return error_response(&error),
    };
    let user_count = match User::count().await {
        Ok(count) => count,
        Err(error) => return error_response(&error),
    };

    HttpResponse::Ok().json(DashboardResponse {
        report,
        task,
        crew_count,
        user_count,
    })
}
