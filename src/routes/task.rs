use actix_web::{delete, get, post, put, web, HttpMessage, HttpRequest, HttpResponse};
use mongodb::bson::DateTime;
use serde::Deserialize;

use crate::error::error_response;
use crate::models::{
    crew::{Crew, CrewQuery},
    report::{Report, ReportStatus},
    task::{Task, TaskQuery, TaskRequest, TaskResponse, TaskStatus},
    user::{UserAuthentication, UserRole},
};

#[derive(Deserialize)]
pub struct TaskFilterParams {
    pub status: Option<TaskStatus>,
    pub limit: Option<usize>,
}

#[get("/tasks")]
pub async fn get_tasks(query: web::Query<TaskFilterParams>, req: HttpRequest) -> HttpResponse {
    let issuer = match req.extensions().get::<UserAuthentication>().cloned() {
        Some(issuer) => issuer,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };

    if issuer.permits(&[UserRole::Operator, UserRole::Administrator]) {
        let query = TaskQuery {
            crew_id: None,
            status: query.status,
            limit: query.limit,
        };
        return match Task::find_many(&query).await {
            Ok(tasks) => HttpResponse::Ok().json(tasks),
            Err(error) => error_response(&error),
        };
    }

    if !issuer.permits(&[UserRole::Worker]) {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    // Workers see the tasks of the crews they lead.
    let crews = match Crew::find_many(&CrewQuery {
        leader_id: issuer._id,
        limit: None,
    })
    .await
    {
        Ok(crews) => crews,
        Err(error) => return error_response(&error),
    };

    let mut tasks: Vec<TaskResponse> = Vec::new();
    for crew in crews.iter() {
        let crew_id = match crew._id.parse() {
            Ok(crew_id) => Some(crew_id),
            _ => None,
        };
        match Task::find_many(&TaskQuery {
            crew_id,
            status: query.status,
            limit: query.limit,
        })
        .await
        {
            Ok(mut found) => tasks.append(&mut found),
            Err(error) => return error_response(&error),
        }
    }
    HttpResponse::Ok().json(tasks)
}
#[get("/tasks/{task_id}")]
pub async fn get_task(task_id: web::Path<String>, req: HttpRequest) -> HttpResponse {
    if req.extensions().get::<UserAuthentication>().is_none() {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let task_id = match task_id.parse() {
        Ok(task_id) => task_id,
        _ => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    match Task::find_by_id(&task_id).await {
        Ok(Some(task)) => HttpResponse::Ok().json(task),
        Ok(None) => HttpResponse::NotFound().body("TASK_NOT_FOUND"),
        Err(error) => error_response(&error),
    }
}
#[post("/tasks")]
pub async fn create_task(payload: web::Json<TaskRequest>, req: HttpRequest) -> HttpResponse {
    let issuer = match req.extensions().get::<UserAuthentication>().cloned() {
        Some(issuer) => issuer,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };
    if !issuer.permits(&[UserRole::Operator]) {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let payload: TaskRequest = payload.into_inner();

    if payload.report_id.is_empty() {
        return HttpResponse::BadRequest().body("TASK_MUST_HAVE_REPORTS");
    }

    // Only Accepted reports can be grouped into a task.
    for report_id in payload.report_id.iter() {
        match Report::find_by_id(report_id).await {
            Ok(Some(report)) => {
                if report.status != ReportStatus::Accepted {
                    return HttpResponse::BadRequest().body("REPORT_MUST_BE_ACCEPTED");
                }
            }
            Ok(None) => return HttpResponse::NotFound().body("REPORT_NOT_FOUND"),
            Err(error) => return error_response(&error),
        }
    }

    let now = DateTime::now();
    let mut task: Task = Task {
        _id: None,
        title: payload.title,
        crew_id: payload.crew_id,
        report_id: payload.report_id,
        priority: payload.priority,
        status: TaskStatus::Pending,
        kind: payload.kind,
        operator_id: issuer._id.unwrap(),
        location: payload.location,
        deleted_at: None,
        created_at: now,
        updated_at: now,
    };

    match task.save().await {
        Ok(id) => HttpResponse::Created().body(id.to_string()),
        Err(error) => error_response(&error),
    }
}
#[put("/tasks/{task_id}/accept")]
pub async fn accept_task(task_id: web::Path<String>, req: HttpRequest) -> HttpResponse {
    let issuer = match req.extensions().get::<UserAuthentication>().cloned() {
        Some(issuer) => issuer,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };
    if !issuer.permits(&[UserRole::Worker]) {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let task_id = match task_id.parse() {
        Ok(task_id) => task_id,
        _ => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    let mut task = match Task::find_by_id(&task_id).await {
        Ok(Some(task)) => task,
        Ok(None) => return HttpResponse::NotFound().body("TASK_NOT_FOUND"),
        Err(error) => return error_response(&error),
    };

    let crew_id = match task.crew_id {
        Some(crew_id) => crew_id,
        None => return HttpResponse::BadRequest().body("TASK_MUST_HAVE_CREW"),
    };
    match Crew::find_by_id(&crew_id).await {
        Ok(Some(crew)) => {
            if Some(crew.leader_id) != issuer._id {
                return HttpResponse::Unauthorized().body("UNAUTHORIZED");
            }
        }
        Ok(None) => return HttpResponse::NotFound().body("CREW_NOT_FOUND"),
        Err(error) => return error_response(&error),
    }

    match task.accept().await {
        Ok(id) => HttpResponse::Ok().body(id.to_string()),
        Err(error) => error_response(&error),
    }
}
#[delete("/tasks/{task_id}")]
pub async fn delete_task(task_id: web::Path<String>, req: HttpRequest) -> HttpResponse {
    let issuer = match req.extensions().get::<UserAuthentication>().cloned() {
        Some(issuer) => issuer,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };
    if !issuer.permits(&[UserRole::Operator]) {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let task_id = match task_id.parse() {
        Ok(task_id) => task_id,
        _ => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    match Task::delete_by_id(&task_id).await {
        Ok(count) => HttpResponse::Ok().body(format!("Deleted {count} task")),
        Err(error) => error_response(&error),
    }
}
