use actix_web::{delete, get, post, put, web, HttpMessage, HttpRequest, HttpResponse};
use mongodb::bson::DateTime;

use crate::error::error_response;
use crate::models::{
    crew::{leader_overlaps, Crew, CrewQuery, CrewRequest},
    user::{UserAuthentication, UserRole},
};

#[get("/crews")]
pub async fn get_crews(req: HttpRequest) -> HttpResponse {
    let issuer = match req.extensions().get::<UserAuthentication>().cloned() {
        Some(issuer) => issuer,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };
    if !issuer.permits(&[UserRole::Operator, UserRole::Administrator]) {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let query = CrewQuery {
        leader_id: None,
        limit: None,
    };

    match Crew::find_many(&query).await {
        Ok(crews) => HttpResponse::Ok().json(crews),
        Err(error) => error_response(&error),
    }
}
#[get("/crews/{crew_id}")]
pub async fn get_crew(crew_id: web::Path<String>, req: HttpRequest) -> HttpResponse {
    if req.extensions().get::<UserAuthentication>().is_none() {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let crew_id = match crew_id.parse() {
        Ok(crew_id) => crew_id,
        _ => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    match Crew::find_by_id(&crew_id).await {
        Ok(Some(crew)) => HttpResponse::Ok().json(crew),
        Ok(None) => HttpResponse::NotFound().body("CREW_NOT_FOUND"),
        Err(error) => error_response(&error),
    }
}
#[post("/crews")]
pub async fn create_crew(payload: web::Json<CrewRequest>, req: HttpRequest) -> HttpResponse {
    let issuer = match req.extensions().get::<UserAuthentication>().cloned() {
        Some(issuer) => issuer,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };
    if !issuer.permits(&[UserRole::Operator]) {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let payload: CrewRequest = payload.into_inner();

    if leader_overlaps(&payload.leader_id, &payload.member_id) {
        return HttpResponse::BadRequest().body("CREW_LEADER_MUST_NOT_BE_MEMBER");
    }

    let now = DateTime::now();
    let mut crew: Crew = Crew {
        _id: None,
        name: payload.name,
        leader_id: payload.leader_id,
        member_id: payload.member_id,
        deleted_at: None,
        created_at: now,
        updated_at: now,
    };

    match crew.save().await {
        Ok(id) => HttpResponse::Created().body(id.to_string()),
        Err(error) => error_response(&error),
    }
}
#[put("/crews/{crew_id}")]
pub async fn update_crew(
    crew_id: web::Path<String>,
    payload: web::Json<CrewRequest>,
    req: HttpRequest,
) -> HttpResponse {
    let issuer = match req.extensions().get::<UserAuthentication>().cloned() {
        Some(issuer) => issuer,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };
    if !issuer.permits(&[UserRole::Operator]) {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let crew_id = match crew_id.parse() {
        Ok(crew_id) => crew_id,
        _ => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    let mut crew = match Crew::find_by_id(&crew_id).await {
        Ok(Some(crew)) => crew,
        Ok(None) => return HttpResponse::NotFound().body("CREW_NOT_FOUND"),
        Err(error) => return error_response(&error),
    };

    let payload: CrewRequest = payload.into_inner();

    if leader_overlaps(&payload.leader_id, &payload.member_id) {
        return HttpResponse::BadRequest().body("CREW_LEADER_MUST_NOT_BE_MEMBER");
    }

    crew.name = payload.name;
    crew.leader_id = payload.leader_id;
    crew.member_id = payload.member_id;

    match crew.update().await {
        Ok(id) => HttpResponse::Ok().body(id.to_string()),
        Err(error) => error_response(&error),
    }
}
#[delete("/crews/{crew_id}")]
pub async fn delete_crew(crew_id: web::Path<String>, req: HttpRequest) -> HttpResponse {
    let issuer = match req.extensions().get::<UserAuthentication>().cloned() {
        Some(issuer) => issuer,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };
    if !issuer.permits(&[UserRole::Operator]) {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let crew_id = match crew_id.parse() {
        Ok(crew_id) => crew_id,
        _ => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    let mut crew = match Crew::find_by_id(&crew_id).await {
        Ok(Some(crew)) => crew,
        Ok(None) => return HttpResponse::NotFound().body("CREW_NOT_FOUND"),
        Err(error) => return error_response(&error),
    };

    match crew.delete().await {
        Ok(id) => HttpResponse::Ok().body(id.to_string()),
        Err(error) => error_response(&error),
    }
}
