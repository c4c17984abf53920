use std::{
    fs::{create_dir_all, remove_dir_all, rename},
    path::PathBuf,
};

use actix_multipart::form::MultipartForm;
use actix_multipart::form::tempfile::TempFile;
use actix_web::{get, post, put, web, HttpMessage, HttpRequest, HttpResponse};
use mime_guess::get_mime_extensions_str;
use mongodb::bson::{doc, oid::ObjectId, to_bson, DateTime};
use regex::Regex;

use crate::error::error_response;
use crate::models::user::{
    User, UserAuthentication, UserCredential, UserImage, UserQuery, UserRefreshRequest,
    UserRequest, UserResponse, UserRole,
};

#[derive(Debug, MultipartForm)]
pub struct UserImageMultipartRequest {
    #[multipart(rename = "file")]
    pub file: TempFile,
}

#[get("/users")]
pub async fn get_users(req: HttpRequest) -> HttpResponse {
    let issuer = match req.extensions().get::<UserAuthentication>().cloned() {
        Some(issuer) => issuer,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };
    if !issuer.permits(&[UserRole::Operator, UserRole::Administrator]) {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    let query: UserQuery = UserQuery {
        role: None,
        email: None,
        limit: None,
    };

    match User::find_many(&query).await {
        Ok(users) => HttpResponse::Ok().json(users),
        Err(error) => error_response(&error),
    }
}
#[get("/users/{user_id}")]
pub async fn get_user(user_id: web::Path<String>, req: HttpRequest) -> HttpResponse {
    let issuer = match req.extensions().get::<UserAuthentication>().cloned() {
        Some(issuer) => issuer,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };

    let user_id = match user_id.parse() {
        Ok(user_id) => user_id,
        Err(_) => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    if issuer._id != Some(user_id)
        && !issuer.permits(&[UserRole::Operator, UserRole::Administrator])
    {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    match User::find_by_id(&user_id).await {
        Ok(Some(user)) => HttpResponse::Ok().json(UserResponse::from(&user)),
        Ok(None) => HttpResponse::NotFound().body("USER_NOT_FOUND"),
        Err(error) => error_response(&error),
    }
}
#[post("/users")]
pub async fn create_user(payload: web::Json<UserRequest>, req: HttpRequest) -> HttpResponse {
    let payload: UserRequest = payload.into_inner();
    let email_regex: Regex = Regex::new(
        r"^([a-z0-9_+]([a-z0-9_+.]*[a-z0-9_+])?)@([a-z0-9]+([\-\.]{1}[a-z0-9]+)*\.[a-z]{2,6})",
    )
    .unwrap();

    if payload.password.len() < 8 {
        return HttpResponse::BadRequest().body("USER_MUST_HAVE_VALID_PASSWORD");
    }
    if !email_regex.is_match(&payload.email) {
        return HttpResponse::BadRequest().body("USER_MUST_HAVE_VALID_EMAIL");
    }

    let user_count = match User::count().await {
        Ok(count) => count,
        Err(error) => return error_response(&error),
    };

    // The first account bootstraps as administrator; citizens self-register;
    // anything else takes an operator or administrator issuer.
    let role = if user_count == 0 {
        UserRole::Administrator
    } else {
        let requested = payload.role.unwrap_or(UserRole::Citizen);
        if requested != UserRole::Citizen {
            let issuer = match req.extensions().get::<UserAuthentication>().cloned() {
                Some(issuer) => issuer,
                None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
            };
            if !issuer.permits(&[UserRole::Operator, UserRole::Administrator]) {
                return HttpResponse::Unauthorized().body("UNAUTHORIZED");
            }
        }
        requested
    };

    let now = DateTime::now();
    let mut user: User = User {
        _id: None,
        name: payload.name,
        email: payload.email,
        password: payload.password,
        role,
        image: None,
        deleted_at: None,
        created_at: now,
        updated_at: now,
    };

    if let Ok(Some(_)) = User::find_by_email(&user.email).await {
        HttpResponse::BadRequest().body("USER_ALREADY_EXIST")
    } else {
        match user.save().await {
            Ok(id) => HttpResponse::Created().body(id.to_string()),
            Err(error) => error_response(&error),
        }
    }
}
#[put("/users/{user_id}")]
pub async fn update_user(
    user_id: web::Path<String>,
    payload: web::Json<UserRequest>,
    req: HttpRequest,
) -> HttpResponse {
    let issuer = match req.extensions().get::<UserAuthentication>().cloned() {
        Some(issuer) => issuer,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };

    let user_id = match user_id.parse() {
        Ok(user_id) => user_id,
        _ => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    if issuer._id != Some(user_id) && !issuer.permits(&[UserRole::Administrator]) {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    if let Ok(Some(user)) = User::find_by_id(&user_id).await {
        let payload: UserRequest = payload.into_inner();
        let mut update_hash = false;

        if user.image.is_some() {
            let old_path = format!("./files/users/{user_id}");
            match remove_dir_all(old_path) {
                _ => (),
            };
        }

        let mut user = User {
            _id: Some(user_id),
            name: payload.name,
            email: payload.email,
            password: user.password,
            role: user.role,
            image: None,
            deleted_at: user.deleted_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
        };

        if payload.password != *"*" {
            update_hash = true;
            user.password = payload.password;
        }

        if let Some(image) = payload.image {
            user.image = Some(UserImage {
                _id: ObjectId::new(),
                extension: image.extension,
            });
        }

        return match user.update(update_hash).await {
            Ok(user_id) => HttpResponse::Ok().body(user_id.to_string()),
            Err(error) => error_response(&error),
        };
    } else {
        HttpResponse::NotFound().body("USER_NOT_FOUND")
    }
}
#[put("/users/{user_id}/image")]
pub async fn update_user_image(
    user_id: web::Path<String>,
    form: MultipartForm<UserImageMultipartRequest>,
    req: HttpRequest,
) -> HttpResponse {
    let issuer = match req.extensions().get::<UserAuthentication>().cloned() {
        Some(issuer) => issuer,
        None => return HttpResponse::Unauthorized().body("UNAUTHORIZED"),
    };

    let user_id = match user_id.parse() {
        Ok(user_id) => user_id,
        _ => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    if issuer._id != Some(user_id) && !issuer.permits(&[UserRole::Administrator]) {
        return HttpResponse::Unauthorized().body("UNAUTHORIZED");
    }

    if let Ok(Some(mut user)) = User::find_by_id(&user_id).await {
        let image = match &user.image {
            Some(image) => image,
            None => return HttpResponse::BadRequest().body("USER_IMAGE_NOT_FOUND"),
        };

        let save_dir = format!("./files/users/{}/", user_id);

        if create_dir_all(&save_dir).is_err() {
            return HttpResponse::InternalServerError().body("DIRECTORY_CREATION_FAILED");
        }

        if let Some(ext) = get_mime_extensions_str(&image.extension) {
            let ext = *ext.first().unwrap();
            let file_path_temp = form.file.file.path();
            let file_path = PathBuf::from(save_dir.to_owned() + &image._id.to_string() + "." + ext);
            if rename(file_path_temp, &file_path).is_ok() {
                user.image = Some(UserImage {
                    _id: image._id,
                    extension: ext.to_string(),
                });

                match user.update(false).await {
                    Ok(user_id) => HttpResponse::Ok().body(user_id.to_string()),
                    Err(error) => {
                        user.image = None;
                        if user.update(false).await.is_err() {
                            HttpResponse::InternalServerError().body("USER_IMAGE_DELETION_FAILED")
                        } else {
                            error_response(&error)
                        }
                    }
                }
            } else {
                user.image = None;
                if user.update(false).await.is_err() {
                    HttpResponse::InternalServerError().body("USER_IMAGE_DELETION_FAILED")
                } else {
                    match remove_dir_all(file_path) {
                        _ => HttpResponse::InternalServerError().body("USER_IMAGE_RENAME_FAILED"),
                    }
                }
            }
        } else {
            user.image = None;
            if user.update(false).await.is_err() {
                HttpResponse::InternalServerError().body("USER_IMAGE_DELETION_FAILED")
            } else {
                HttpResponse::InternalServerError().body("USER_IMAGE_INVALID_MIME")
            }
        }
    } else {
        HttpResponse::NotFound().body("USER_NOT_FOUND")
    }
}
#[post("/users/login")]
pub async fn login(payload: web::Json<UserCredential>) -> HttpResponse {
    let payload: UserCredential = payload.into_inner();

    match payload.authenticate().await {
        Ok((atk, rtk, user)) => HttpResponse::Ok().json(doc! {
            "atk": to_bson::<String>(&atk).unwrap(),
            "rtk": to_bson::<String>(&rtk).unwrap(),
            "user": to_bson::<UserResponse>(&user).unwrap()
        }),
        Err(error) => HttpResponse::Unauthorized().body(error),
    }
}
#[post("/users/refresh")]
pub async fn refresh(payload: web::Json<UserRefreshRequest>) -> HttpResponse {
    let payload: UserRefreshRequest = payload.into_inner();

    match UserCredential::refresh(&payload.rtk).await {
        Ok((atk, rtk, user)) => HttpResponse::Ok().json(doc! {
            "atk": to_bson::<String>(&atk).unwrap(),
            "rtk": to_bson::<String>(&rtk).unwrap(),
            "user": to_bson::<UserResponse>(&user).unwrap()
        }),
        Err(error) => HttpResponse::Unauthorized().body(error),
    }
}
