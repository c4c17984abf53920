use crate::database::get_db;
use crate::error::CoreError;

use actix_service::{self, Transform};
use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse},
    Error, HttpMessage,
};
use chrono::Utc;
use futures::{
    future::{ready, LocalBoxFuture, Ready},
    stream::StreamExt,
    FutureExt,
};
use jsonwebtoken::{self, decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mongodb::{
    bson::{doc, from_document, oid::ObjectId, to_bson, DateTime, Document},
    Collection, Database,
};
use pwhash::bcrypt;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs::read_to_string, rc::Rc, str::FromStr};

static mut KEYS: BTreeMap<String, String> = BTreeMap::new();

const ISSUER: &str = "MuniFor";
const ACCESS_AUDIENCE: &str = "munifor-api";
const REFRESH_AUDIENCE: &str = "munifor-refresh";

#[derive(Debug, Serialize, Deserialize)]
struct UserClaims {
    aud: String,
    exp: i64,
    iss: String,
    sub: String,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Citizen,
    Operator,
    Worker,
    Administrator,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
    pub image: Option<UserImage>,
    pub deleted_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct UserImage {
    pub _id: ObjectId,
    pub extension: String,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct UserCredential {
    pub email: String,
    pub password: String,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct UserRefreshRequest {
    pub rtk: String,
}
#[derive(Debug)]
pub struct UserQuery {
    pub role: Option<UserRole>,
    pub email: Option<String>,
    pub limit: Option<usize>,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct UserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<UserRole>,
    pub image: Option<UserImageRequest>,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct UserImageRequest {
    pub extension: String,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct UserResponse {
    pub _id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}
#[derive(Debug)]
pub struct UserAuthenticationData {
    pub _id: Option<ObjectId>,
    pub role: UserRole,
    pub token: String,
}
pub struct UserAuthenticationMiddleware<S> {
    service: Rc<S>,
}
pub struct UserAuthenticationMiddlewareFactory;

pub type UserAuthentication = Rc<UserAuthenticationData>;

impl UserAuthenticationData {
    pub fn permits(&self, roles: &[UserRole]) -> bool {
        roles.contains(&self.role)
    }
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse {
            _id: user._id.map(|_id| _id.to_string()).unwrap_or_default(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

impl User {
    pub async fn save(&mut self) -> Result<ObjectId, CoreError> {
        let db: Database = get_db();
        let collection: Collection<User> = db.collection::<User>("users");

        self._id = Some(ObjectId::new());

        if let Ok(hash) = bcrypt::hash(&self.password) {
            self.password = hash;
            collection
                .insert_one(&*self, None)
                .await
                .map_err(CoreError::store)
                .map(|result| result.inserted_id.as_object_id().unwrap())
        } else {
            Err(CoreError::Store {
                message: "HASHING_FAILED".to_string(),
            })
        }
    }
    pub async fn update(&mut self, update_hash: bool) -> Result<ObjectId, CoreError> {
        let db: Database = get_db();
        let collection: Collection<User> = db.collection::<User>("users");

        if update_hash {
            if let Ok(hash) = bcrypt::hash(&self.password) {
                self.password = hash;
            } else {
                return Err(CoreError::Store {
                    message: "HASHING_FAILED".to_string(),
                });
            }
        }

        self.updated_at = DateTime::now();

        collection
            .update_one(
                doc! { "_id": self._id.unwrap() },
                doc! { "$set": to_bson::<User>(self).unwrap() },
                None,
            )
            .await
            .map_err(CoreError::store)
            .map(|_| self._id.unwrap())
    }
    pub async fn find_many(query: &UserQuery) -> Result<Vec<UserResponse>, CoreError> {
        let db: Database = get_db();
        let collection: Collection<User> = db.collection::<User>("users");

        let mut matches: Document = doc! { "deleted_at": null };
        if let Some(role) = query.role {
            matches.insert("role", to_bson::<UserRole>(&role).unwrap());
        }
        if let Some(email) = &query.email {
            matches.insert("email", email.as_str());
        }

        let mut pipeline: Vec<Document> = vec![doc! { "$match": matches }];
        if let Some(limit) = query.limit {
            pipeline.push(doc! {
                "$limit": to_bson::<usize>(&limit).unwrap()
            });
        }
        pipeline.push(doc! {
            "$project": {
                "_id": { "$toString": "$_id" },
                "name": "$name",
                "email": "$email",
                "role": "$role",
            }
        });

        let mut cursor = collection
            .aggregate(pipeline, None)
            .await
            .map_err(CoreError::store)?;

        let mut users: Vec<UserResponse> = Vec::new();
        while let Some(Ok(doc)) = cursor.next().await {
            let user: UserResponse = from_document::<UserResponse>(doc).unwrap();
            users.push(user);
        }
        Ok(users)
    }
    pub async fn find_by_id(_id: &ObjectId) -> Result<Option<User>, CoreError> {
        let db: Database = get_db();
        let collection: Collection<User> = db.collection::<User>("users");

        collection
            .find_one(doc! { "_id": _id, "deleted_at": null }, None)
            .await
            .map_err(CoreError::store)
    }
    pub async fn find_by_email(email: &String) -> Result<Option<User>, CoreError> {
        let db: Database = get_db();
        let collection: Collection<User> = db.collection::<User>("users");

        collection
            .find_one(doc! { "email": email, "deleted_at": null }, None)
            .await
            .map_err(CoreError::store)
    }
    pub async fn count() -> Result<u64, CoreError> {
        let db: Database = get_db();
        let collection: Collection<User> = db.collection::<User>("users");

        collection
            .count_documents(doc! { "deleted_at": null }, None)
            .await
            .map_err(CoreError::store)
    }
}

fn generate_token(user: &User, audience: &str, lifetime: i64) -> Result<String, String> {
    let claims: UserClaims = UserClaims {
        sub: ObjectId::to_string(&user._id.unwrap()),
        exp: Utc::now().timestamp() + lifetime,
        iss: ISSUER.to_string(),
        aud: audience.to_string(),
    };

    let header: Header = Header::new(Algorithm::RS256);
    unsafe {
        encode(
            &header,
            &claims,
            &EncodingKey::from_rsa_pem(KEYS.get("private_access").unwrap().as_bytes()).unwrap(),
        )
        .map_err(|_| "GENERATING_FAILED".to_string())
    }
}

fn verify_token(token: &str, audience: &str) -> Option<ObjectId> {
    let mut validation: Validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[audience]);
    unsafe {
        if let Ok(data) = decode::<UserClaims>(
            token,
            &DecodingKey::from_rsa_pem(KEYS.get("public_access").unwrap().as_bytes()).unwrap(),
            &validation,
        ) {
            ObjectId::from_str(&data.claims.sub).ok()
        } else {
            None
        }
    }
}

impl UserCredential {
    pub async fn authenticate(&self) -> Result<(String, String, UserResponse), String> {
        if let Ok(Some(user)) = User::find_by_email(&self.email).await {
            if bcrypt::verify(self.password.clone(), &user.password) {
                let atk = generate_token(&user, ACCESS_AUDIENCE, 86400)?;
                let rtk = generate_token(&user, REFRESH_AUDIENCE, 604800)?;
                Ok((atk, rtk, UserResponse::from(&user)))
            } else {
                Err("INVALID_COMBINATION".to_string())
            }
        } else {
            Err("INVALID_COMBINATION".to_string())
        }
    }
    pub async fn refresh(rtk: &str) -> Result<(String, String, UserResponse), String> {
        let _id = match verify_token(rtk, REFRESH_AUDIENCE) {
            Some(_id) => _id,
            None => return Err("INVALID_TOKEN".to_string()),
        };
        if let Ok(Some(user)) = User::find_by_id(&_id).await {
            let atk = generate_token(&user, ACCESS_AUDIENCE, 86400)?;
            let rtk = generate_token(&user, REFRESH_AUDIENCE, 604800)?;
            Ok((atk, rtk, UserResponse::from(&user)))
        } else {
            Err("INVALID_TOKEN".to_string())
        }
    }
    pub fn verify(token: &str) -> Option<ObjectId> {
        verify_token(token, ACCESS_AUDIENCE)
    }
}

impl<S, B> Service<ServiceRequest> for UserAuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    actix_service::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv: Rc<S> = self.service.clone();

        async move {
            let headers: &actix_web::http::header::HeaderMap = req.headers();
            if let Some(bearer_token) = headers.get("Authorization") {
                let mut bytes_token: Vec<u8> = Vec::new();
                for i in bearer_token.as_bytes() {
                    bytes_token.push(*i);
                }
                if bytes_token.len() > 7 {
                    bytes_token.drain(0..7);
                    if let Ok(token) = String::from_utf8(bytes_token) {
                        if let Some(_id) = UserCredential::verify(&token) {
                            if let Ok(Some(user)) = User::find_by_id(&_id).await {
                                let auth_data: UserAuthenticationData = UserAuthenticationData {
                                    _id: Some(_id),
                                    role: user.role,
                                    token,
                                };
                                req.extensions_mut()
                                    .insert::<UserAuthentication>(Rc::new(auth_data));
                            }
                        }
                    }
                }
            }
            let res: ServiceResponse<B> = srv.call(req).await?;
            Ok(res)
        }
        .boxed_local()
    }
}
impl<S, B> Transform<S, ServiceRequest> for UserAuthenticationMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = UserAuthenticationMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(UserAuthenticationMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub fn load_keys() {
    let private_access_file =
        read_to_string("./keys/private_access.key").expect("LOAD_FAILED_PRIVATE_ACCESS");
    let public_access_file =
        read_to_string("./keys/public_access.pem").expect("LOAD_FAILED_PUBLIC_ACCESS");
    unsafe {
        KEYS.insert("private_access".to_string(), private_access_file);
        KEYS.insert("public_access".to_string(), public_access_file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permits_matches_listed_roles_only() {
        let auth = UserAuthenticationData {
            _id: Some(ObjectId::new()),
            role: UserRole::Operator,
            token: String::new(),
        };
        assert!(auth.permits(&[UserRole::Operator, UserRole::Administrator]));
        assert!(!auth.permits(&[UserRole::Citizen]));
        assert!(!auth.permits(&[]));
    }
}
