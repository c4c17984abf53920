use actix_web::HttpResponse;
use mongodb::bson::oid::ObjectId;
use thiserror::Error;

/// Failure modes of the core operations. Routes translate these into HTTP
/// responses; nothing in the core swallows a failed step.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("{entity}_NOT_FOUND")]
    NotFound { entity: &'static str },
    #[error("INVALID_TRANSITION_{from}_TO_{to}")]
    InvalidTransition { from: String, to: String },
    /// The task write succeeded but the report bulk write did not: the store
    /// now violates the completion invariant and needs reconciliation. The
    /// cascade intent document is left in place so a restart can resume it.
    #[error("PARTIAL_CASCADE_FAILURE_TASK_{task_id}")]
    PartialCascadeFailure {
        task_id: ObjectId,
        report_id: Vec<ObjectId>,
    },
    #[error("STORE_UNAVAILABLE")]
    Store { message: String },
}

impl CoreError {
    pub fn not_found(entity: &'static str) -> Self {
        CoreError::NotFound { entity }
    }
    pub fn store(err: mongodb::error::Error) -> Self {
        CoreError::Store {
            message: err.to_string(),
        }
    }
}

/// Maps core failures to responses: missing entities and illegal
/// transitions are 4xx, store trouble is 5xx. The partial-cascade case is
/// logged loudly before it is surfaced.
pub fn error_response(err: &CoreError) -> HttpResponse {
    match err {
        CoreError::NotFound { .. } => HttpResponse::NotFound().body(err.to_string()),
        CoreError::InvalidTransition { .. } => HttpResponse::BadRequest().body(err.to_string()),
        CoreError::PartialCascadeFailure { task_id, report_id } => {
            tracing::error!(
                task_id = %task_id,
                report_id = ?report_id,
                "cascade left task completed with unsynchronized reports"
            );
            HttpResponse::InternalServerError().body(err.to_string())
        }
        CoreError::Store { message } => {
            tracing::warn!(message = %message, "store unavailable");
            HttpResponse::InternalServerError().body(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn not_found_maps_to_404() {
        let response = error_response(&CoreError::not_found("TASK"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_transition_maps_to_400() {
        let err = CoreError::InvalidTransition {
            from: "Pendiente".to_string(),
            to: "Completado".to_string(),
        };
        let response = error_response(&err);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn partial_cascade_maps_to_500() {
        let err = CoreError::PartialCascadeFailure {
            task_id: ObjectId::new(),
            report_id: vec![ObjectId::new()],
        };
        let response = error_response(&err);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn store_failure_maps_to_500_not_404() {
        let err = CoreError::Store {
            message: "connection reset".to_string(),
        };
        let response = error_response(&err);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "STORE_UNAVAILABLE");
    }

    #[test]
    fn error_tags_keep_entity_name() {
        assert_eq!(CoreError::not_found("TASK").to_string(), "TASK_NOT_FOUND");
        assert_eq!(
            CoreError::not_found("REPORT").to_string(),
            "REPORT_NOT_FOUND"
        );
    }
}
