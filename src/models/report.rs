use crate::database::get_db;
use crate::error::CoreError;
use crate::lifecycle::{self, TransitionActor};

use futures::StreamExt;
use mongodb::{
    bson::{doc, from_document, oid::ObjectId, to_bson, DateTime, Document},
    Collection, Database,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::GeoPoint;

/// Persisted status tags. The UI consumes these verbatim, so the literals
/// must not change even if the variant names do.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum ReportStatus {
    #[serde(rename = "Pendiente")]
    Pending,
    #[serde(rename = "Revisado")]
    Reviewed,
    #[serde(rename = "Aceptado")]
    Accepted,
    #[serde(rename = "Completado")]
    Completed,
    #[serde(rename = "Rechazado")]
    Rejected,
}

impl ReportStatus {
    pub fn as_tag(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "Pendiente",
            ReportStatus::Reviewed => "Revisado",
            ReportStatus::Accepted => "Aceptado",
            ReportStatus::Completed => "Completado",
            ReportStatus::Rejected => "Rechazado",
        }
    }
}
impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Pothole,
    Lighting,
    Trash,
    Other,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Report {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub title: String,
    pub description: String,
    pub status: ReportStatus,
    pub author_id: ObjectId,
    pub operator_id: Option<ObjectId>,
    pub location: GeoPoint,
    pub kind: ReportKind,
    pub other_detail: Option<String>,
    pub image: Vec<String>,
    pub task_assigned: bool,
    pub approved_at: Option<DateTime>,
    pub completed_at: Option<DateTime>,
    pub deleted_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}
#[derive(Debug)]
pub struct ReportQuery {
    pub status: Option<ReportStatus>,
    pub author_id: Option<ObjectId>,
    pub limit: Option<usize>,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct ReportRequest {
    pub title: String,
    pub description: String,
    pub location: GeoPoint,
    pub kind: ReportKind,
    pub other_detail: Option<String>,
    pub image: Option<Vec<String>>,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct ReportStatusRequest {
    pub status: ReportStatus,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct ReportResponse {
    pub _id: String,
    pub title: String,
    pub description: String,
    pub status: ReportStatus,
    pub author_id: String,
    pub operator_id: Option<String>,
    pub kind: ReportKind,
    pub task_assigned: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct ReportStatusCount {
    pub _id: ReportStatus,
    pub count: i64,
}

/// Match condition of the cascade's bulk completion: terminal reports are
/// never overwritten, whatever the task's report list says.
pub(crate) fn completion_filter(report_id: &[ObjectId]) -> Document {
    doc! {
        "_id": { "$in": report_id },
        "status": {
            "$nin": [
                ReportStatus::Completed.as_tag(),
                ReportStatus::Rejected.as_tag(),
            ]
        },
        "deleted_at": null,
    }
}

/// Match condition of the staleness sweep: only Reviewed reports whose last
/// update is at or before the cutoff. Selection is by current status, so
/// re-running within the same interval is a no-op.
pub(crate) fn stale_filter(cutoff: DateTime) -> Document {
    doc! {
        "status": ReportStatus::Reviewed.as_tag(),
        "updated_at": { "$lte": cutoff },
        "deleted_at": null,
    }
}

impl Report {
    pub async fn save(&mut self) -> Result<ObjectId, CoreError> {
        let db: Database = get_db();
        let collection: Collection<Report> = db.collection::<Report>("reports");

        self._id = Some(ObjectId::new());

        collection
            .insert_one(&*self, None)
            .await
            .map_err(CoreError::store)
            .map(|result| result.inserted_id.as_object_id().unwrap())
    }
    /// Central status mutation: validates the edge, stamps the side-effect
    /// timestamps and records the reviewing operator.
    pub async fn transition(
        &mut self,
        requested: ReportStatus,
        actor: TransitionActor,
        operator_id: Option<ObjectId>,
    ) -> Result<ObjectId, CoreError> {
        let effects = lifecycle::report_transition(self.status, requested, actor)?;

        let now = DateTime::now();
        self.status = requested;
        self.updated_at = now;
        if effects.stamp_approved_at {
            self.approved_at = Some(now);
        }
        if effects.stamp_completed_at {
            self.completed_at = Some(now);
        }
        if requested == ReportStatus::Reviewed {
            self.operator_id = operator_id;
        }

        let db: Database = get_db();
        let collection: Collection<Report> = db.collection::<Report>("reports");

        collection
            .update_one(
                doc! { "_id": self._id.unwrap() },
                doc! { "$set": to_bson::<Report>(self).unwrap() },
                None,
            )
            .await
            .map_err(CoreError::store)
            .map(|_| self._id.unwrap())
    }
    /// Bulk completion used by the cascade engine. Zero matches is not an
    /// error: the task's report list may reference terminal reports.
    pub async fn complete_many(report_id: &[ObjectId], now: DateTime) -> Result<u64, CoreError> {
        lifecycle::report_transition(
            ReportStatus::Accepted,
            ReportStatus::Completed,
            TransitionActor::System,
        )?;

        let db: Database = get_db();
        let collection: Collection<Report> = db.collection::<Report>("reports");

        collection
            .update_many(
                completion_filter(report_id),
                doc! {
                    "$set": {
                        "status": ReportStatus::Completed.as_tag(),
                        "completed_at": now,
                        "updated_at": now,
                    }
                },
                None,
            )
            .await
            .map_err(CoreError::store)
            .map(|result| result.modified_count)
    }
    /// Bulk rejection used by the staleness sweep. Only the status changes;
    /// the schema has no rejection timestamp.
    pub async fn reject_stale(cutoff: DateTime) -> Result<u64, CoreError> {
        lifecycle::report_transition(
            ReportStatus::Reviewed,
            ReportStatus::Rejected,
            TransitionActor::System,
        )?;

        let db: Database = get_db();
        let collection: Collection<Report> = db.collection::<Report>("reports");

        collection
            .update_many(
                stale_filter(cutoff),
                doc! { "$set": { "status": ReportStatus::Rejected.as_tag() } },
                None,
            )
            .await
            .map_err(CoreError::store)
            .map(|result| result.modified_count)
    }
    pub async fn mark_task_assigned(
        report_id: &[ObjectId],
        assigned: bool,
    ) -> Result<u64, CoreError> {
        let db: Database = get_db();
        let collection: Collection<Report> = db.collection::<Report>("reports");

        collection
            .update_many(
                doc! { "_id": { "$in": report_id } },
                doc! {
                    "$set": {
                        "task_assigned": assigned,
                        "updated_at": DateTime::now(),
                    }
                },
                None,
            )
            .await
            .map_err(CoreError::store)
            .map(|result| result.modified_count)
    }
    pub async fn find_by_id(_id: &ObjectId) -> Result<Option<Report>, CoreError> {
        let db: Database = get_db();
        let collection: Collection<Report> = db.collection::<Report>("reports");

        collection
            .find_one(doc! { "_id": _id, "deleted_at": null }, None)
            .await
            .map_err(CoreError::store)
    }
    pub async fn find_many(query: &ReportQuery) -> Result<Vec<ReportResponse>, CoreError> {
        let db: Database = get_db();
        let collection: Collection<Report> = db.collection::<Report>("reports");

        let mut matches: Document = doc! { "deleted_at": null };
        if let Some(status) = query.status {
            matches.insert("status", status.as_tag());
        }
        if let Some(author_id) = query.author_id {
            matches.insert("author_id", author_id);
        }

        let mut pipeline: Vec<Document> = vec![
            doc! { "$match": matches },
            doc! { "$sort": { "created_at": -1 } },
        ];
        if let Some(limit) = query.limit {
            pipeline.push(doc! {
                "$limit": to_bson::<usize>(&limit).unwrap()
            });
        }
        pipeline.push(doc! {
            "$project": {
                "_id": { "$toString": "$_id" },
                "title": "$title",
                "description": "$description",
                "status": "$status",
                "author_id": { "$toString": "$author_id" },
                "operator_id": { "$toString": "$operator_id" },
                "kind": "$kind",
                "task_assigned": "$task_assigned",
                "created_at": "$created_at",
                "updated_at": "$updated_at",
            }
        });

        let mut cursor = collection
            .aggregate(pipeline, None)
            .await
            .map_err(CoreError::store)?;

        let mut reports: Vec<ReportResponse> = Vec::new();
        while let Some(Ok(doc)) = cursor.next().await {
            let report: ReportResponse = from_document::<ReportResponse>(doc).unwrap();
            reports.push(report);
        }
        Ok(reports)
    }
    pub async fn count_by_status() -> Result<Vec<ReportStatusCount>, CoreError> {
        let db: Database = get_db();
        let collection: Collection<Report> = db.collection::<Report>("reports");

        let pipeline: Vec<Document> = vec![
            doc! { "$match": { "deleted_at": null } },
            doc! { "$group": { "_id": "$status", "count": { "$sum": 1 } } },
        ];

        let mut cursor = collection
            .aggregate(pipeline, None)
            .await
            .map_err(CoreError::store)?;

        let mut counts: Vec<ReportStatusCount> = Vec::new();
        while let Some(Ok(doc)) = cursor.next().await {
            let count: ReportStatusCount = from_document::<ReportStatusCount>(doc).unwrap();
            counts.push(count);
        }
        Ok(counts)
    }
    pub async fn delete(&mut self) -> Result<ObjectId, CoreError> {
        let now = DateTime::now();
        self.deleted_at = Some(now);
        self.updated_at = now;

        let db: Database = get_db();
        let collection: Collection<Report> = db.collection::<Report>("reports");

        collection
            .update_one(
                doc! { "_id": self._id.unwrap() },
                doc! { "$set": to_bson::<Report>(self).unwrap() },
                None,
            )
            .await
            .map_err(CoreError::store)
            .map(|_| self._id.unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::Bson;

    #[test]
    fn status_tags_match_persisted_literals() {
        assert_eq!(
            to_bson(&ReportStatus::Pending).unwrap(),
            Bson::String("Pendiente".to_string())
        );
        assert_eq!(
            to_bson(&ReportStatus::Reviewed).unwrap(),
            Bson::String("Revisado".to_string())
        );
        assert_eq!(
            to_bson(&ReportStatus::Accepted).unwrap(),
            Bson::String("Aceptado".to_string())
        );
        assert_eq!(
            to_bson(&ReportStatus::Completed).unwrap(),
            Bson::String("Completado".to_string())
        );
        assert_eq!(
            to_bson(&ReportStatus::Rejected).unwrap(),
            Bson::String("Rechazado".to_string())
        );
        for status in [
            ReportStatus::Pending,
            ReportStatus::Reviewed,
            ReportStatus::Accepted,
            ReportStatus::Completed,
            ReportStatus::Rejected,
        ] {
            assert_eq!(
                to_bson(&status).unwrap(),
                Bson::String(status.as_tag().to_string())
            );
        }
    }

    #[test]
    fn completion_filter_spares_terminal_reports() {
        let ids = vec![ObjectId::new(), ObjectId::new()];
        let filter = completion_filter(&ids);

        let status = filter.get_document("status").unwrap();
        let excluded = status.get_array("$nin").unwrap();
        assert!(excluded.contains(&Bson::String("Completado".to_string())));
        assert!(excluded.contains(&Bson::String("Rechazado".to_string())));

        let matched = filter.get_document("_id").unwrap().get_array("$in").unwrap();
        assert_eq!(matched.len(), 2);
    }

    #[test]
    fn stale_filter_selects_reviewed_at_or_before_cutoff() {
        let cutoff = DateTime::from_millis(1_700_000_000_000);
        let filter = stale_filter(cutoff);

        assert_eq!(filter.get_str("status").unwrap(), "Revisado");
        assert_eq!(
            filter.get_document("updated_at").unwrap().get("$lte"),
            Some(&Bson::DateTime(cutoff))
        );
        assert_eq!(filter.get("deleted_at"), Some(&Bson::Null));
    }
}
