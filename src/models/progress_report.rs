use crate::database::get_db;
use crate::error::CoreError;
use crate::lifecycle::{self, TransitionEffects};

use futures::StreamExt;
use mongodb::{
    bson::{doc, from_document, oid::ObjectId, to_bson, DateTime, Document},
    Collection, Database,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{task::Task, GeoPoint};

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum ProgressStatus {
    #[serde(rename = "Pendiente")]
    Pending,
    #[serde(rename = "En Progreso")]
    InProgress,
    #[serde(rename = "Finalizado")]
    Completed,
}

impl ProgressStatus {
    pub fn as_tag(&self) -> &'static str {
        match self {
            ProgressStatus::Pending => "Pendiente",
            ProgressStatus::InProgress => "En Progreso",
            ProgressStatus::Completed => "Finalizado",
        }
    }
    /// Position along the monotonic Pending → InProgress → Completed chain.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            ProgressStatus::Pending => 0,
            ProgressStatus::InProgress => 1,
            ProgressStatus::Completed => 2,
        }
    }
}
impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ProgressReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub title: String,
    pub description: String,
    pub worker_id: ObjectId,
    pub crew_id: ObjectId,
    pub task_id: ObjectId,
    pub status: ProgressStatus,
    pub image: Vec<String>,
    pub location: GeoPoint,
    pub deleted_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}
#[derive(Debug)]
pub struct ProgressReportQuery {
    pub task_id: Option<ObjectId>,
    pub crew_id: Option<ObjectId>,
    pub limit: Option<usize>,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct ProgressReportRequest {
    pub title: String,
    pub description: String,
    pub crew_id: ObjectId,
    pub task_id: ObjectId,
    pub status: Option<ProgressStatus>,
    pub image: Option<Vec<String>>,
    pub location: GeoPoint,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct ProgressReportUpdateRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProgressStatus>,
    pub image: Option<Vec<String>>,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct ProgressReportResponse {
    pub _id: String,
    pub title: String,
    pub description: String,
    pub worker_id: String,
    pub crew_id: String,
    pub task_id: String,
    pub status: ProgressStatus,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl ProgressReport {
    /// Inserting requires the referenced task to exist; the caller fires the
    /// cascade afterwards when the entry is already terminal.
    pub async fn save(&mut self) -> Result<ObjectId, CoreError> {
        let db: Database = get_db();
        let collection: Collection<ProgressReport> =
            db.collection::<ProgressReport>("progress-reports");

        if !matches!(Task::find_by_id(&self.task_id).await, Ok(Some(_))) {
            return Err(CoreError::not_found("TASK"));
        }

        self._id = Some(ObjectId::new());

        collection
            .insert_one(&*self, None)
            .await
            .map_err(CoreError::store)
            .map(|result| result.inserted_id.as_object_id().unwrap())
    }
    /// Validated forward move along the progress chain. Returns the effects
    /// so the caller knows whether the cascade must fire.
    pub async fn update_status(
        &mut self,
        requested: ProgressStatus,
    ) -> Result<TransitionEffects, CoreError> {
        let effects = lifecycle::progress_transition(self.status, requested)?;

        self.status = requested;
        self.updated_at = DateTime::now();

        self.update().await?;

        Ok(effects)
    }
    pub async fn update(&self) -> Result<ObjectId, CoreError> {
        let db: Database = get_db();
        let collection: Collection<ProgressReport> =
            db.collection::<ProgressReport>("progress-reports");

        collection
            .update_one(
                doc! { "_id": self._id.unwrap() },
                doc! { "$set": to_bson::<ProgressReport>(self).unwrap() },
                None,
            )
            .await
            .map_err(CoreError::store)
            .map(|_| self._id.unwrap())
    }
    pub async fn find_by_id(_id: &ObjectId) -> Result<Option<ProgressReport>, CoreError> {
        let db: Database = get_db();
        let collection: Collection<ProgressReport> =
            db.collection::<ProgressReport>("progress-reports");

        collection
            .find_one(doc! { "_id": _id, "deleted_at": null }, None)
            .await
            .map_err(CoreError::store)
    }
    pub async fn find_many(
        query: &ProgressReportQuery,
    ) -> Result<Vec<ProgressReportResponse>, CoreError> {
        let db: Database = get_db();
        let collection: Collection<ProgressReport> =
            db.collection::<ProgressReport>("progress-reports");

        let mut matches: Document = doc! { "deleted_at": null };
        if let Some(task_id) = query.task_id {
            matches.insert("task_id", task_id);
        }
        if let Some(crew_id) = query.crew_id {
            matches.insert("crew_id", crew_id);
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
                "worker_id": { "$toString": "$worker_id" },
                "crew_id": { "$toString": "$crew_id" },
                "task_id": { "$toString": "$task_id" },
                "status": "$status",
                "created_at": "$created_at",
                "updated_at": "$updated_at",
            }
        });

        let mut cursor = collection
            .aggregate(pipeline, None)
            .await
            .map_err(CoreError::store)?;

        let mut entries: Vec<ProgressReportResponse> = Vec::new();
        while let Some(Ok(doc)) = cursor.next().await {
            let entry: ProgressReportResponse =
                from_document::<ProgressReportResponse>(doc).unwrap();
            entries.push(entry);
        }
        Ok(entries)
    }
    pub async fn delete(&mut self) -> Result<ObjectId, CoreError> {
        let now = DateTime::now();
        self.deleted_at = Some(now);
        self.updated_at = now;

        self.update().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::Bson;

    #[test]
    fn status_tags_match_persisted_literals() {
        for status in [
            ProgressStatus::Pending,
            ProgressStatus::InProgress,
            ProgressStatus::Completed,
        ] {
            assert_eq!(
                to_bson(&status).unwrap(),
                Bson::String(status.as_tag().to_string())
            );
        }
        // Progress completion is "Finalizado", not the task's "Finalizada".
        assert_eq!(ProgressStatus::Completed.as_tag(), "Finalizado");
    }

    #[test]
    fn ranks_follow_the_chain() {
        assert!(ProgressStatus::Pending.rank() < ProgressStatus::InProgress.rank());
        assert!(ProgressStatus::InProgress.rank() < ProgressStatus::Completed.rank());
    }
}
