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

use super::{crew::Crew, report::Report, GeoPoint};

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum TaskStatus {
    #[serde(rename = "Pendiente")]
    Pending,
    #[serde(rename = "En Progreso")]
    InProgress,
    #[serde(rename = "Finalizada")]
    Completed,
}

impl TaskStatus {
    pub fn as_tag(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pendiente",
            TaskStatus::InProgress => "En Progreso",
            TaskStatus::Completed => "Finalizada",
        }
    }
}
impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Repair,
    Maintenance,
    Collection,
    Supervision,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Task {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub title: String,
    pub crew_id: Option<ObjectId>,
    pub report_id: Vec<ObjectId>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub kind: TaskKind,
    pub operator_id: ObjectId,
    pub location: GeoPoint,
    pub deleted_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}
#[derive(Debug)]
pub struct TaskQuery {
    pub crew_id: Option<ObjectId>,
    pub status: Option<TaskStatus>,
    pub limit: Option<usize>,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct TaskRequest {
    pub title: String,
    pub crew_id: Option<ObjectId>,
    pub report_id: Vec<ObjectId>,
    pub priority: TaskPriority,
    pub kind: TaskKind,
    pub location: GeoPoint,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct TaskResponse {
    pub _id: String,
    pub title: String,
    pub crew_id: Option<String>,
    pub report_id: Vec<String>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub kind: TaskKind,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct TaskStatusCount {
    pub _id: TaskStatus,
    pub count: i64,
}

impl Task {
    /// Inserting a task also flags every linked report as assigned. The
    /// route validates beforehand that every report exists and is Accepted.
    pub async fn save(&mut self) -> Result<ObjectId, CoreError> {
        let db: Database = get_db();
        let collection: Collection<Task> = db.collection::<Task>("tasks");

        if let Some(crew_id) = &self.crew_id {
            if !matches!(Crew::find_by_id(crew_id).await, Ok(Some(_))) {
                return Err(CoreError::not_found("CREW"));
            }
        }

        self._id = Some(ObjectId::new());

        let _id = collection
            .insert_one(&*self, None)
            .await
            .map_err(CoreError::store)
            .map(|result| result.inserted_id.as_object_id().unwrap())?;

        Report::mark_task_assigned(&self.report_id, true).await?;

        Ok(_id)
    }
    /// Crew leader picks the task up: Pending → InProgress.
    pub async fn accept(&mut self) -> Result<ObjectId, CoreError> {
        lifecycle::task_transition(self.status, TaskStatus::InProgress, TransitionActor::Worker)?;

        self.status = TaskStatus::InProgress;
        self.updated_at = DateTime::now();

        self.update().await
    }
    /// Cascade-only completion: InProgress → Completed.
    pub async fn complete(&mut self, now: DateTime) -> Result<ObjectId, CoreError> {
        lifecycle::task_transition(self.status, TaskStatus::Completed, TransitionActor::System)?;

        self.status = TaskStatus::Completed;
        self.updated_at = now;

        self.update().await
    }
    async fn update(&self) -> Result<ObjectId, CoreError> {
        let db: Database = get_db();
        let collection: Collection<Task> = db.collection::<Task>("tasks");

        collection
            .update_one(
                doc! { "_id": self._id.unwrap() },
                doc! { "$set": to_bson::<Task>(self).unwrap() },
                None,
            )
            .await
            .map_err(CoreError::store)
            .map(|_| self._id.unwrap())
    }
    pub async fn find_by_id(_id: &ObjectId) -> Result<Option<Task>, CoreError> {
        let db: Database = get_db();
        let collection: Collection<Task> = db.collection::<Task>("tasks");

        collection
            .find_one(doc! { "_id": _id, "deleted_at": null }, None)
            .await
            .map_err(CoreError::store)
    }
    pub async fn find_many(query: &TaskQuery) -> Result<Vec<TaskResponse>, CoreError> {
        let db: Database = get_db();
        let collection: Collection<Task> = db.collection::<Task>("tasks");

        let mut matches: Document = doc! { "deleted_at": null };
        if let Some(crew_id) = query.crew_id {
            matches.insert("crew_id", crew_id);
        }
        if let Some(status) = query.status {
            matches.insert("status", status.as_tag());
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
                "crew_id": { "$toString": "$crew_id" },
                "report_id": {
                    "$map": {
                        "input": "$report_id",
                        "in": { "$toString": "$$this" },
                    }
                },
                "priority": "$priority",
                "status": "$status",
                "kind": "$kind",
                "created_at": "$created_at",
                "updated_at": "$updated_at",
            }
        });

        let mut cursor = collection
            .aggregate(pipeline, None)
            .await
            .map_err(CoreError::store)?;

        let mut tasks: Vec<TaskResponse> = Vec::new();
        while let Some(Ok(doc)) = cursor.next().await {
            let task: TaskResponse = from_document::<TaskResponse>(doc).unwrap();
            tasks.push(task);
        }
        Ok(tasks)
    }
    pub async fn count_by_status() -> Result<Vec<TaskStatusCount>, CoreError> {
        let db: Database = get_db();
        let collection: Collection<Task> = db.collection::<Task>("tasks");

        let pipeline: Vec<Document> = vec![
            doc! { "$match": { "deleted_at": null } },
            doc! { "$group": { "_id": "$status", "count": { "$sum": 1 } } },
        ];

        let mut cursor = collection
            .aggregate(pipeline, None)
            .await
            .map_err(CoreError::store)?;

        let mut counts: Vec<TaskStatusCount> = Vec::new();
        while let Some(Ok(doc)) = cursor.next().await {
            let count: TaskStatusCount = from_document::<TaskStatusCount>(doc).unwrap();
            counts.push(count);
        }
        Ok(counts)
    }
    /// Tasks are hard-deleted by operator action. Reports no longer
    /// referenced by any remaining task get their assignment flag released.
    pub async fn delete_by_id(_id: &ObjectId) -> Result<u64, CoreError> {
        let db: Database = get_db();
        let collection: Collection<Task> = db.collection::<Task>("tasks");

        let task = Task::find_by_id(_id)
            .await?
            .ok_or(CoreError::not_found("TASK"))?;

        let deleted = collection
            .delete_one(doc! { "_id": _id }, None)
            .await
            .map_err(CoreError::store)
            .map(|result| result.deleted_count)?;

        let mut released: Vec<ObjectId> = Vec::new();
        for report_id in task.report_id.iter() {
            let remaining = collection
                .count_documents(
                    doc! { "report_id": report_id, "deleted_at": null },
                    None,
                )
                .await
                .map_err(CoreError::store)?;
            if remaining == 0 {
                released.push(*report_id);
            }
        }
        if !released.is_empty() {
            Report::mark_task_assigned(&released, false).await?;
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::Bson;

    #[test]
    fn status_tags_match_persisted_literals() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Completed,
        ] {
            assert_eq!(
                to_bson(&status).unwrap(),
                Bson::String(status.as_tag().to_string())
            );
        }
        assert_eq!(TaskStatus::InProgress.as_tag(), "En Progreso");
        assert_eq!(TaskStatus::Completed.as_tag(), "Finalizada");
    }
}
