//! Propagates a finished progress report upward: its task becomes
//! Finalizada and every report the task groups becomes Completado.
//!
//! The task write and the report bulk write are separate round trips with
//! no transaction (standalone MongoDB offers none), so an intent document
//! is recorded before the first write and cleared after the second. A crash
//! in between leaves the intent behind and `resume_pending_cascades`
//! finishes the job at startup.

use crate::database::get_db;
use crate::error::CoreError;
use crate::models::progress_report::{ProgressReport, ProgressStatus};
use crate::models::report::Report;
use crate::models::task::{Task, TaskStatus};

use futures::StreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime},
    Collection, Database,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, PartialEq, Eq)]
pub enum CascadeOutcome {
    /// The progress report is not terminal; nothing to propagate.
    Skipped,
    /// The task was already Finalizada: a duplicate trigger, no writes.
    AlreadyComplete { task_id: ObjectId },
    Completed {
        task_id: ObjectId,
        reports_completed: u64,
    },
}

/// What `resume_pending_cascades` owes an intent, given the state the task
/// was left in.
#[derive(Debug, PartialEq, Eq)]
enum ResumeStep {
    /// Task still Pendiente: the completion write never landed, so the
    /// intent describes no work. Its reports stay untouched.
    Drop,
    /// Task stuck in En Progreso: finish it, then sync its reports.
    Finish,
    /// Task already Finalizada: only the report bulk write is missing.
    SyncReports,
}

fn resume_step(status: TaskStatus) -> ResumeStep {
    match status {
        TaskStatus::Pending => ResumeStep::Drop,
        TaskStatus::InProgress => ResumeStep::Finish,
        TaskStatus::Completed => ResumeStep::SyncReports,
    }
}

/// A terminal progress entry may only be logged against a task that is
/// under way; anything else would persist a trigger with no legal cascade.
pub fn task_ready_for_completion(status: TaskStatus) -> bool {
    status == TaskStatus::InProgress
}

#[derive(Debug, Deserialize, Serialize)]
struct CascadeIntent {
    _id: ObjectId,
    task_id: ObjectId,
    created_at: DateTime,
}

impl CascadeIntent {
    async fn record(task_id: &ObjectId) -> Result<ObjectId, CoreError> {
        let db: Database = get_db();
        let collection: Collection<CascadeIntent> =
            db.collection::<CascadeIntent>("cascade-intents");

        let intent = CascadeIntent {
            _id: ObjectId::new(),
            task_id: *task_id,
            created_at: DateTime::now(),
        };

        collection
            .insert_one(&intent, None)
            .await
            .map_err(CoreError::store)
            .map(|result| result.inserted_id.as_object_id().unwrap())
    }
    async fn clear(_id: &ObjectId) -> Result<(), CoreError> {
        let db: Database = get_db();
        let collection: Collection<CascadeIntent> =
            db.collection::<CascadeIntent>("cascade-intents");

        collection
            .delete_one(doc! { "_id": _id }, None)
            .await
            .map_err(CoreError::store)
            .map(|_| ())
    }
    async fn find_all() -> Result<Vec<CascadeIntent>, CoreError> {
        let db: Database = get_db();
        let collection: Collection<CascadeIntent> =
            db.collection::<CascadeIntent>("cascade-intents");

        let mut cursor = collection
            .find(doc! {}, None)
            .await
            .map_err(CoreError::store)?;

        let mut intents: Vec<CascadeIntent> = Vec::new();
        while let Some(Ok(intent)) = cursor.next().await {
            intents.push(intent);
        }
        Ok(intents)
    }
}

/// Entry point, called synchronously after a progress report is persisted.
/// The task is loaded and validated before anything is written: a missing
/// task aborts with no report mutated.
pub async fn apply_progress_completion(
    progress: &ProgressReport,
) -> Result<CascadeOutcome, CoreError> {
    if progress.status != ProgressStatus::Completed {
        return Ok(CascadeOutcome::Skipped);
    }

    let task = Task::find_by_id(&progress.task_id)
        .await?
        .ok_or(CoreError::not_found("TASK"))?;

    run_cascade(task).await
}

async fn run_cascade(mut task: Task) -> Result<CascadeOutcome, CoreError> {
    let task_id = task._id.unwrap();

    if task.status == TaskStatus::Completed {
        return Ok(CascadeOutcome::AlreadyComplete { task_id });
    }

    let now = DateTime::now();
    let intent_id = CascadeIntent::record(&task_id).await?;

    if let Err(err) = task.complete(now).await {
        // Nothing landed; the intent has no work to describe.
        let _ = CascadeIntent::clear(&intent_id).await;
        return Err(err);
    }

    match Report::complete_many(&task.report_id, now).await {
        Ok(reports_completed) => {
            CascadeIntent::clear(&intent_id).await?;
            info!(
                task_id = %task_id,
                reports_completed,
                "progress completion cascaded to task and reports"
            );
            Ok(CascadeOutcome::Completed {
                task_id,
                reports_completed,
            })
        }
        Err(err) => {
            warn!(
                task_id = %task_id,
                error = %err,
                "task completed but report bulk update failed; intent kept"
            );
            Err(CoreError::PartialCascadeFailure {
                task_id,
                report_id: task.report_id.clone(),
            })
        }
    }
}

/// Finishes cascades interrupted mid-flight. Invoked once at startup,
/// before the server starts taking requests.
pub async fn resume_pending_cascades() -> Result<usize, CoreError> {
    let intents = CascadeIntent::find_all().await?;
    let mut resumed: usize = 0;

    for intent in intents {
        match Task::find_by_id(&intent.task_id).await? {
            Some(mut task) => match resume_step(task.status) {
                ResumeStep::Drop => {
                    warn!(task_id = %intent.task_id, "dropping intent for task never started");
                    CascadeIntent::clear(&intent._id).await?;
                }
                step => {
                    let now = DateTime::now();
                    if step == ResumeStep::Finish {
                        task.complete(now).await?;
                    }
                    let reports_completed = Report::complete_many(&task.report_id, now).await?;
                    CascadeIntent::clear(&intent._id).await?;
                    info!(
                        task_id = %intent.task_id,
                        reports_completed,
                        "resumed interrupted cascade"
                    );
                    resumed += 1;
                }
            },
            None => {
                warn!(task_id = %intent.task_id, "dropping intent for missing task");
                CascadeIntent::clear(&intent._id).await?;
            }
        }
    }

    Ok(resumed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_drops_intent_when_task_never_started() {
        assert_eq!(resume_step(TaskStatus::Pending), ResumeStep::Drop);
    }

    #[test]
    fn resume_finishes_from_where_the_cascade_stopped() {
        assert_eq!(resume_step(TaskStatus::InProgress), ResumeStep::Finish);
        assert_eq!(resume_step(TaskStatus::Completed), ResumeStep::SyncReports);
    }

    #[test]
    fn only_tasks_under_way_accept_a_terminal_entry() {
        assert!(task_ready_for_completion(TaskStatus::InProgress));
        assert!(!task_ready_for_completion(TaskStatus::Pending));
        assert!(!task_ready_for_completion(TaskStatus::Completed));
    }
}
