//! Legal statuses and transitions for reports, tasks and progress reports,
//! independent of who persists them. Every status-changing write in the
//! server goes through one of these validators; controllers never write a
//! raw status.

use crate::error::CoreError;
use crate::models::progress_report::ProgressStatus;
use crate::models::report::ReportStatus;
use crate::models::task::TaskStatus;

/// Who is requesting the transition. `System` covers the cascade engine and
/// the staleness sweep; workers are crew leaders acting on their own tasks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionActor {
    Operator,
    Worker,
    System,
}

/// Side effects the caller must apply together with the status write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransitionEffects {
    pub stamp_approved_at: bool,
    pub stamp_completed_at: bool,
    pub fire_cascade: bool,
}

fn rejected<T>(from: impl ToString, to: impl ToString) -> Result<T, CoreError> {
    Err(CoreError::InvalidTransition {
        from: from.to_string(),
        to: to.to_string(),
    })
}

/// Report edges. Completed and Rejected are terminal: no edge leaves them,
/// not even for the system actor.
pub fn report_transition(
    current: ReportStatus,
    requested: ReportStatus,
    actor: TransitionActor,
) -> Result<TransitionEffects, CoreError> {
    use ReportStatus::{Accepted, Completed, Pending, Rejected, Reviewed};
    use TransitionActor::{Operator, System};

    match (current, requested, actor) {
        (Pending, Reviewed, Operator) => Ok(TransitionEffects::default()),
        (Reviewed, Accepted, Operator) => Ok(TransitionEffects {
            stamp_approved_at: true,
            ..TransitionEffects::default()
        }),
        (Reviewed, Rejected, Operator | System) => Ok(TransitionEffects::default()),
        (Accepted, Completed, System) => Ok(TransitionEffects {
            stamp_completed_at: true,
            ..TransitionEffects::default()
        }),
        _ => rejected(current, requested),
    }
}

/// Task edges. A task must pass through InProgress: completion is reserved
/// for the cascade engine and Pending → Completed is not an edge.
pub fn task_transition(
    current: TaskStatus,
    requested: TaskStatus,
    actor: TransitionActor,
) -> Result<TransitionEffects, CoreError> {
    use TaskStatus::{Completed, InProgress, Pending};
    use TransitionActor::{System, Worker};

    match (current, requested, actor) {
        (Pending, InProgress, Worker) => Ok(TransitionEffects::default()),
        (InProgress, Completed, System) => Ok(TransitionEffects {
            stamp_completed_at: true,
            ..TransitionEffects::default()
        }),
        _ => rejected(current, requested),
    }
}

/// Progress report edges: forward along Pending → InProgress → Completed.
/// Skipping ahead is allowed (a crew can log a single final entry),
/// regression is not, and re-submitting the current status is a harmless
/// no-op. Reaching Completed fires the cascade.
pub fn progress_transition(
    current: ProgressStatus,
    requested: ProgressStatus,
) -> Result<TransitionEffects, CoreError> {
    if requested.rank() < current.rank() {
        return rejected(current, requested);
    }
    Ok(TransitionEffects {
        fire_cascade: requested == ProgressStatus::Completed && current != requested,
        ..TransitionEffects::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProgressStatus as Ps;
    use ReportStatus as Rs;
    use TaskStatus as Ts;
    use TransitionActor::{Operator, System, Worker};

    #[test]
    fn report_review_then_accept() {
        let effects = report_transition(Rs::Pending, Rs::Reviewed, Operator).unwrap();
        assert!(!effects.stamp_approved_at);

        let effects = report_transition(Rs::Reviewed, Rs::Accepted, Operator).unwrap();
        assert!(effects.stamp_approved_at);
        assert!(!effects.stamp_completed_at);
    }

    #[test]
    fn report_completion_is_system_only() {
        let effects = report_transition(Rs::Accepted, Rs::Completed, System).unwrap();
        assert!(effects.stamp_completed_at);
        assert!(report_transition(Rs::Accepted, Rs::Completed, Operator).is_err());
        assert!(report_transition(Rs::Accepted, Rs::Completed, Worker).is_err());
    }

    #[test]
    fn report_rejection_allowed_for_operator_and_sweep() {
        assert!(report_transition(Rs::Reviewed, Rs::Rejected, Operator).is_ok());
        assert!(report_transition(Rs::Reviewed, Rs::Rejected, System).is_ok());
        assert!(report_transition(Rs::Pending, Rs::Rejected, System).is_err());
    }

    #[test]
    fn report_terminal_states_are_immutable() {
        for requested in [Rs::Pending, Rs::Reviewed, Rs::Accepted, Rs::Rejected] {
            assert!(report_transition(Rs::Completed, requested, System).is_err());
        }
        for requested in [Rs::Pending, Rs::Reviewed, Rs::Accepted, Rs::Completed] {
            assert!(report_transition(Rs::Rejected, requested, System).is_err());
            assert!(report_transition(Rs::Rejected, requested, Operator).is_err());
        }
    }

    #[test]
    fn report_cannot_skip_review() {
        assert!(report_transition(Rs::Pending, Rs::Accepted, Operator).is_err());
        assert!(report_transition(Rs::Pending, Rs::Completed, System).is_err());
    }

    #[test]
    fn task_must_pass_through_in_progress() {
        assert!(task_transition(Ts::Pending, Ts::InProgress, Worker).is_ok());
        assert!(task_transition(Ts::Pending, Ts::Completed, System).is_err());
        assert!(task_transition(Ts::InProgress, Ts::Completed, System).is_ok());
    }

    #[test]
    fn task_completion_is_system_only() {
        assert!(task_transition(Ts::InProgress, Ts::Completed, Worker).is_err());
        assert!(task_transition(Ts::InProgress, Ts::Completed, Operator).is_err());
    }

    #[test]
    fn progress_moves_forward_only() {
        assert!(progress_transition(Ps::Pending, Ps::InProgress).is_ok());
        assert!(progress_transition(Ps::InProgress, Ps::Completed).is_ok());
        assert!(progress_transition(Ps::Pending, Ps::Completed).is_ok());
        assert!(progress_transition(Ps::Completed, Ps::InProgress).is_err());
        assert!(progress_transition(Ps::InProgress, Ps::Pending).is_err());
    }

    #[test]
    fn progress_resubmit_is_a_no_op() {
        for status in [Ps::Pending, Ps::InProgress, Ps::Completed] {
            let effects = progress_transition(status, status).unwrap();
            assert!(!effects.fire_cascade);
            assert_eq!(effects, TransitionEffects::default());
        }
    }

    #[test]
    fn progress_completion_fires_cascade() {
        assert!(progress_transition(Ps::Pending, Ps::Completed).unwrap().fire_cascade);
        assert!(progress_transition(Ps::InProgress, Ps::Completed).unwrap().fire_cascade);
        assert!(!progress_transition(Ps::Pending, Ps::InProgress).unwrap().fire_cascade);
    }

    #[test]
    fn invalid_transition_names_both_states() {
        let err = report_transition(Rs::Rejected, Rs::Completed, System).unwrap_err();
        assert_eq!(err.to_string(), "INVALID_TRANSITION_Rechazado_TO_Completado");
    }
}
