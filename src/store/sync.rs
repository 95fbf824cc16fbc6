//! The consistency policy between a task's status and the
//! `progress_percent` of its current progress row. Both mutation entry
//! points call into these rules inside the same transaction as the
//! triggering write, so readers never observe a half-updated pair.

use super::types::TaskStatus;

/// Note written into a progress row created by a status transition, so
/// it is distinguishable from a row the student entered by hand.
pub const STATUS_SYNC_NOTE: &str = "任務狀態由月曆標記為已完成";

/// Percent → Status direction: the status a task should carry after its
/// current progress row changed to `percent`.
pub fn status_for_percent(percent: i64) -> TaskStatus {
    match percent {
        100 => TaskStatus::Completed,
        0 => TaskStatus::NotStarted,
        _ => TaskStatus::InProgress,
    }
}

/// What the Status → Percent direction does to the progress side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressSync {
    /// Set the current progress row's percent.
    SetPercent(i64),
    /// No current row exists; create one at 100 percent.
    CreateCompleted,
    /// Leave the progress side alone.
    None,
}

/// Status → Percent direction. Completion backfills a progress row when
/// none exists; resetting to not-started only zeroes an existing row
/// and never creates one.
pub fn sync_for_status(status: TaskStatus, has_progress: bool) -> ProgressSync {
    match status {
        TaskStatus::Completed => {
            if has_progress {
                ProgressSync::SetPercent(100)
            } else {
                ProgressSync::CreateCompleted
            }
        }
        TaskStatus::NotStarted => {
            if has_progress {
                ProgressSync::SetPercent(0)
            } else {
                ProgressSync::None
            }
        }
        TaskStatus::InProgress => ProgressSync::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_boundaries_map_to_statuses() {
        assert_eq!(status_for_percent(100), TaskStatus::Completed);
        assert_eq!(status_for_percent(0), TaskStatus::NotStarted);
        assert_eq!(status_for_percent(1), TaskStatus::InProgress);
        assert_eq!(status_for_percent(99), TaskStatus::InProgress);
    }

    #[test]
    fn completion_updates_or_creates() {
        assert_eq!(
            sync_for_status(TaskStatus::Completed, true),
            ProgressSync::SetPercent(100)
        );
        assert_eq!(
            sync_for_status(TaskStatus::Completed, false),
            ProgressSync::CreateCompleted
        );
    }

    #[test]
    fn reset_only_touches_existing_rows() {
        assert_eq!(
            sync_for_status(TaskStatus::NotStarted, true),
            ProgressSync::SetPercent(0)
        );
        assert_eq!(
            sync_for_status(TaskStatus::NotStarted, false),
            ProgressSync::None
        );
    }

    #[test]
    fn in_progress_never_touches_progress() {
        assert_eq!(sync_for_status(TaskStatus::InProgress, true), ProgressSync::None);
        assert_eq!(sync_for_status(TaskStatus::InProgress, false), ProgressSync::None);
    }
}
