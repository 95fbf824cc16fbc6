use async_trait::async_trait;
use chrono::NaiveDate;

pub mod error;
pub mod sqlite;
pub mod sync;
pub mod types;

pub use error::StoreError;
pub use sqlite::SqliteStudyStore;
pub use types::{
    AiSettings, AnalysisRow, ErrorRow, ExamDates, NewProgress, NewTask, Progress, ProgressPatch,
    ReviewFilter, ReviewRow, SubjectConfig, SubjectProfile, Task, TaskPatch, TaskProgressView,
    TaskStatus,
};

/// Durable store for tasks, progress records and per-user
/// configuration. Every operation is scoped to the owning user; a row
/// that exists but belongs to someone else behaves as if absent.
#[async_trait]
pub trait StudyStore: Send + Sync + 'static {
    async fn create_task(&self, owner: i64, task: NewTask) -> Result<Task, StoreError>;
    async fn list_tasks(&self, owner: i64) -> Result<Vec<Task>, StoreError>;
    async fn get_task(&self, owner: i64, task_id: i64) -> Result<Task, StoreError>;
    /// Applies a partial update; a supplied `status` additionally runs
    /// the status → percent sync in the same transaction.
    async fn update_task(
        &self,
        owner: i64,
        task_id: i64,
        patch: TaskPatch,
    ) -> Result<Task, StoreError>;
    /// Deletes the task and all of its progress rows atomically.
    async fn delete_task(&self, owner: i64, task_id: i64) -> Result<(), StoreError>;

    async fn create_progress(
        &self,
        owner: i64,
        progress: NewProgress,
    ) -> Result<Progress, StoreError>;
    async fn get_progress(&self, owner: i64, progress_id: i64) -> Result<Progress, StoreError>;
    /// Applies a partial update; a supplied `progress_percent` on the
    /// task's current row additionally runs the percent → status sync
    /// in the same transaction.
    async fn update_progress(
        &self,
        owner: i64,
        progress_id: i64,
        patch: ProgressPatch,
    ) -> Result<Progress, StoreError>;
    async fn list_tasks_with_progress(
        &self,
        owner: i64,
    ) -> Result<Vec<TaskProgressView>, StoreError>;
    async fn set_corrected(
        &self,
        owner: i64,
        progress_id: i64,
        corrected: bool,
    ) -> Result<(), StoreError>;
    async fn save_insight(
        &self,
        owner: i64,
        progress_id: i64,
        insight: &str,
    ) -> Result<(), StoreError>;

    async fn list_subject_configs(&self, owner: i64) -> Result<Vec<SubjectConfig>, StoreError>;
    async fn upsert_subject_configs(
        &self,
        owner: i64,
        configs: &[SubjectConfig],
    ) -> Result<(), StoreError>;
    async fn exam_dates(&self, owner: i64) -> Result<ExamDates, StoreError>;
    /// Grade and exam dates are uniform across subjects, so one call
    /// rewrites them on every subject row the user has.
    async fn update_global_config(
        &self,
        owner: i64,
        grade: i64,
        midterm_date: Option<NaiveDate>,
        final_date: Option<NaiveDate>,
    ) -> Result<(), StoreError>;
    async fn subject_profile(
        &self,
        owner: i64,
        subject: &str,
    ) -> Result<SubjectProfile, StoreError>;
    async fn ai_settings(&self, owner: i64) -> Result<Option<AiSettings>, StoreError>;
    async fn upsert_ai_settings(
        &self,
        owner: i64,
        settings: &AiSettings,
    ) -> Result<(), StoreError>;

    async fn review_rows(
        &self,
        owner: i64,
        filter: &ReviewFilter,
    ) -> Result<Vec<ReviewRow>, StoreError>;
    async fn analysis_rows(
        &self,
        owner: i64,
        filter: &ReviewFilter,
    ) -> Result<Vec<AnalysisRow>, StoreError>;
    async fn recent_errors(
        &self,
        owner: i64,
        subject: &str,
        limit: i64,
    ) -> Result<Vec<ErrorRow>, StoreError>;
}

#[cfg(test)]
mod tests;
