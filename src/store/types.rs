use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::error::StoreError;

/// Task lifecycle status. Stored and transmitted as the human-readable
/// labels the frontend already uses; the legacy creation default
/// "未完成" is accepted as an alias for not-started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "未開始", alias = "未完成")]
    NotStarted,
    #[serde(rename = "進行中")]
    InProgress,
    #[serde(rename = "已完成")]
    Completed,
}

impl TaskStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "未開始",
            TaskStatus::InProgress => "進行中",
            TaskStatus::Completed => "已完成",
        }
    }

    pub fn parse(status: &str) -> Result<Self, StoreError> {
        match status {
            "未開始" | "未完成" => Ok(TaskStatus::NotStarted),
            "進行中" => Ok(TaskStatus::InProgress),
            "已完成" => Ok(TaskStatus::Completed),
            _ => Err(StoreError::validation(format!(
                "unrecognized task status: {}",
                status
            ))),
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::NotStarted
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub subject: String,
    pub title: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub date: Option<NaiveDate>,
    pub status: TaskStatus,
    pub unit: String,
    pub user_id: i64,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub subject: String,
    pub title: String,
    pub task_type: String,
    pub date: NaiveDate,
    pub status: Option<TaskStatus>,
    pub unit: String,
}

/// Partial update for a task; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub subject: Option<String>,
    pub title: Option<String>,
    pub task_type: Option<String>,
    pub date: Option<NaiveDate>,
    pub status: Option<TaskStatus>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub id: i64,
    pub task_id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub progress_percent: i64,
    pub student_note: String,
    pub teacher_feedback: String,
    pub score: Option<f64>,
    pub is_corrected: bool,
    pub ai_insight: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewProgress {
    pub task_id: i64,
    pub date: NaiveDate,
    pub progress_percent: Option<i64>,
    pub student_note: String,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct ProgressPatch {
    pub date: Option<NaiveDate>,
    pub progress_percent: Option<i64>,
    pub student_note: Option<String>,
    pub teacher_feedback: Option<String>,
    pub score: Option<f64>,
}

/// A task merged with its current progress row, zero-valued when the
/// task has no progress yet.
#[derive(Debug, Clone, Serialize)]
pub struct TaskProgressView {
    pub task_id: i64,
    pub subject: String,
    pub title: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub unit: String,
    pub target_date: Option<NaiveDate>,
    pub progress_percent: i64,
    pub student_note: String,
    pub score: Option<f64>,
    pub id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectConfig {
    pub subject_name: String,
    pub publisher: String,
    pub grade: i64,
}

/// Publisher and grade for one subject, falling back to the standard
/// textbook defaults when the user never configured the subject.
#[derive(Debug, Clone, Serialize)]
pub struct SubjectProfile {
    pub publisher: String,
    pub grade: i64,
}

pub fn default_publisher(subject: &str) -> &'static str {
    match subject {
        "國語" => "翰林",
        _ => "康軒",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExamDates {
    pub midterm_date: Option<NaiveDate>,
    pub final_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiSettings {
    pub api_key: Option<String>,
    pub system_prompt: Option<String>,
    pub model_name: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReviewFilter {
    pub subject: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// One wrong-answer entry for the review list, before note parsing.
#[derive(Debug, Clone)]
pub struct ReviewRow {
    pub id: i64,
    pub subject: String,
    pub unit: String,
    pub task_type: String,
    pub student_note: String,
    pub score: Option<f64>,
    pub date: NaiveDate,
    pub is_corrected: bool,
    pub ai_insight: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AnalysisRow {
    pub unit: String,
    pub score: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ErrorRow {
    pub unit: String,
    pub title: String,
    pub student_note: String,
    pub score: Option<f64>,
}

/// Parses a `%Y-%m-%d` calendar date, tolerating a trailing time
/// component (the frontend sometimes sends full ISO timestamps).
pub fn parse_date(raw: &str) -> Result<NaiveDate, StoreError> {
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .map_err(|_| StoreError::validation(format!("invalid date: {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_status_labels() {
        assert_eq!(TaskStatus::parse("已完成").unwrap(), TaskStatus::Completed);
        assert_eq!(TaskStatus::parse("進行中").unwrap(), TaskStatus::InProgress);
        assert_eq!(TaskStatus::parse("未開始").unwrap(), TaskStatus::NotStarted);
    }

    #[test]
    fn legacy_default_label_maps_to_not_started() {
        assert_eq!(TaskStatus::parse("未完成").unwrap(), TaskStatus::NotStarted);
    }

    #[test]
    fn unknown_status_is_a_validation_error() {
        assert!(matches!(
            TaskStatus::parse("done"),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn parse_date_accepts_plain_and_timestamped_input() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(parse_date("2024-03-15").unwrap(), expected);
        assert_eq!(parse_date("2024-03-15T08:30:00Z").unwrap(), expected);
        assert!(parse_date("not-a-date").is_err());
    }
}
