use super::*;
use crate::store::sqlite::SqliteStudyStore;
use chrono::NaiveDate;
use sqlx::Row;
use tempfile::NamedTempFile;

async fn setup_store() -> (SqliteStudyStore, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let url = format!("sqlite://{}?mode=rwc", temp_file.path().display());
    let store = SqliteStudyStore::new(&url).await.unwrap();
    (store, temp_file)
}

fn sample_task(subject: &str, title: &str) -> NewTask {
    NewTask {
        subject: subject.to_string(),
        title: title.to_string(),
        task_type: "練習".to_string(),
        date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        status: None,
        unit: "第一單元".to_string(),
    }
}

fn sample_progress(task_id: i64, percent: i64) -> NewProgress {
    NewProgress {
        task_id,
        date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
        progress_percent: Some(percent),
        student_note: "p.12-15 錯兩題".to_string(),
        score: Some(80.0),
    }
}

async fn progress_rows(store: &SqliteStudyStore, task_id: i64) -> Vec<(i64, i64)> {
    sqlx::query("SELECT id, progress_percent FROM progresses WHERE task_id = ? ORDER BY id ASC")
        .bind(task_id)
        .fetch_all(store.pool())
        .await
        .unwrap()
        .into_iter()
        .map(|row| (row.get("id"), row.get("progress_percent")))
        .collect()
}

#[tokio::test]
async fn test_create_task_defaults_to_not_started() {
    let (store, _temp_file) = setup_store().await;

    let task = store.create_task(1, sample_task("數學", "分數乘法")).await.unwrap();
    assert_eq!(task.status, TaskStatus::NotStarted);

    let fetched = store.get_task(1, task.id).await.unwrap();
    assert_eq!(fetched.status, TaskStatus::NotStarted);
    assert_eq!(fetched.subject, "數學");
}

#[tokio::test]
async fn test_completion_creates_progress_row() {
    let (store, _temp_file) = setup_store().await;
    let task = store.create_task(1, sample_task("數學", "分數乘法")).await.unwrap();

    let patch = TaskPatch {
        status: Some(TaskStatus::Completed),
        ..Default::default()
    };
    store.update_task(1, task.id, patch).await.unwrap();

    let rows = progress_rows(&store, task.id).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].1, 100);
}

#[tokio::test]
async fn test_completion_updates_existing_progress_row() {
    let (store, _temp_file) = setup_store().await;
    let task = store.create_task(1, sample_task("數學", "分數乘法")).await.unwrap();
    let progress = store.create_progress(1, sample_progress(task.id, 40)).await.unwrap();

    let patch = TaskPatch {
        status: Some(TaskStatus::Completed),
        ..Default::default()
    };
    store.update_task(1, task.id, patch).await.unwrap();

    let rows = progress_rows(&store, task.id).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0], (progress.id, 100));
}

#[tokio::test]
async fn test_completion_is_idempotent() {
    let (store, _temp_file) = setup_store().await;
    let task = store.create_task(1, sample_task("數學", "分數乘法")).await.unwrap();

    for _ in 0..2 {
        let patch = TaskPatch {
            status: Some(TaskStatus::Completed),
            ..Default::default()
        };
        store.update_task(1, task.id, patch).await.unwrap();
    }

    let rows = progress_rows(&store, task.id).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].1, 100);
}

#[tokio::test]
async fn test_reset_to_not_started_zeroes_existing_row() {
    let (store, _temp_file) = setup_store().await;
    let task = store.create_task(1, sample_task("數學", "分數乘法")).await.unwrap();
    store.create_progress(1, sample_progress(task.id, 100)).await.unwrap();

    let patch = TaskPatch {
        status: Some(TaskStatus::NotStarted),
        ..Default::default()
    };
    store.update_task(1, task.id, patch).await.unwrap();

    let rows = progress_rows(&store, task.id).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].1, 0);
}

#[tokio::test]
async fn test_reset_to_not_started_creates_no_row() {
    let (store, _temp_file) = setup_store().await;
    let task = store.create_task(1, sample_task("數學", "分數乘法")).await.unwrap();

    let patch = TaskPatch {
        status: Some(TaskStatus::NotStarted),
        ..Default::default()
    };
    store.update_task(1, task.id, patch).await.unwrap();

    assert!(progress_rows(&store, task.id).await.is_empty());
}

#[tokio::test]
async fn test_update_is_scoped_to_owner() {
    let (store, _temp_file) = setup_store().await;
    let task = store.create_task(1, sample_task("社會", "台灣地理")).await.unwrap();

    let patch = TaskPatch {
        status: Some(TaskStatus::Completed),
        ..Default::default()
    };
    let result = store.update_task(2, task.id, patch).await;
    assert!(matches!(result, Err(StoreError::NotFound)));

    // The other user's task must be untouched.
    let fetched = store.get_task(1, task.id).await.unwrap();
    assert_eq!(fetched.status, TaskStatus::NotStarted);
    assert!(progress_rows(&store, task.id).await.is_empty());
}

#[tokio::test]
async fn test_delete_cascades_to_all_progress_rows() {
    let (store, _temp_file) = setup_store().await;
    let task = store.create_task(1, sample_task("自然", "光合作用")).await.unwrap();
    for percent in [20, 40, 60] {
        store.create_progress(1, sample_progress(task.id, percent)).await.unwrap();
    }

    store.delete_task(1, task.id).await.unwrap();

    assert!(matches!(store.get_task(1, task.id).await, Err(StoreError::NotFound)));
    assert!(progress_rows(&store, task.id).await.is_empty());
}

#[tokio::test]
async fn test_delete_of_foreign_task_is_not_found() {
    let (store, _temp_file) = setup_store().await;
    let task = store.create_task(1, sample_task("自然", "光合作用")).await.unwrap();
    store.create_progress(1, sample_progress(task.id, 20)).await.unwrap();

    let result = store.delete_task(2, task.id).await;
    assert!(matches!(result, Err(StoreError::NotFound)));
    assert_eq!(progress_rows(&store, task.id).await.len(), 1);
}

#[tokio::test]
async fn test_failed_progress_write_rolls_back_status_write() {
    let (store, _temp_file) = setup_store().await;
    let task = store.create_task(1, sample_task("英文", "過去式")).await.unwrap();
    store.create_progress(1, sample_progress(task.id, 40)).await.unwrap();

    // Simulated failure of the progress-side write.
    sqlx::query(
        r#"
        CREATE TRIGGER inject_progress_failure BEFORE UPDATE ON progresses
        BEGIN
            SELECT RAISE(ABORT, 'injected failure');
        END
        "#,
    )
    .execute(store.pool())
    .await
    .unwrap();

    let patch = TaskPatch {
        status: Some(TaskStatus::Completed),
        ..Default::default()
    };
    let result = store.update_task(1, task.id, patch).await;
    assert!(matches!(result, Err(StoreError::Store(_))));

    // The task-side write must have rolled back with it.
    let fetched = store.get_task(1, task.id).await.unwrap();
    assert_eq!(fetched.status, TaskStatus::NotStarted);
    assert_eq!(progress_rows(&store, task.id).await[0].1, 40);
}

#[tokio::test]
async fn test_percent_update_drives_task_status() {
    let (store, _temp_file) = setup_store().await;
    let task = store.create_task(1, sample_task("數學", "分數乘法")).await.unwrap();
    let progress = store.create_progress(1, sample_progress(task.id, 10)).await.unwrap();

    for (percent, expected) in [
        (100, TaskStatus::Completed),
        (50, TaskStatus::InProgress),
        (0, TaskStatus::NotStarted),
    ] {
        let patch = ProgressPatch {
            progress_percent: Some(percent),
            ..Default::default()
        };
        store.update_progress(1, progress.id, patch).await.unwrap();

        let fetched = store.get_task(1, task.id).await.unwrap();
        assert_eq!(fetched.status, expected);
    }
}

#[tokio::test]
async fn test_only_current_row_drives_task_status() {
    let (store, _temp_file) = setup_store().await;
    let task = store.create_task(1, sample_task("數學", "分數乘法")).await.unwrap();
    store.create_progress(1, sample_progress(task.id, 10)).await.unwrap();
    let second = store.create_progress(1, sample_progress(task.id, 10)).await.unwrap();

    let patch = ProgressPatch {
        progress_percent: Some(100),
        ..Default::default()
    };
    store.update_progress(1, second.id, patch).await.unwrap();

    // Only the first (current) row is paired with the task's status.
    let fetched = store.get_task(1, task.id).await.unwrap();
    assert_eq!(fetched.status, TaskStatus::NotStarted);
}

#[tokio::test]
async fn test_progress_percent_out_of_range_is_rejected() {
    let (store, _temp_file) = setup_store().await;
    let task = store.create_task(1, sample_task("數學", "分數乘法")).await.unwrap();
    let progress = store.create_progress(1, sample_progress(task.id, 40)).await.unwrap();

    let patch = ProgressPatch {
        progress_percent: Some(150),
        ..Default::default()
    };
    let result = store.update_progress(1, progress.id, patch).await;
    assert!(matches!(result, Err(StoreError::Validation(_))));

    let fetched = store.get_progress(1, progress.id).await.unwrap();
    assert_eq!(fetched.progress_percent, 40);
}

#[tokio::test]
async fn test_create_progress_for_foreign_task_is_unauthorized() {
    let (store, _temp_file) = setup_store().await;
    let task = store.create_task(1, sample_task("數學", "分數乘法")).await.unwrap();

    let result = store.create_progress(2, sample_progress(task.id, 30)).await;
    assert!(matches!(result, Err(StoreError::Unauthorized)));
    assert!(progress_rows(&store, task.id).await.is_empty());
}

#[tokio::test]
async fn test_update_progress_of_foreign_task_is_unauthorized() {
    let (store, _temp_file) = setup_store().await;
    let task = store.create_task(1, sample_task("數學", "分數乘法")).await.unwrap();
    let progress = store.create_progress(1, sample_progress(task.id, 30)).await.unwrap();

    let patch = ProgressPatch {
        progress_percent: Some(100),
        ..Default::default()
    };
    let result = store.update_progress(2, progress.id, patch).await;
    assert!(matches!(result, Err(StoreError::Unauthorized)));

    let fetched = store.get_progress(1, progress.id).await.unwrap();
    assert_eq!(fetched.progress_percent, 30);
}

#[tokio::test]
async fn test_list_tasks_with_progress_merges_current_row() {
    let (store, _temp_file) = setup_store().await;
    let with_progress = store.create_task(1, sample_task("數學", "分數乘法")).await.unwrap();
    let bare = store.create_task(1, sample_task("社會", "台灣地理")).await.unwrap();
    let progress = store.create_progress(1, sample_progress(with_progress.id, 60)).await.unwrap();
    // A later row must not displace the current one in the view.
    store.create_progress(1, sample_progress(with_progress.id, 5)).await.unwrap();

    let views = store.list_tasks_with_progress(1).await.unwrap();
    assert_eq!(views.len(), 2);

    let merged = views.iter().find(|v| v.task_id == with_progress.id).unwrap();
    assert_eq!(merged.progress_percent, 60);
    assert_eq!(merged.id, Some(progress.id));

    let empty = views.iter().find(|v| v.task_id == bare.id).unwrap();
    assert_eq!(empty.progress_percent, 0);
    assert_eq!(empty.student_note, "");
    assert_eq!(empty.id, None);
}

#[tokio::test]
async fn test_subject_config_upsert_overwrites() {
    let (store, _temp_file) = setup_store().await;

    let first = vec![SubjectConfig {
        subject_name: "數學".to_string(),
        publisher: "康軒".to_string(),
        grade: 5,
    }];
    store.upsert_subject_configs(1, &first).await.unwrap();

    let second = vec![SubjectConfig {
        subject_name: "數學".to_string(),
        publisher: "南一".to_string(),
        grade: 6,
    }];
    store.upsert_subject_configs(1, &second).await.unwrap();

    let configs = store.list_subject_configs(1).await.unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0].publisher, "南一");
    assert_eq!(configs[0].grade, 6);
}

#[tokio::test]
async fn test_subject_profile_falls_back_to_defaults() {
    let (store, _temp_file) = setup_store().await;

    let mandarin = store.subject_profile(1, "國語").await.unwrap();
    assert_eq!(mandarin.publisher, "翰林");
    assert_eq!(mandarin.grade, 6);

    let math = store.subject_profile(1, "數學").await.unwrap();
    assert_eq!(math.publisher, "康軒");
}

#[tokio::test]
async fn test_global_config_applies_to_all_subjects() {
    let (store, _temp_file) = setup_store().await;
    let configs = vec![
        SubjectConfig {
            subject_name: "數學".to_string(),
            publisher: "康軒".to_string(),
            grade: 5,
        },
        SubjectConfig {
            subject_name: "社會".to_string(),
            publisher: "翰林".to_string(),
            grade: 5,
        },
    ];
    store.upsert_subject_configs(1, &configs).await.unwrap();

    let midterm = NaiveDate::from_ymd_opt(2024, 4, 20).unwrap();
    let final_date = NaiveDate::from_ymd_opt(2024, 6, 25).unwrap();
    store
        .update_global_config(1, 6, Some(midterm), Some(final_date))
        .await
        .unwrap();

    let dates = store.exam_dates(1).await.unwrap();
    assert_eq!(dates.midterm_date, Some(midterm));
    assert_eq!(dates.final_date, Some(final_date));

    let listed = store.list_subject_configs(1).await.unwrap();
    assert!(listed.iter().all(|c| c.grade == 6));
}

#[tokio::test]
async fn test_exam_dates_default_to_none() {
    let (store, _temp_file) = setup_store().await;
    let dates = store.exam_dates(1).await.unwrap();
    assert_eq!(dates.midterm_date, None);
    assert_eq!(dates.final_date, None);
}

#[tokio::test]
async fn test_ai_settings_roundtrip_and_upsert() {
    let (store, _temp_file) = setup_store().await;
    assert!(store.ai_settings(1).await.unwrap().is_none());

    let settings = AiSettings {
        api_key: Some("key-1".to_string()),
        system_prompt: Some("你是一位國小老師".to_string()),
        model_name: None,
        base_url: None,
    };
    store.upsert_ai_settings(1, &settings).await.unwrap();

    let updated = AiSettings {
        api_key: Some("key-2".to_string()),
        ..settings
    };
    store.upsert_ai_settings(1, &updated).await.unwrap();

    let stored = store.ai_settings(1).await.unwrap().unwrap();
    assert_eq!(stored.api_key.as_deref(), Some("key-2"));
    assert_eq!(stored.system_prompt.as_deref(), Some("你是一位國小老師"));
}

#[tokio::test]
async fn test_review_rows_filter_wrong_answers() {
    let (store, _temp_file) = setup_store().await;
    let task = store.create_task(1, sample_task("社會", "台灣地理")).await.unwrap();

    let mut wrong = sample_progress(task.id, 100);
    wrong.score = Some(70.0);
    store.create_progress(1, wrong).await.unwrap();

    let mut perfect = sample_progress(task.id, 100);
    perfect.score = Some(100.0);
    store.create_progress(1, perfect).await.unwrap();

    let filter = ReviewFilter {
        subject: "社會".to_string(),
        start: NaiveDate::from_ymd_opt(2024, 3, 1),
        end: NaiveDate::from_ymd_opt(2024, 3, 31),
    };
    let rows = store.review_rows(1, &filter).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].score, Some(70.0));

    // Another owner sees nothing.
    let foreign = store.review_rows(2, &filter).await.unwrap();
    assert!(foreign.is_empty());
}

#[tokio::test]
async fn test_recent_errors_respects_limit() {
    let (store, _temp_file) = setup_store().await;
    let task = store.create_task(1, sample_task("數學", "分數乘法")).await.unwrap();
    for score in [60.0, 70.0, 80.0] {
        let mut progress = sample_progress(task.id, 50);
        progress.score = Some(score);
        store.create_progress(1, progress).await.unwrap();
    }

    let errors = store.recent_errors(1, "數學", 2).await.unwrap();
    assert_eq!(errors.len(), 2);
}

#[tokio::test]
async fn test_set_corrected_and_save_insight_are_owner_scoped() {
    let (store, _temp_file) = setup_store().await;
    let task = store.create_task(1, sample_task("社會", "台灣地理")).await.unwrap();
    let progress = store.create_progress(1, sample_progress(task.id, 50)).await.unwrap();

    assert!(matches!(
        store.set_corrected(2, progress.id, true).await,
        Err(StoreError::NotFound)
    ));
    store.set_corrected(1, progress.id, true).await.unwrap();

    assert!(matches!(
        store.save_insight(2, progress.id, "診斷").await,
        Err(StoreError::NotFound)
    ));
    store.save_insight(1, progress.id, "時序觀念混淆").await.unwrap();

    let fetched = store.get_progress(1, progress.id).await.unwrap();
    assert!(fetched.is_corrected);
    assert_eq!(fetched.ai_insight.as_deref(), Some("時序觀念混淆"));
}
