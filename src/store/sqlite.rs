use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::info;

use super::error::StoreError;
use super::sync::{self, ProgressSync};
use super::types::{
    default_publisher, AiSettings, AnalysisRow, ErrorRow, ExamDates, NewProgress, NewTask,
    Progress, ProgressPatch, ReviewFilter, ReviewRow, SubjectConfig, SubjectProfile, Task,
    TaskPatch, TaskProgressView, TaskStatus,
};
use super::StudyStore;

pub struct SqliteStudyStore {
    pub(crate) pool: SqlitePool,
}

impl SqliteStudyStore {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        info!("Initializing SQLite study store at {}", database_url);
        let pool = SqlitePool::connect(database_url).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject TEXT NOT NULL,
                title TEXT NOT NULL,
                task_type TEXT NOT NULL,
                date TEXT,
                status TEXT NOT NULL,
                unit TEXT NOT NULL DEFAULT '',
                user_id INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS progresses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id INTEGER NOT NULL REFERENCES tasks(id),
                user_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                progress_percent INTEGER NOT NULL DEFAULT 0,
                student_note TEXT NOT NULL DEFAULT '',
                teacher_feedback TEXT NOT NULL DEFAULT '',
                score REAL,
                is_corrected INTEGER NOT NULL DEFAULT 0,
                ai_insight TEXT
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subject_configs (
                user_id INTEGER NOT NULL,
                subject_name TEXT NOT NULL,
                publisher TEXT NOT NULL,
                grade INTEGER NOT NULL,
                midterm_date TEXT,
                final_date TEXT,
                UNIQUE(user_id, subject_name)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ai_settings (
                user_id INTEGER PRIMARY KEY,
                api_key TEXT,
                system_prompt TEXT,
                model_name TEXT,
                base_url TEXT
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn row_to_task(row: sqlx::sqlite::SqliteRow) -> Result<Task, StoreError> {
        Ok(Task {
            id: row.get("id"),
            subject: row.get("subject"),
            title: row.get("title"),
            task_type: row.get("task_type"),
            date: row.get("date"),
            status: TaskStatus::parse(row.get("status"))?,
            unit: row.get("unit"),
            user_id: row.get("user_id"),
        })
    }

    fn row_to_progress(row: sqlx::sqlite::SqliteRow) -> Progress {
        Progress {
            id: row.get("id"),
            task_id: row.get("task_id"),
            user_id: row.get("user_id"),
            date: row.get("date"),
            progress_percent: row.get("progress_percent"),
            student_note: row.get("student_note"),
            teacher_feedback: row.get("teacher_feedback"),
            score: row.get("score"),
            is_corrected: row.get("is_corrected"),
            ai_insight: row.get("ai_insight"),
        }
    }

    async fn fetch_owned_task(
        tx: &mut Transaction<'_, Sqlite>,
        owner: i64,
        task_id: i64,
    ) -> Result<Task, StoreError> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ? AND user_id = ?")
            .bind(task_id)
            .bind(owner)
            .fetch_optional(&mut **tx)
            .await?;

        match row {
            Some(row) => Self::row_to_task(row),
            None => Err(StoreError::NotFound),
        }
    }

    /// The task's current progress row: the first one ever created for
    /// it. The schema permits more rows, but the sync rule and merged
    /// views address only this one.
    async fn current_progress(
        tx: &mut Transaction<'_, Sqlite>,
        task_id: i64,
    ) -> Result<Option<Progress>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM progresses WHERE task_id = ? ORDER BY id ASC LIMIT 1",
        )
        .bind(task_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(row.map(Self::row_to_progress))
    }

    /// Status → Percent direction of the sync rule, executed inside the
    /// transaction that carries the task's status write.
    async fn apply_status_sync(
        tx: &mut Transaction<'_, Sqlite>,
        owner: i64,
        task_id: i64,
        status: TaskStatus,
    ) -> Result<(), StoreError> {
        let current = Self::current_progress(tx, task_id).await?;

        match sync::sync_for_status(status, current.is_some()) {
            ProgressSync::SetPercent(percent) => {
                if let Some(progress) = current {
                    sqlx::query("UPDATE progresses SET progress_percent = ? WHERE id = ?")
                        .bind(percent)
                        .bind(progress.id)
                        .execute(&mut **tx)
                        .await?;
                }
            }
            ProgressSync::CreateCompleted => {
                sqlx::query(
                    r#"
                    INSERT INTO progresses
                    (task_id, user_id, date, progress_percent, student_note, teacher_feedback, score, is_corrected)
                    VALUES (?, ?, ?, 100, ?, '', 0, 0)
                    "#,
                )
                .bind(task_id)
                .bind(owner)
                .bind(Utc::now().date_naive())
                .bind(sync::STATUS_SYNC_NOTE)
                .execute(&mut **tx)
                .await?;
            }
            ProgressSync::None => {}
        }

        Ok(())
    }

    fn check_percent(percent: i64) -> Result<(), StoreError> {
        if !(0..=100).contains(&percent) {
            return Err(StoreError::validation(format!(
                "progress_percent must be between 0 and 100, got {}",
                percent
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl StudyStore for SqliteStudyStore {
    async fn create_task(&self, owner: i64, task: NewTask) -> Result<Task, StoreError> {
        let status = task.status.unwrap_or_default();

        let result = sqlx::query(
            r#"
            INSERT INTO tasks (subject, title, task_type, date, status, unit, user_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.subject)
        .bind(&task.title)
        .bind(&task.task_type)
        .bind(task.date)
        .bind(status.label())
        .bind(&task.unit)
        .bind(owner)
        .execute(&self.pool)
        .await?;

        Ok(Task {
            id: result.last_insert_rowid(),
            subject: task.subject,
            title: task.title,
            task_type: task.task_type,
            date: Some(task.date),
            status,
            unit: task.unit,
            user_id: owner,
        })
    }

    async fn list_tasks(&self, owner: i64) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE user_id = ? ORDER BY id ASC")
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_task).collect()
    }

    async fn get_task(&self, owner: i64, task_id: i64) -> Result<Task, StoreError> {
        let mut tx = self.pool.begin().await?;
        let task = Self::fetch_owned_task(&mut tx, owner, task_id).await?;
        tx.commit().await?;
        Ok(task)
    }

    async fn update_task(
        &self,
        owner: i64,
        task_id: i64,
        patch: TaskPatch,
    ) -> Result<Task, StoreError> {
        let mut tx = self.pool.begin().await?;

        let mut task = Self::fetch_owned_task(&mut tx, owner, task_id).await?;

        if let Some(subject) = patch.subject {
            task.subject = subject;
        }
        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(task_type) = patch.task_type {
            task.task_type = task_type;
        }
        if let Some(date) = patch.date {
            task.date = Some(date);
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(unit) = patch.unit {
            task.unit = unit;
        }

        sqlx::query(
            r#"
            UPDATE tasks
            SET subject = ?, title = ?, task_type = ?, date = ?, status = ?, unit = ?
            WHERE id = ?
            "#,
        )
        .bind(&task.subject)
        .bind(&task.title)
        .bind(&task.task_type)
        .bind(task.date)
        .bind(task.status.label())
        .bind(&task.unit)
        .bind(task_id)
        .execute(&mut *tx)
        .await?;

        // The paired progress write commits or rolls back with the
        // status write above.
        if let Some(status) = patch.status {
            Self::apply_status_sync(&mut tx, owner, task_id, status).await?;
        }

        tx.commit().await?;
        Ok(task)
    }

    async fn delete_task(&self, owner: i64, task_id: i64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        Self::fetch_owned_task(&mut tx, owner, task_id).await?;

        // Progress rows go first so the task's foreign key never dangles.
        sqlx::query("DELETE FROM progresses WHERE task_id = ?")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn create_progress(
        &self,
        owner: i64,
        progress: NewProgress,
    ) -> Result<Progress, StoreError> {
        let percent = progress.progress_percent.unwrap_or(0);
        Self::check_percent(percent)?;

        let mut tx = self.pool.begin().await?;

        // The referenced task must belong to the caller.
        let task_owned = sqlx::query("SELECT id FROM tasks WHERE id = ? AND user_id = ?")
            .bind(progress.task_id)
            .bind(owner)
            .fetch_optional(&mut *tx)
            .await?;
        if task_owned.is_none() {
            return Err(StoreError::Unauthorized);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO progresses
            (task_id, user_id, date, progress_percent, student_note, teacher_feedback, score, is_corrected)
            VALUES (?, ?, ?, ?, ?, '', ?, 0)
            "#,
        )
        .bind(progress.task_id)
        .bind(owner)
        .bind(progress.date)
        .bind(percent)
        .bind(&progress.student_note)
        .bind(progress.score)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Progress {
            id: result.last_insert_rowid(),
            task_id: progress.task_id,
            user_id: owner,
            date: progress.date,
            progress_percent: percent,
            student_note: progress.student_note,
            teacher_feedback: String::new(),
            score: progress.score,
            is_corrected: false,
            ai_insight: None,
        })
    }

    async fn get_progress(&self, owner: i64, progress_id: i64) -> Result<Progress, StoreError> {
        let row = sqlx::query("SELECT * FROM progresses WHERE id = ? AND user_id = ?")
            .bind(progress_id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_progress).ok_or(StoreError::NotFound)
    }

    async fn update_progress(
        &self,
        owner: i64,
        progress_id: i64,
        patch: ProgressPatch,
    ) -> Result<Progress, StoreError> {
        if let Some(percent) = patch.progress_percent {
            Self::check_percent(percent)?;
        }

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM progresses WHERE id = ?")
            .bind(progress_id)
            .fetch_optional(&mut *tx)
            .await?;
        let mut progress = row.map(Self::row_to_progress).ok_or(StoreError::NotFound)?;

        let task_owned = sqlx::query("SELECT id FROM tasks WHERE id = ? AND user_id = ?")
            .bind(progress.task_id)
            .bind(owner)
            .fetch_optional(&mut *tx)
            .await?;
        if task_owned.is_none() {
            return Err(StoreError::Unauthorized);
        }

        if let Some(date) = patch.date {
            progress.date = date;
        }
        if let Some(percent) = patch.progress_percent {
            progress.progress_percent = percent;
        }
        if let Some(note) = patch.student_note {
            progress.student_note = note;
        }
        if let Some(feedback) = patch.teacher_feedback {
            progress.teacher_feedback = feedback;
        }
        if let Some(score) = patch.score {
            progress.score = Some(score);
        }

        sqlx::query(
            r#"
            UPDATE progresses
            SET date = ?, progress_percent = ?, student_note = ?, teacher_feedback = ?, score = ?
            WHERE id = ?
            "#,
        )
        .bind(progress.date)
        .bind(progress.progress_percent)
        .bind(&progress.student_note)
        .bind(&progress.teacher_feedback)
        .bind(progress.score)
        .bind(progress_id)
        .execute(&mut *tx)
        .await?;

        // Percent → Status direction of the sync rule: only the current
        // progress row drives the task's status.
        if patch.progress_percent.is_some() {
            let current = Self::current_progress(&mut tx, progress.task_id).await?;
            if current.map(|p| p.id) == Some(progress_id) {
                let status = sync::status_for_percent(progress.progress_percent);
                sqlx::query("UPDATE tasks SET status = ? WHERE id = ?")
                    .bind(status.label())
                    .bind(progress.task_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(progress)
    }

    async fn list_tasks_with_progress(
        &self,
        owner: i64,
    ) -> Result<Vec<TaskProgressView>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT t.id AS task_id, t.subject, t.title, t.task_type, t.unit, t.date,
                   p.id AS progress_id, p.progress_percent, p.student_note, p.score
            FROM tasks t
            LEFT JOIN progresses p
                ON p.id = (SELECT MIN(id) FROM progresses WHERE task_id = t.id)
            WHERE t.user_id = ?
            ORDER BY t.id ASC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        let views = rows
            .into_iter()
            .map(|row| TaskProgressView {
                task_id: row.get("task_id"),
                subject: row.get("subject"),
                title: row.get("title"),
                task_type: row.get("task_type"),
                unit: row.get("unit"),
                target_date: row.get("date"),
                progress_percent: row
                    .get::<Option<i64>, _>("progress_percent")
                    .unwrap_or(0),
                student_note: row
                    .get::<Option<String>, _>("student_note")
                    .unwrap_or_default(),
                score: row.get("score"),
                id: row.get("progress_id"),
            })
            .collect();

        Ok(views)
    }

    async fn set_corrected(
        &self,
        owner: i64,
        progress_id: i64,
        corrected: bool,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE progresses SET is_corrected = ? WHERE id = ? AND user_id = ?",
        )
        .bind(corrected)
        .bind(progress_id)
        .bind(owner)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn save_insight(
        &self,
        owner: i64,
        progress_id: i64,
        insight: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE progresses SET ai_insight = ? WHERE id = ? AND user_id = ?",
        )
        .bind(insight)
        .bind(progress_id)
        .bind(owner)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_subject_configs(&self, owner: i64) -> Result<Vec<SubjectConfig>, StoreError> {
        let rows = sqlx::query(
            "SELECT subject_name, publisher, grade FROM subject_configs WHERE user_id = ?",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| SubjectConfig {
                subject_name: row.get("subject_name"),
                publisher: row.get("publisher"),
                grade: row.get("grade"),
            })
            .collect())
    }

    async fn upsert_subject_configs(
        &self,
        owner: i64,
        configs: &[SubjectConfig],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for config in configs {
            sqlx::query(
                r#"
                INSERT INTO subject_configs (user_id, subject_name, publisher, grade)
                VALUES (?, ?, ?, ?)
                ON CONFLICT (user_id, subject_name)
                DO UPDATE SET publisher = excluded.publisher, grade = excluded.grade
                "#,
            )
            .bind(owner)
            .bind(&config.subject_name)
            .bind(&config.publisher)
            .bind(config.grade)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn exam_dates(&self, owner: i64) -> Result<ExamDates, StoreError> {
        // Exam dates apply to every subject, so any row carrying them
        // will do.
        let row = sqlx::query(
            r#"
            SELECT midterm_date, final_date FROM subject_configs
            WHERE user_id = ? AND midterm_date IS NOT NULL
            LIMIT 1
            "#,
        )
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => ExamDates {
                midterm_date: row.get("midterm_date"),
                final_date: row.get("final_date"),
            },
            None => ExamDates {
                midterm_date: None,
                final_date: None,
            },
        })
    }

    async fn update_global_config(
        &self,
        owner: i64,
        grade: i64,
        midterm_date: Option<NaiveDate>,
        final_date: Option<NaiveDate>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE subject_configs
            SET grade = ?, midterm_date = ?, final_date = ?
            WHERE user_id = ?
            "#,
        )
        .bind(grade)
        .bind(midterm_date)
        .bind(final_date)
        .bind(owner)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn subject_profile(
        &self,
        owner: i64,
        subject: &str,
    ) -> Result<SubjectProfile, StoreError> {
        let row = sqlx::query(
            "SELECT publisher, grade FROM subject_configs WHERE user_id = ? AND subject_name = ?",
        )
        .bind(owner)
        .bind(subject)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => SubjectProfile {
                publisher: row.get("publisher"),
                grade: row.get("grade"),
            },
            None => SubjectProfile {
                publisher: default_publisher(subject).to_string(),
                grade: 6,
            },
        })
    }

    async fn ai_settings(&self, owner: i64) -> Result<Option<AiSettings>, StoreError> {
        let row = sqlx::query(
            "SELECT api_key, system_prompt, model_name, base_url FROM ai_settings WHERE user_id = ?",
        )
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| AiSettings {
            api_key: row.get("api_key"),
            system_prompt: row.get("system_prompt"),
            model_name: row.get("model_name"),
            base_url: row.get("base_url"),
        }))
    }

    async fn upsert_ai_settings(
        &self,
        owner: i64,
        settings: &AiSettings,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO ai_settings (user_id, api_key, system_prompt, model_name, base_url)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (user_id)
            DO UPDATE SET
                api_key = excluded.api_key,
                system_prompt = excluded.system_prompt,
                model_name = excluded.model_name,
                base_url = excluded.base_url
            "#,
        )
        .bind(owner)
        .bind(&settings.api_key)
        .bind(&settings.system_prompt)
        .bind(&settings.model_name)
        .bind(&settings.base_url)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn review_rows(
        &self,
        owner: i64,
        filter: &ReviewFilter,
    ) -> Result<Vec<ReviewRow>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, t.subject, t.unit, t.task_type, p.student_note, p.score,
                   p.date, p.is_corrected, p.ai_insight
            FROM tasks t
            JOIN progresses p ON t.id = p.task_id
            WHERE t.user_id = ?1
              AND p.user_id = ?1
              AND t.subject LIKE '%' || ?2 || '%'
              AND p.score < 100
              AND (?3 IS NULL OR p.date >= ?3)
              AND (?4 IS NULL OR p.date <= ?4)
            ORDER BY p.date DESC
            "#,
        )
        .bind(owner)
        .bind(&filter.subject)
        .bind(filter.start)
        .bind(filter.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ReviewRow {
                id: row.get("id"),
                subject: row.get("subject"),
                unit: row.get("unit"),
                task_type: row.get("task_type"),
                student_note: row.get("student_note"),
                score: row.get("score"),
                date: row.get("date"),
                is_corrected: row.get("is_corrected"),
                ai_insight: row.get("ai_insight"),
            })
            .collect())
    }

    async fn analysis_rows(
        &self,
        owner: i64,
        filter: &ReviewFilter,
    ) -> Result<Vec<AnalysisRow>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT t.unit, p.score
            FROM tasks t
            JOIN progresses p ON t.id = p.task_id
            WHERE t.user_id = ?1
              AND t.subject LIKE '%' || ?2 || '%'
              AND (?3 IS NULL OR p.date >= ?3)
              AND (?4 IS NULL OR p.date <= ?4)
            "#,
        )
        .bind(owner)
        .bind(&filter.subject)
        .bind(filter.start)
        .bind(filter.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| AnalysisRow {
                unit: row.get("unit"),
                score: row.get("score"),
            })
            .collect())
    }

    async fn recent_errors(
        &self,
        owner: i64,
        subject: &str,
        limit: i64,
    ) -> Result<Vec<ErrorRow>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT t.unit, t.title, p.student_note, p.score
            FROM tasks t
            JOIN progresses p ON t.id = p.task_id
            WHERE t.user_id = ?
              AND t.subject = ?
              AND p.score < 100
            ORDER BY p.date DESC
            LIMIT ?
            "#,
        )
        .bind(owner)
        .bind(subject)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ErrorRow {
                unit: row.get("unit"),
                title: row.get("title"),
                student_note: row.get("student_note"),
                score: row.get("score"),
            })
            .collect())
    }
}
