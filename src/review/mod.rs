//! Wrong-answer review: parsing of student notes into page references,
//! weakness tags and a cleaned note, plus the aggregation behind the
//! teacher analysis board and the AI prompt builders.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::store::{AnalysisRow, ErrorRow, ReviewRow};

static PAGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[pP]\.?\s?\d+.*?\d+").unwrap());

#[derive(Debug, Clone, Serialize)]
pub struct ReviewEntry {
    pub id: i64,
    pub subject: String,
    pub unit: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub score: Option<f64>,
    pub date: String,
    pub is_corrected: bool,
    pub pages: String,
    pub tags: Vec<String>,
    pub clean_note: String,
    pub insight: String,
}

/// Splits a student note into page references, subject-specific
/// weakness tags and the note text with page markers removed. A stored
/// AI insight takes the place of keyword tagging.
pub fn parse_note(subject: &str, note: &str, stored_insight: Option<&str>) -> (String, Vec<String>, String, String) {
    let pages = PAGE_RE
        .find(note)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    let mut tags = Vec::new();
    let mut insight = String::new();

    match stored_insight {
        Some(stored) if !stored.is_empty() => insight = stored.to_string(),
        _ => {
            if subject.contains("社會") {
                if ["時序", "年份"].iter().any(|k| note.contains(k)) {
                    tags.push("🗓️ 時序".to_string());
                }
            } else if subject.contains("數學") {
                if ["計算", "算式"].iter().any(|k| note.contains(k)) {
                    tags.push("🧮 計算".to_string());
                }
                if note.contains("單位") {
                    tags.push("📏 單位細節".to_string());
                }
            }
        }
    }

    let clean_note = PAGE_RE.replace_all(note, "").trim().to_string();
    (pages, tags, clean_note, insight)
}

pub fn build_review_entries(rows: Vec<ReviewRow>) -> Vec<ReviewEntry> {
    rows.into_iter()
        .map(|row| {
            let (pages, tags, clean_note, insight) =
                parse_note(&row.subject, &row.student_note, row.ai_insight.as_deref());
            ReviewEntry {
                id: row.id,
                subject: row.subject,
                unit: row.unit,
                task_type: row.task_type,
                score: row.score,
                date: row.date.to_string(),
                is_corrected: row.is_corrected,
                pages,
                tags,
                clean_note,
                insight,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisSummary {
    pub total_count: usize,
    pub avg_score: f64,
    pub failed_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitStat {
    pub unit: String,
    pub count: usize,
    pub avg: f64,
    pub level: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TeacherAnalysis {
    pub summary: AnalysisSummary,
    pub unit_stats: Vec<UnitStat>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn level_for(avg: f64) -> &'static str {
    if avg >= 95.0 {
        "精熟"
    } else if avg >= 85.0 {
        "尚可"
    } else {
        "待加強"
    }
}

/// Aggregates joined task/progress rows into the analysis board data:
/// overall average, count below 90, and per-unit averages sorted worst
/// first.
pub fn analyze(rows: &[AnalysisRow]) -> TeacherAnalysis {
    if rows.is_empty() {
        return TeacherAnalysis::default();
    }

    let mut total_score = 0i64;
    let mut failed_count = 0usize;
    let mut unit_map: Vec<(String, i64, usize)> = Vec::new();

    for row in rows {
        let score = row.score.map(|s| s as i64).unwrap_or(0);
        total_score += score;
        if score < 90 {
            failed_count += 1;
        }

        match unit_map.iter_mut().find(|(unit, _, _)| *unit == row.unit) {
            Some((_, total, count)) => {
                *total += score;
                *count += 1;
            }
            None => unit_map.push((row.unit.clone(), score, 1)),
        }
    }

    let mut unit_stats: Vec<UnitStat> = unit_map
        .into_iter()
        .map(|(unit, total, count)| {
            let avg = round1(total as f64 / count as f64);
            UnitStat {
                unit,
                count,
                avg,
                level: level_for(avg).to_string(),
            }
        })
        .collect();
    unit_stats.sort_by(|a, b| a.avg.partial_cmp(&b.avg).unwrap_or(std::cmp::Ordering::Equal));

    TeacherAnalysis {
        summary: AnalysisSummary {
            total_count: rows.len(),
            avg_score: round1(total_score as f64 / rows.len() as f64),
            failed_count,
        },
        unit_stats,
    }
}

/// Grade rendered for prompts: elementary grades as-is, 7 and up as
/// junior high years.
pub fn grade_label(grade: i64) -> String {
    if grade <= 6 {
        format!("{}年級", grade)
    } else {
        format!("國中{}年級", grade - 6)
    }
}

pub fn diagnosis_prompt(
    grade_text: &str,
    publisher: &str,
    subject: &str,
    unit: &str,
    note: &str,
) -> String {
    format!(
        "目前的教材背景是：{}、版本：{}。請針對學生在『{}』科單元『{}』遇到的錯誤內容：『{}』進行精簡診斷，200字內。",
        grade_text, publisher, subject, unit, note
    )
}

pub fn quiz_prompt(publisher: &str, grade_text: &str, subject: &str, errors: &[ErrorRow]) -> String {
    let mut context = String::new();
    for (i, row) in errors.iter().enumerate() {
        let score = row.score.map(|s| s.to_string()).unwrap_or_default();
        context.push_str(&format!("{}. [{}] {} (得分:{})\n", i + 1, row.unit, row.title, score));
    }

    format!(
        "請針對『{}版』{}『{}』，根據以下真實錯題數據出一份補救練習：\n{}\n要求：3 題選擇題與 2 題應用題，並附上答案與解析。",
        publisher, grade_text, subject, context
    )
}
