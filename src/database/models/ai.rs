use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Run state of one scoring attempt chain. A row transitions
/// running -> completed | failed only; retry moves it back to running first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Running,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Running => "running",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<AnalysisStatus> {
        match s {
            "running" => Some(AnalysisStatus::Running),
            "completed" => Some(AnalysisStatus::Completed),
            "failed" => Some(AnalysisStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AiAnalysis {
    pub id: Uuid,
    pub application_id: Uuid,
    pub institution_id: Uuid,
    /// Payload snapshot sent to the scorer; reused verbatim on retry.
    pub input_data: Value,
    pub ai_output: Option<Value>,
    pub scores: Option<Value>,
    pub final_decision: Option<Value>,
    pub total_score: Option<f64>,
    pub final_status: Option<String>,
    pub status: String,
    pub error: Option<String>,
    pub run_count: i32,
    pub run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl AiAnalysis {
    pub fn status(&self) -> Option<AnalysisStatus> {
        AnalysisStatus::parse(&self.status)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AiReport {
    pub id: Uuid,
    pub application_id: Uuid,
    pub ai_analysis_id: Uuid,
    pub report_title: String,
    pub report_url: String,
    pub storage_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
