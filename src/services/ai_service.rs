use chrono::Utc;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::{AiAnalysis, AiReport, Application, Institution};
use crate::error::ApiError;
use crate::services::ai_client::AiClient;

/// Orchestrates one scoring run: snapshot -> running row -> external call ->
/// persisted result + report (one transaction). A crash while the external
/// call is in flight leaves a `running` row that only a manual retry clears.
pub struct AiService {
    pool: PgPool,
    client: AiClient,
}

pub struct AnalysisOutcome {
    pub analysis: AiAnalysis,
    pub report: AiReport,
}

impl AiService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            client: AiClient::from_config(),
        }
    }

    /// Create a fresh analysis row for the application and run it.
    pub async fn process(&self, application_id: Uuid) -> Result<AnalysisOutcome, ApiError> {
        let application: Option<Application> =
            sqlx::query_as("SELECT * FROM applications WHERE id = $1")
                .bind(application_id)
                .fetch_optional(&self.pool)
                .await?;
        let application =
            application.ok_or_else(|| ApiError::not_found("Application not found"))?;

        let institution: Option<Institution> =
            sqlx::query_as("SELECT * FROM institutions WHERE id = $1")
                .bind(application.institution_id)
                .fetch_optional(&self.pool)
                .await?;
        let institution =
            institution.ok_or_else(|| ApiError::not_found("Institution not found"))?;

        let input_data = json!({
            "application_id": application.id,
            "meta": {
                "institution_id": application.institution_id,
                "submitted_by": application.submitted_by,
                "status": application.status,
                "approved_by": application.approved_by,
            },
        });

        let analysis: AiAnalysis = sqlx::query_as(
            "INSERT INTO ai_analyses \
             (application_id, institution_id, input_data, status, run_count, run_at) \
             VALUES ($1, $2, $3, 'running', 1, $4) \
             RETURNING *",
        )
        .bind(application.id)
        .bind(application.institution_id)
        .bind(&input_data)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        self.run(analysis, &application, &institution).await
    }

    /// Reuse the stored snapshot, bump run_count, re-run.
    pub async fn retry(&self, analysis_id: Uuid) -> Result<AnalysisOutcome, ApiError> {
        let analysis: Option<AiAnalysis> =
            sqlx::query_as("SELECT * FROM ai_analyses WHERE id = $1")
                .bind(analysis_id)
                .fetch_optional(&self.pool)
                .await?;
        let analysis = analysis.ok_or_else(|| ApiError::not_found("AI analysis not found"))?;

        let application: Option<Application> =
            sqlx::query_as("SELECT * FROM applications WHERE id = $1")
                .bind(analysis.application_id)
                .fetch_optional(&self.pool)
                .await?;
        let application =
            application.ok_or_else(|| ApiError::not_found("Application not found"))?;

        let institution: Option<Institution> =
            sqlx::query_as("SELECT * FROM institutions WHERE id = $1")
                .bind(application.institution_id)
                .fetch_optional(&self.pool)
                .await?;
        let institution =
            institution.ok_or_else(|| ApiError::not_found("Institution not found"))?;

        let analysis: AiAnalysis = sqlx::query_as(
            "UPDATE ai_analyses \
             SET status = 'running', run_count = run_count + 1, run_at = $2, error = NULL \
             WHERE id = $1 \
             RETURNING *",
        )
        .bind(analysis.id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        self.run(analysis, &application, &institution).await
    }

    async fn run(
        &self,
        analysis: AiAnalysis,
        application: &Application,
        institution: &Institution,
    ) -> Result<AnalysisOutcome, ApiError> {
        match self.client.score(&analysis.input_data).await {
            Ok(result) => {
                self.complete(analysis, application, institution, result.data)
                    .await
            }
            Err(e) => {
                let message = e.to_string();
                let failed = self.mark_failed(analysis.id, &message).await;
                if let Err(save_err) = failed {
                    tracing::error!(
                        analysis_id = %analysis.id,
                        "failed to persist analysis failure: {}",
                        save_err
                    );
                }
                Err(ApiError::AiAnalysisFailed {
                    message: format!("AI analysis failed: {}", message),
                    analysis_id: analysis.id,
                })
            }
        }
    }

    async fn complete(
        &self,
        analysis: AiAnalysis,
        application: &Application,
        institution: &Institution,
        output: Value,
    ) -> Result<AnalysisOutcome, ApiError> {
        let scores = output.get("scores").cloned().unwrap_or(json!({}));
        let final_decision = output.get("final_decision").cloned().unwrap_or(json!({}));
        let total_score = scores
            .get("total_score")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let final_status = final_decision
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("Pending")
            .to_string();

        // Result and report land together or not at all; a crash between the
        // two cannot leave a completed analysis without its report.
        let mut tx = self.pool.begin().await?;
        let analysis: AiAnalysis = sqlx::query_as(
            "UPDATE ai_analyses \
             SET ai_output = $2, scores = $3, final_decision = $4, total_score = $5, \
                 final_status = $6, status = 'completed', error = NULL \
             WHERE id = $1 \
             RETURNING *",
        )
        .bind(analysis.id)
        .bind(&output)
        .bind(&scores)
        .bind(&final_decision)
        .bind(total_score)
        .bind(&final_status)
        .fetch_one(&mut *tx)
        .await?;

        let report_url = output
            .get("report_url")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let report: AiReport = sqlx::query_as(
            "INSERT INTO ai_reports (application_id, ai_analysis_id, report_title, report_url) \
             VALUES ($1, $2, $3, $4) \
             RETURNING *",
        )
        .bind(application.id)
        .bind(analysis.id)
        .bind(format!("AI Verification Report - {}", institution.name))
        .bind(report_url)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(
            analysis_id = %analysis.id,
            application_id = %application.id,
            total_score,
            final_status = %final_status,
            "AI analysis completed"
        );

        Ok(AnalysisOutcome { analysis, report })
    }

    async fn mark_failed(&self, analysis_id: Uuid, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE ai_analyses SET status = 'failed', error = $2 WHERE id = $1")
            .bind(analysis_id)
            .bind(error)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_by_application(
        &self,
        application_id: Uuid,
    ) -> Result<Vec<AiAnalysis>, ApiError> {
        let analyses = sqlx::query_as(
            "SELECT * FROM ai_analyses WHERE application_id = $1 ORDER BY created_at DESC",
        )
        .bind(application_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(analyses)
    }

    pub async fn get(&self, analysis_id: Uuid) -> Result<AiAnalysis, ApiError> {
        let analysis: Option<AiAnalysis> =
            sqlx::query_as("SELECT * FROM ai_analyses WHERE id = $1")
                .bind(analysis_id)
                .fetch_optional(&self.pool)
                .await?;
        analysis.ok_or_else(|| ApiError::not_found("AI analysis not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::AnalysisStatus;

    #[test]
    fn analysis_status_values_round_trip() {
        for status in [
            AnalysisStatus::Running,
            AnalysisStatus::Completed,
            AnalysisStatus::Failed,
        ] {
            assert_eq!(AnalysisStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn score_extraction_defaults() {
        // Shape handling mirrors `complete`: absent fields default rather
        // than erroring, matching a scorer that returns partial output.
        let output = json!({ "scores": { "total_score": 87.5 } });
        let total = output
            .get("scores")
            .and_then(|s| s.get("total_score"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        assert_eq!(total, 87.5);

        let empty = json!({});
        let status = empty
            .get("final_decision")
            .and_then(|d| d.get("status"))
            .and_then(Value::as_str)
            .unwrap_or("Pending");
        assert_eq!(status, "Pending");
    }
}
