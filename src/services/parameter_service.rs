use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::database::models::{InstitutionParameter, ParameterTemplate};
use crate::error::ApiError;

/// One row of the merge view: an active template left-joined with the
/// institution's submitted value, defaulted when absent.
#[derive(Debug, Clone, Serialize)]
pub struct MergedParameter {
    pub parameter_template_id: Uuid,
    pub parameter_category: String,
    pub parameter_name: String,
    pub norm_value: String,
    pub authority: String,
    pub criticality: String,
    pub institution_value: String,
    pub is_compliant: bool,
    pub remarks: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParameterEntry {
    pub parameter_template_id: Uuid,
    #[serde(default)]
    pub institution_value: String,
    #[serde(default)]
    pub is_compliant: bool,
    #[serde(default)]
    pub remarks: String,
}

/// Pure merge: one output row per active template, in template order.
/// Values for inactive templates are dropped.
pub fn merge_parameters(
    templates: &[ParameterTemplate],
    values: &[InstitutionParameter],
) -> Vec<MergedParameter> {
    let by_template: HashMap<Uuid, &InstitutionParameter> = values
        .iter()
        .map(|value| (value.parameter_template_id, value))
        .collect();

    templates
        .iter()
        .filter(|template| template.is_active)
        .map(|template| {
            let value = by_template.get(&template.id);
            MergedParameter {
                parameter_template_id: template.id,
                parameter_category: template.parameter_category.clone(),
                parameter_name: template.parameter_name.clone(),
                norm_value: template.norm_value.clone(),
                authority: template.authority.clone(),
                criticality: template.criticality.clone(),
                institution_value: value.map(|v| v.institution_value.clone()).unwrap_or_default(),
                is_compliant: value.map(|v| v.is_compliant).unwrap_or(false),
                remarks: value.map(|v| v.remarks.clone()).unwrap_or_default(),
            }
        })
        .collect()
}

/// Split a save batch into entries matching an active template and the
/// skipped template ids (missing or inactive). Skipped entries are dropped
/// silently, not erred.
pub fn partition_batch(
    entries: Vec<ParameterEntry>,
    active_template_ids: &[Uuid],
) -> (Vec<ParameterEntry>, Vec<Uuid>) {
    let mut accepted = Vec::new();
    let mut skipped = Vec::new();
    for entry in entries {
        if active_template_ids.contains(&entry.parameter_template_id) {
            accepted.push(entry);
        } else {
            skipped.push(entry.parameter_template_id);
        }
    }
    (accepted, skipped)
}

/// Collapse repeated template ids within one batch: the last entry wins, so
/// a single row is written per (institution, template) pair.
pub fn coalesce_entries(entries: Vec<ParameterEntry>) -> Vec<ParameterEntry> {
    let mut out: Vec<ParameterEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        match out
            .iter_mut()
            .find(|e| e.parameter_template_id == entry.parameter_template_id)
        {
            Some(existing) => *existing = entry,
            None => out.push(entry),
        }
    }
    out
}

pub struct ParameterService {
    pool: PgPool,
}

/// Outcome of a batch save.
#[derive(Debug, Serialize)]
pub struct SaveOutcome {
    pub saved: usize,
    pub skipped: Vec<Uuid>,
}

impl ParameterService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn active_templates(&self) -> Result<Vec<ParameterTemplate>, ApiError> {
        let templates = sqlx::query_as(
            "SELECT * FROM parameter_templates WHERE is_active = TRUE \
             ORDER BY parameter_category, parameter_name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(templates)
    }

    /// Merge view for one institution.
    pub async fn merged_view(
        &self,
        institution_id: Uuid,
    ) -> Result<Vec<MergedParameter>, ApiError> {
        let templates = self.active_templates().await?;
        let values: Vec<InstitutionParameter> =
            sqlx::query_as("SELECT * FROM institution_parameters WHERE institution_id = $1")
                .bind(institution_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(merge_parameters(&templates, &values))
    }

    /// Batch upsert: each valid entry replaces the institution's value for
    /// that template; entries without a matching active template are skipped.
    pub async fn save_batch(
        &self,
        institution_id: Uuid,
        entries: Vec<ParameterEntry>,
    ) -> Result<SaveOutcome, ApiError> {
        let templates = self.active_templates().await?;
        let active_ids: Vec<Uuid> = templates.iter().map(|t| t.id).collect();
        let (accepted, skipped) = partition_batch(entries, &active_ids);
        let accepted = coalesce_entries(accepted);

        let now = Utc::now();
        for entry in &accepted {
            sqlx::query(
                "INSERT INTO institution_parameters \
                 (institution_id, parameter_template_id, institution_value, is_compliant, remarks, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (institution_id, parameter_template_id) \
                 DO UPDATE SET institution_value = EXCLUDED.institution_value, \
                               is_compliant = EXCLUDED.is_compliant, \
                               remarks = EXCLUDED.remarks, \
                               updated_at = EXCLUDED.updated_at",
            )
            .bind(institution_id)
            .bind(entry.parameter_template_id)
            .bind(&entry.institution_value)
            .bind(entry.is_compliant)
            .bind(&entry.remarks)
            .bind(now)
            .execute(&self.pool)
            .await?;
        }

        if !skipped.is_empty() {
            tracing::debug!(
                institution_id = %institution_id,
                skipped = skipped.len(),
                "parameter entries skipped (missing or inactive template)"
            );
        }

        Ok(SaveOutcome {
            saved: accepted.len(),
            skipped,
        })
    }

    /// Legacy create path: refuses when the institution already has any
    /// parameter rows.
    pub async fn create_initial(
        &self,
        institution_id: Uuid,
        entries: Vec<ParameterEntry>,
    ) -> Result<SaveOutcome, ApiError> {
        let (existing,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM institution_parameters WHERE institution_id = $1",
        )
        .bind(institution_id)
        .fetch_one(&self.pool)
        .await?;

        if existing > 0 {
            return Err(ApiError::bad_request(
                "Parameters already exist for this institution. Cannot add again.",
            ));
        }

        self.save_batch(institution_id, entries).await
    }

    /// Legacy update path: touches only rows the institution already has.
    /// Entries without an existing row are skipped; a batch where nothing
    /// belongs to the institution is a 403.
    pub async fn update_existing(
        &self,
        institution_id: Uuid,
        entries: Vec<ParameterEntry>,
    ) -> Result<SaveOutcome, ApiError> {
        let owned: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT parameter_template_id FROM institution_parameters WHERE institution_id = $1",
        )
        .bind(institution_id)
        .fetch_all(&self.pool)
        .await?;
        let owned_ids: Vec<Uuid> = owned.into_iter().map(|(id,)| id).collect();

        let (accepted, skipped) = partition_batch(entries, &owned_ids);
        if accepted.is_empty() {
            return Err(ApiError::forbidden(
                "No parameters belong to this institution",
            ));
        }
        let accepted = coalesce_entries(accepted);

        let now = Utc::now();
        for entry in &accepted {
            sqlx::query(
                "UPDATE institution_parameters \
                 SET institution_value = $3, is_compliant = $4, remarks = $5, updated_at = $6 \
                 WHERE institution_id = $1 AND parameter_template_id = $2",
            )
            .bind(institution_id)
            .bind(entry.parameter_template_id)
            .bind(&entry.institution_value)
            .bind(entry.is_compliant)
            .bind(&entry.remarks)
            .bind(now)
            .execute(&self.pool)
            .await?;
        }

        Ok(SaveOutcome {
            saved: accepted.len(),
            skipped,
        })
    }

    pub async fn list_for_institution(
        &self,
        institution_id: Uuid,
    ) -> Result<Vec<InstitutionParameter>, ApiError> {
        let parameters =
            sqlx::query_as("SELECT * FROM institution_parameters WHERE institution_id = $1")
                .bind(institution_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn template(name: &str, active: bool) -> ParameterTemplate {
        ParameterTemplate {
            id: Uuid::new_v4(),
            parameter_category: "Infrastructure".to_string(),
            parameter_name: name.to_string(),
            norm_value: ">= 10".to_string(),
            authority: "AICTE".to_string(),
            criticality: "medium".to_string(),
            description: None,
            is_active: active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn value_for(template: &ParameterTemplate, value: &str) -> InstitutionParameter {
        InstitutionParameter {
            id: Uuid::new_v4(),
            institution_id: Uuid::new_v4(),
            parameter_template_id: template.id,
            institution_value: value.to_string(),
            is_compliant: true,
            remarks: "ok".to_string(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn absent_values_get_defaults() {
        let templates = vec![template("Labs", true), template("Library", true)];
        let values = vec![value_for(&templates[0], "12")];

        let merged = merge_parameters(&templates, &values);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].institution_value, "12");
        assert!(merged[0].is_compliant);
        assert_eq!(merged[1].institution_value, "");
        assert!(!merged[1].is_compliant);
        assert_eq!(merged[1].remarks, "");
    }

    #[test]
    fn inactive_templates_excluded_from_merge() {
        let templates = vec![template("Labs", true), template("Retired metric", false)];
        let values = vec![value_for(&templates[1], "5")];

        let merged = merge_parameters(&templates, &values);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].parameter_name, "Labs");
    }

    #[test]
    fn batch_entries_without_active_template_are_skipped() {
        let active = Uuid::new_v4();
        let unknown = Uuid::new_v4();
        let entries = vec![
            ParameterEntry {
                parameter_template_id: active,
                institution_value: "9".to_string(),
                is_compliant: false,
                remarks: String::new(),
            },
            ParameterEntry {
                parameter_template_id: unknown,
                institution_value: "3".to_string(),
                is_compliant: true,
                remarks: String::new(),
            },
        ];

        let (accepted, skipped) = partition_batch(entries, &[active]);
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].parameter_template_id, active);
        assert_eq!(skipped, vec![unknown]);
    }

    #[test]
    fn repeated_template_in_batch_keeps_latest_value() {
        let template_id = Uuid::new_v4();
        let other_id = Uuid::new_v4();
        let entry = |id, value: &str| ParameterEntry {
            parameter_template_id: id,
            institution_value: value.to_string(),
            is_compliant: false,
            remarks: String::new(),
        };

        let coalesced = coalesce_entries(vec![
            entry(template_id, "first"),
            entry(other_id, "kept"),
            entry(template_id, "latest"),
        ]);

        // One row per template pair, last write wins, order preserved.
        assert_eq!(coalesced.len(), 2);
        assert_eq!(coalesced[0].parameter_template_id, template_id);
        assert_eq!(coalesced[0].institution_value, "latest");
        assert_eq!(coalesced[1].institution_value, "kept");
    }

    #[test]
    fn entry_defaults_from_partial_json() {
        let entry: ParameterEntry = serde_json::from_value(serde_json::json!({
            "parameter_template_id": Uuid::new_v4(),
        }))
        .unwrap();
        assert_eq!(entry.institution_value, "");
        assert!(!entry.is_compliant);
    }
}
