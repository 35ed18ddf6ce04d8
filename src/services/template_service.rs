use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::ParameterTemplate;
use crate::error::ApiError;

#[derive(Debug, Clone, Deserialize)]
pub struct NewTemplate {
    pub parameter_category: String,
    pub parameter_name: String,
    pub norm_value: String,
    pub authority: String,
    #[serde(default = "default_criticality")]
    pub criticality: String,
    pub description: Option<String>,
}

fn default_criticality() -> String {
    "medium".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TemplateUpdate {
    pub parameter_category: Option<String>,
    pub parameter_name: Option<String>,
    pub norm_value: Option<String>,
    pub authority: Option<String>,
    pub criticality: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

/// Super-admin management of the shared parameter catalog.
pub struct TemplateService {
    pool: PgPool,
}

impl TemplateService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        category: Option<&str>,
        search: Option<&str>,
        is_active: Option<bool>,
    ) -> Result<Vec<ParameterTemplate>, ApiError> {
        let pattern = search.map(|s| format!("%{}%", s));
        let templates = sqlx::query_as(
            "SELECT * FROM parameter_templates \
             WHERE ($1::text IS NULL OR parameter_category = $1) \
               AND ($2::text IS NULL OR parameter_name ILIKE $2 OR description ILIKE $2) \
               AND ($3::boolean IS NULL OR is_active = $3) \
             ORDER BY parameter_category, parameter_name",
        )
        .bind(category)
        .bind(pattern)
        .bind(is_active)
        .fetch_all(&self.pool)
        .await?;
        Ok(templates)
    }

    pub async fn toggle_active(&self, template_id: Uuid) -> Result<ParameterTemplate, ApiError> {
        let existing = self.get(template_id).await?;
        let updated: ParameterTemplate = sqlx::query_as(
            "UPDATE parameter_templates SET is_active = NOT is_active, updated_at = $2 \
             WHERE id = $1 RETURNING *",
        )
        .bind(existing.id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    pub async fn get(&self, template_id: Uuid) -> Result<ParameterTemplate, ApiError> {
        let template: Option<ParameterTemplate> =
            sqlx::query_as("SELECT * FROM parameter_templates WHERE id = $1")
                .bind(template_id)
                .fetch_optional(&self.pool)
                .await?;
        template.ok_or_else(|| ApiError::not_found("Parameter template not found"))
    }

    pub async fn create(&self, template: NewTemplate) -> Result<ParameterTemplate, ApiError> {
        validate_criticality(&template.criticality)?;

        let exists: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM parameter_templates WHERE parameter_name = $1")
                .bind(&template.parameter_name)
                .fetch_optional(&self.pool)
                .await?;
        if exists.is_some() {
            return Err(ApiError::conflict(
                "Parameter with this name already exists",
            ));
        }

        let created: ParameterTemplate = sqlx::query_as(
            "INSERT INTO parameter_templates \
             (parameter_category, parameter_name, norm_value, authority, criticality, description) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING *",
        )
        .bind(&template.parameter_category)
        .bind(&template.parameter_name)
        .bind(&template.norm_value)
        .bind(&template.authority)
        .bind(&template.criticality)
        .bind(&template.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    /// Bulk creation for seeding the catalog; stops at the first failure.
    pub async fn create_many(
        &self,
        templates: Vec<NewTemplate>,
    ) -> Result<Vec<ParameterTemplate>, ApiError> {
        let mut created = Vec::with_capacity(templates.len());
        for template in templates {
            created.push(self.create(template).await?);
        }
        Ok(created)
    }

    pub async fn update(
        &self,
        template_id: Uuid,
        update: TemplateUpdate,
    ) -> Result<ParameterTemplate, ApiError> {
        if let Some(ref criticality) = update.criticality {
            validate_criticality(criticality)?;
        }

        let existing = self.get(template_id).await?;

        if let Some(ref name) = update.parameter_name {
            let taken: Option<(Uuid,)> = sqlx::query_as(
                "SELECT id FROM parameter_templates WHERE parameter_name = $1 AND id <> $2",
            )
            .bind(name)
            .bind(template_id)
            .fetch_optional(&self.pool)
            .await?;
            if taken.is_some() {
                return Err(ApiError::conflict(
                    "Parameter with this name already exists",
                ));
            }
        }

        let updated: ParameterTemplate = sqlx::query_as(
            "UPDATE parameter_templates SET \
               parameter_category = COALESCE($2, parameter_category), \
               parameter_name = COALESCE($3, parameter_name), \
               norm_value = COALESCE($4, norm_value), \
               authority = COALESCE($5, authority), \
               criticality = COALESCE($6, criticality), \
               description = COALESCE($7, description), \
               is_active = COALESCE($8, is_active), \
               updated_at = $9 \
             WHERE id = $1 \
             RETURNING *",
        )
        .bind(existing.id)
        .bind(&update.parameter_category)
        .bind(&update.parameter_name)
        .bind(&update.norm_value)
        .bind(&update.authority)
        .bind(&update.criticality)
        .bind(&update.description)
        .bind(update.is_active)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    /// Deletion is blocked while any institution still references the
    /// template; the error carries the reference count.
    pub async fn delete(&self, template_id: Uuid) -> Result<(), ApiError> {
        self.get(template_id).await?;

        let (references,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM institution_parameters WHERE parameter_template_id = $1",
        )
        .bind(template_id)
        .fetch_one(&self.pool)
        .await?;
        if references > 0 {
            return Err(ApiError::conflict(format!(
                "Cannot delete: parameter is used by {} institution(s)",
                references
            )));
        }

        sqlx::query("DELETE FROM parameter_templates WHERE id = $1")
            .bind(template_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn validate_criticality(criticality: &str) -> Result<(), ApiError> {
    match criticality {
        "low" | "medium" | "high" => Ok(()),
        _ => Err(ApiError::bad_request(
            "criticality must be 'low', 'medium' or 'high'",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criticality_values_are_constrained() {
        assert!(validate_criticality("low").is_ok());
        assert!(validate_criticality("medium").is_ok());
        assert!(validate_criticality("high").is_ok());
        assert!(validate_criticality("urgent").is_err());
        assert!(validate_criticality("").is_err());
    }

    #[test]
    fn new_template_defaults_to_medium_criticality() {
        let template: NewTemplate = serde_json::from_value(serde_json::json!({
            "parameter_category": "Faculty",
            "parameter_name": "Student Faculty Ratio",
            "norm_value": "20:1",
            "authority": "AICTE",
        }))
        .unwrap();
        assert_eq!(template.criticality, "medium");
    }
}
