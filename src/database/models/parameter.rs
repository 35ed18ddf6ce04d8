use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Regulator-defined compliance metric, shared across all institutions.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ParameterTemplate {
    pub id: Uuid,
    pub parameter_category: String,
    pub parameter_name: String,
    pub norm_value: String,
    pub authority: String,
    pub criticality: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An institution's submitted value against one template. Unique per
/// (institution_id, parameter_template_id); writes go through upsert.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InstitutionParameter {
    pub id: Uuid,
    pub institution_id: Uuid,
    pub parameter_template_id: Uuid,
    pub institution_value: String,
    pub is_compliant: bool,
    pub remarks: String,
    pub updated_at: DateTime<Utc>,
}
