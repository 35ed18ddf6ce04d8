use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::{Institution, InstitutionType};
use crate::error::ApiError;

#[derive(Debug, Clone, Deserialize)]
pub struct InstitutionProfile {
    pub name: String,
    #[serde(rename = "type")]
    pub institution_type: String,
    pub email: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub address: Option<String>,
    pub pincode: Option<String>,
    pub full_address: Option<String>,
    pub website: Option<String>,
    pub established_year: Option<i32>,
    pub institution_code: Option<String>,
    pub naac_grade: Option<String>,
    pub nirf_rank: Option<i32>,
    pub aishe_code: Option<String>,
    pub udise_code: Option<String>,
    pub total_students: Option<i32>,
    pub total_faculty: Option<i32>,
}

/// Partial update: only provided fields change.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct InstitutionUpdate {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub institution_type: Option<String>,
    pub email: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub address: Option<String>,
    pub pincode: Option<String>,
    pub full_address: Option<String>,
    pub website: Option<String>,
    pub established_year: Option<i32>,
    pub institution_code: Option<String>,
    pub naac_grade: Option<String>,
    pub nirf_rank: Option<i32>,
    pub aishe_code: Option<String>,
    pub udise_code: Option<String>,
    pub total_students: Option<i32>,
    pub total_faculty: Option<i32>,
}

pub struct InstitutionService {
    pool: PgPool,
}

impl InstitutionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the caller's institution profile. The duplicate guard matches
    /// on the full field tuple, so any field difference bypasses it - kept
    /// as-is from the source system rather than deduplicating harder.
    pub async fn create(
        &self,
        user_id: Uuid,
        profile: InstitutionProfile,
    ) -> Result<Institution, ApiError> {
        if InstitutionType::parse(&profile.institution_type).is_none() {
            return Err(ApiError::bad_request(
                "type must be 'university' or 'college'",
            ));
        }

        let duplicate: Option<Institution> = sqlx::query_as(
            "SELECT * FROM institutions \
             WHERE name = $1 AND institution_type = $2 \
               AND state IS NOT DISTINCT FROM $3 \
               AND district IS NOT DISTINCT FROM $4 \
               AND address IS NOT DISTINCT FROM $5 \
               AND website IS NOT DISTINCT FROM $6 \
               AND established_year IS NOT DISTINCT FROM $7",
        )
        .bind(&profile.name)
        .bind(&profile.institution_type)
        .bind(&profile.state)
        .bind(&profile.district)
        .bind(&profile.address)
        .bind(&profile.website)
        .bind(profile.established_year)
        .fetch_optional(&self.pool)
        .await?;

        if duplicate.is_some() {
            return Err(ApiError::conflict("Institution already exists"));
        }

        let now = Utc::now();
        let institution: Institution = sqlx::query_as(
            "INSERT INTO institutions \
             (user_id, name, institution_type, email, state, district, address, pincode, \
              full_address, website, established_year, institution_code, naac_grade, nirf_rank, \
              aishe_code, udise_code, total_students, total_faculty, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $19) \
             RETURNING *",
        )
        .bind(user_id)
        .bind(&profile.name)
        .bind(&profile.institution_type)
        .bind(&profile.email)
        .bind(&profile.state)
        .bind(&profile.district)
        .bind(&profile.address)
        .bind(&profile.pincode)
        .bind(&profile.full_address)
        .bind(&profile.website)
        .bind(profile.established_year)
        .bind(&profile.institution_code)
        .bind(&profile.naac_grade)
        .bind(profile.nirf_rank)
        .bind(&profile.aishe_code)
        .bind(&profile.udise_code)
        .bind(profile.total_students)
        .bind(profile.total_faculty)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(institution_id = %institution.id, user_id = %user_id, "institution created");
        Ok(institution)
    }

    /// Field-if-provided update on the caller's own institution.
    pub async fn update_for_user(
        &self,
        user_id: Uuid,
        update: InstitutionUpdate,
    ) -> Result<Institution, ApiError> {
        let existing = self.get_by_user(user_id).await?;

        if let Some(ref t) = update.institution_type {
            if InstitutionType::parse(t).is_none() {
                return Err(ApiError::bad_request(
                    "type must be 'university' or 'college'",
                ));
            }
        }

        let updated: Institution = sqlx::query_as(
            "UPDATE institutions SET \
               name = COALESCE($2, name), \
               institution_type = COALESCE($3, institution_type), \
               email = COALESCE($4, email), \
               state = COALESCE($5, state), \
               district = COALESCE($6, district), \
               address = COALESCE($7, address), \
               pincode = COALESCE($8, pincode), \
               full_address = COALESCE($9, full_address), \
               website = COALESCE($10, website), \
               established_year = COALESCE($11, established_year), \
               institution_code = COALESCE($12, institution_code), \
               naac_grade = COALESCE($13, naac_grade), \
               nirf_rank = COALESCE($14, nirf_rank), \
               aishe_code = COALESCE($15, aishe_code), \
               udise_code = COALESCE($16, udise_code), \
               total_students = COALESCE($17, total_students), \
               total_faculty = COALESCE($18, total_faculty), \
               updated_at = $19 \
             WHERE id = $1 \
             RETURNING *",
        )
        .bind(existing.id)
        .bind(&update.name)
        .bind(&update.institution_type)
        .bind(&update.email)
        .bind(&update.state)
        .bind(&update.district)
        .bind(&update.address)
        .bind(&update.pincode)
        .bind(&update.full_address)
        .bind(&update.website)
        .bind(update.established_year)
        .bind(&update.institution_code)
        .bind(&update.naac_grade)
        .bind(update.nirf_rank)
        .bind(&update.aishe_code)
        .bind(&update.udise_code)
        .bind(update.total_students)
        .bind(update.total_faculty)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(updated)
    }

    pub async fn get_by_user(&self, user_id: Uuid) -> Result<Institution, ApiError> {
        let institution: Option<Institution> =
            sqlx::query_as("SELECT * FROM institutions WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        institution.ok_or_else(|| ApiError::not_found("Institution not found"))
    }

    pub async fn get(&self, institution_id: Uuid) -> Result<Institution, ApiError> {
        let institution: Option<Institution> =
            sqlx::query_as("SELECT * FROM institutions WHERE id = $1")
                .bind(institution_id)
                .fetch_optional(&self.pool)
                .await?;
        institution.ok_or_else(|| ApiError::not_found("Institution not found"))
    }

    pub async fn list_all(&self) -> Result<Vec<Institution>, ApiError> {
        let institutions =
            sqlx::query_as("SELECT * FROM institutions ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(institutions)
    }

    /// Profile plus its owned rows, gathered by parent-id queries.
    pub async fn with_children(&self, institution: &Institution) -> Result<Value, ApiError> {
        let parameters: Vec<crate::database::models::InstitutionParameter> =
            sqlx::query_as("SELECT * FROM institution_parameters WHERE institution_id = $1")
                .bind(institution.id)
                .fetch_all(&self.pool)
                .await?;
        let documents: Vec<crate::database::models::Document> = sqlx::query_as(
            "SELECT * FROM documents WHERE institution_id = $1 ORDER BY uploaded_at DESC",
        )
        .bind(institution.id)
        .fetch_all(&self.pool)
        .await?;
        let applications: Vec<crate::database::models::Application> = sqlx::query_as(
            "SELECT * FROM applications WHERE institution_id = $1 ORDER BY submitted_at DESC",
        )
        .bind(institution.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(json!({
            "institution": institution,
            "parameters": parameters,
            "documents": documents,
            "applications": applications,
        }))
    }
}
