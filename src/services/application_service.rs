use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::Role;
use crate::database::models::{Application, ApplicationStatus, Authority, Institution};
use crate::error::ApiError;

/// Size of the full compliance-parameter set an institution must submit
/// before it may apply.
pub const REQUIRED_PARAMETER_COUNT: i64 = 22;

/// Minimum number of uploaded documents required to apply.
pub const REQUIRED_DOCUMENT_COUNT: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EligibilityError {
    #[error("Institution not found")]
    InstitutionNotFound,
    #[error("All 22 AICTE parameters not submitted")]
    ParametersIncomplete,
    #[error("Required documents not uploaded")]
    DocumentsNotUploaded,
    #[error("Application already exists")]
    ApplicationExists,
}

impl From<EligibilityError> for ApiError {
    fn from(err: EligibilityError) -> Self {
        match err {
            EligibilityError::InstitutionNotFound => ApiError::not_found(err.to_string()),
            EligibilityError::ApplicationExists => ApiError::conflict(err.to_string()),
            _ => ApiError::bad_request(err.to_string()),
        }
    }
}

/// Counts gathered ahead of application creation. The gate itself is a pure
/// precondition check with no side effects.
#[derive(Debug, Clone, Copy)]
pub struct EligibilitySnapshot {
    pub parameter_count: i64,
    pub document_count: i64,
    pub has_active_application: bool,
}

pub fn check_eligibility(snapshot: EligibilitySnapshot) -> Result<(), EligibilityError> {
    if snapshot.parameter_count < REQUIRED_PARAMETER_COUNT {
        return Err(EligibilityError::ParametersIncomplete);
    }
    if snapshot.document_count < REQUIRED_DOCUMENT_COUNT {
        return Err(EligibilityError::DocumentsNotUploaded);
    }
    if snapshot.has_active_application {
        return Err(EligibilityError::ApplicationExists);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReviewError {
    #[error("Application has already been decided")]
    AlreadyDecided,
    #[error("Only regulators or the super admin may review applications")]
    NotAuthorized,
}

impl From<ReviewError> for ApiError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::AlreadyDecided => ApiError::conflict(err.to_string()),
            ReviewError::NotAuthorized => ApiError::forbidden(err.to_string()),
        }
    }
}

/// One-shot terminal transition. Approved/rejected never move again; any
/// non-terminal state accepts the decision directly.
pub fn review_transition(
    current: ApplicationStatus,
    reviewer: Role,
    action: ReviewAction,
) -> Result<(ApplicationStatus, bool), ReviewError> {
    if !reviewer.can_review() {
        return Err(ReviewError::NotAuthorized);
    }
    if current.is_terminal() {
        return Err(ReviewError::AlreadyDecided);
    }
    Ok(match action {
        ReviewAction::Approve => (ApplicationStatus::Approved, true),
        ReviewAction::Reject => (ApplicationStatus::Rejected, false),
    })
}

/// Which applications a role may list: `None` means no authority filter
/// (super admin sees everything); regulators see their own queue.
pub fn visibility_filter(role: Role) -> Result<Option<Authority>, ApiError> {
    match role {
        Role::SuperAdmin => Ok(None),
        Role::Ugc => Ok(Some(Authority::Ugc)),
        Role::Aicte => Ok(Some(Authority::Aicte)),
        Role::Institution => Err(ApiError::forbidden(
            "Institutions cannot list all applications",
        )),
    }
}

pub struct ApplicationService {
    pool: PgPool,
}

impl ApplicationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gate and create. Fails without side effects when any
    /// precondition does not hold.
    pub async fn create(
        &self,
        institution_id: Uuid,
        submitted_by: Uuid,
    ) -> Result<Application, ApiError> {
        let institution: Option<Institution> =
            sqlx::query_as("SELECT * FROM institutions WHERE id = $1")
                .bind(institution_id)
                .fetch_optional(&self.pool)
                .await?;
        let institution = institution.ok_or(EligibilityError::InstitutionNotFound)?;

        let (parameter_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM institution_parameters WHERE institution_id = $1",
        )
        .bind(institution_id)
        .fetch_one(&self.pool)
        .await?;

        let (document_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM documents WHERE institution_id = $1")
                .bind(institution_id)
                .fetch_one(&self.pool)
                .await?;

        let (active_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM applications \
             WHERE institution_id = $1 AND status IN ('submitted', 'under_review', 'approved')",
        )
        .bind(institution_id)
        .fetch_one(&self.pool)
        .await?;

        check_eligibility(EligibilitySnapshot {
            parameter_count,
            document_count,
            has_active_application: active_count > 0,
        })?;

        let authority = institution
            .institution_type()
            .map(|t| t.reviewing_authority())
            .ok_or_else(|| {
                ApiError::internal_server_error("Institution has an unknown type")
            })?;

        let application: Application = sqlx::query_as(
            "INSERT INTO applications \
             (institution_id, submitted_by, status, approved_by, submitted_at, updated_at) \
             VALUES ($1, $2, 'submitted', $3, $4, $4) \
             RETURNING *",
        )
        .bind(institution_id)
        .bind(submitted_by)
        .bind(authority.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            application_id = %application.id,
            institution_id = %institution_id,
            authority = authority.as_str(),
            "application created"
        );
        Ok(application)
    }

    pub async fn get_by_institution(
        &self,
        institution_id: Uuid,
    ) -> Result<Application, ApiError> {
        let application: Option<Application> = sqlx::query_as(
            "SELECT * FROM applications WHERE institution_id = $1 \
             ORDER BY submitted_at DESC LIMIT 1",
        )
        .bind(institution_id)
        .fetch_optional(&self.pool)
        .await?;

        application
            .ok_or_else(|| ApiError::not_found("No application found for this institution"))
    }

    /// Role-scoped listing, newest first.
    pub async fn list_for_role(&self, role: Role) -> Result<Vec<Application>, ApiError> {
        let applications = match visibility_filter(role)? {
            None => {
                sqlx::query_as("SELECT * FROM applications ORDER BY submitted_at DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
            Some(authority) => {
                sqlx::query_as(
                    "SELECT * FROM applications WHERE approved_by = $1 \
                     ORDER BY submitted_at DESC",
                )
                .bind(authority.as_str())
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(applications)
    }

    /// Approve or reject. Terminal once decided.
    pub async fn review(
        &self,
        application_id: Uuid,
        reviewer_id: Uuid,
        reviewer_role: Role,
        action: ReviewAction,
        remarks: Option<String>,
    ) -> Result<Application, ApiError> {
        let application: Option<Application> =
            sqlx::query_as("SELECT * FROM applications WHERE id = $1")
                .bind(application_id)
                .fetch_optional(&self.pool)
                .await?;
        let application =
            application.ok_or_else(|| ApiError::not_found("Application not found"))?;

        let current = application.status().ok_or_else(|| {
            ApiError::internal_server_error("Application has an unknown status")
        })?;

        let (next_status, is_approved) = review_transition(current, reviewer_role, action)?;

        // Regulators stamp their own authority; a super-admin decision keeps
        // the authority the application was routed to.
        let approved_by = match reviewer_role {
            Role::Ugc => Authority::Ugc.as_str().to_string(),
            Role::Aicte => Authority::Aicte.as_str().to_string(),
            _ => application.approved_by.to_lowercase(),
        };

        let updated: Application = sqlx::query_as(
            "UPDATE applications \
             SET status = $2, is_approved = $3, approved_by = $4, approved_by_user = $5, \
                 remarks = $6, updated_at = $7 \
             WHERE id = $1 \
             RETURNING *",
        )
        .bind(application_id)
        .bind(next_status.as_str())
        .bind(is_approved)
        .bind(approved_by)
        .bind(reviewer_id)
        .bind(remarks)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            application_id = %application_id,
            status = next_status.as_str(),
            reviewer = reviewer_role.as_str(),
            "application reviewed"
        );
        Ok(updated)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(parameters: i64, documents: i64, active: bool) -> EligibilitySnapshot {
        EligibilitySnapshot {
            parameter_count: parameters,
            document_count: documents,
            has_active_application: active,
        }
    }

    #[test]
    fn full_parameter_set_and_document_required() {
        // one parameter short of the full set
        assert_eq!(
            check_eligibility(snapshot(21, 1, false)),
            Err(EligibilityError::ParametersIncomplete)
        );
        assert_eq!(
            EligibilityError::ParametersIncomplete.to_string(),
            "All 22 AICTE parameters not submitted"
        );

        // full set, a document on file, no active application
        assert_eq!(check_eligibility(snapshot(22, 1, false)), Ok(()));
    }

    #[test]
    fn documents_checked_after_parameters() {
        assert_eq!(
            check_eligibility(snapshot(22, 0, false)),
            Err(EligibilityError::DocumentsNotUploaded)
        );
        // Parameter shortfall reported first even when documents also missing
        assert_eq!(
            check_eligibility(snapshot(0, 0, false)),
            Err(EligibilityError::ParametersIncomplete)
        );
    }

    #[test]
    fn active_application_blocks_creation() {
        assert_eq!(
            check_eligibility(snapshot(22, 1, true)),
            Err(EligibilityError::ApplicationExists)
        );
        assert_eq!(
            EligibilityError::ApplicationExists.to_string(),
            "Application already exists"
        );
    }

    #[test]
    fn surplus_parameters_and_documents_accepted() {
        assert_eq!(check_eligibility(snapshot(30, 4, false)), Ok(()));
    }

    #[test]
    fn approve_and_reject_set_status_and_flag() {
        assert_eq!(
            review_transition(ApplicationStatus::Submitted, Role::Ugc, ReviewAction::Approve),
            Ok((ApplicationStatus::Approved, true))
        );
        assert_eq!(
            review_transition(ApplicationStatus::Submitted, Role::Aicte, ReviewAction::Reject),
            Ok((ApplicationStatus::Rejected, false))
        );
        // under_review has no dedicated trigger but accepts a decision
        assert_eq!(
            review_transition(
                ApplicationStatus::UnderReview,
                Role::SuperAdmin,
                ReviewAction::Approve
            ),
            Ok((ApplicationStatus::Approved, true))
        );
    }

    #[test]
    fn decided_applications_are_terminal() {
        for status in [ApplicationStatus::Approved, ApplicationStatus::Rejected] {
            for action in [ReviewAction::Approve, ReviewAction::Reject] {
                assert_eq!(
                    review_transition(status, Role::SuperAdmin, action),
                    Err(ReviewError::AlreadyDecided)
                );
            }
        }
    }

    #[test]
    fn institutions_cannot_review() {
        assert_eq!(
            review_transition(
                ApplicationStatus::Submitted,
                Role::Institution,
                ReviewAction::Approve
            ),
            Err(ReviewError::NotAuthorized)
        );
    }

    #[test]
    fn listing_visibility_by_role() {
        assert_eq!(visibility_filter(Role::SuperAdmin).unwrap(), None);
        assert_eq!(visibility_filter(Role::Ugc).unwrap(), Some(Authority::Ugc));
        assert_eq!(visibility_filter(Role::Aicte).unwrap(), Some(Authority::Aicte));
        assert!(visibility_filter(Role::Institution).is_err());
    }

    #[test]
    fn review_action_parses_from_request_body() {
        let action: ReviewAction = serde_json::from_str("\"approve\"").unwrap();
        assert_eq!(action, ReviewAction::Approve);
        let action: ReviewAction = serde_json::from_str("\"reject\"").unwrap();
        assert_eq!(action, ReviewAction::Reject);
        assert!(serde_json::from_str::<ReviewAction>("\"revert\"").is_err());
    }
}
