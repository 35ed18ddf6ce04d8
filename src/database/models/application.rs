use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Application lifecycle. `submitted -> under_review -> {approved, rejected}`;
/// approved and rejected are terminal. `under_review` is a storable value with
/// no dedicated transition trigger in this API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Submitted,
    UnderReview,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<ApplicationStatus> {
        match s {
            "submitted" => Some(ApplicationStatus::Submitted),
            "under_review" => Some(ApplicationStatus::UnderReview),
            "approved" => Some(ApplicationStatus::Approved),
            "rejected" => Some(ApplicationStatus::Rejected),
            _ => None,
        }
    }

    /// Approved and rejected applications never change status again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ApplicationStatus::Approved | ApplicationStatus::Rejected)
    }

    /// An institution may hold at most one application in one of these states.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Submitted
                | ApplicationStatus::UnderReview
                | ApplicationStatus::Approved
        )
    }
}

/// The regulator an application is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authority {
    Ugc,
    Aicte,
}

impl Authority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Authority::Ugc => "ugc",
            Authority::Aicte => "aicte",
        }
    }

    pub fn parse(s: &str) -> Option<Authority> {
        match s {
            "ugc" => Some(Authority::Ugc),
            "aicte" => Some(Authority::Aicte),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Application {
    pub id: Uuid,
    pub institution_id: Uuid,
    pub submitted_by: Uuid,
    pub status: String,
    pub approved_by: String,
    pub approved_by_user: Option<Uuid>,
    pub is_approved: bool,
    pub remarks: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn status(&self) -> Option<ApplicationStatus> {
        ApplicationStatus::parse(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(ApplicationStatus::Approved.is_terminal());
        assert!(ApplicationStatus::Rejected.is_terminal());
        assert!(!ApplicationStatus::Submitted.is_terminal());
        assert!(!ApplicationStatus::UnderReview.is_terminal());
    }

    #[test]
    fn active_states_block_new_applications() {
        assert!(ApplicationStatus::Submitted.is_active());
        assert!(ApplicationStatus::UnderReview.is_active());
        assert!(ApplicationStatus::Approved.is_active());
        assert!(!ApplicationStatus::Rejected.is_active());
    }
}
