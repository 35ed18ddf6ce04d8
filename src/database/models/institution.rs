use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::database::models::application::Authority;

/// Institution category. Decides which regulator reviews its applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstitutionType {
    University,
    College,
}

impl InstitutionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstitutionType::University => "university",
            InstitutionType::College => "college",
        }
    }

    pub fn parse(s: &str) -> Option<InstitutionType> {
        match s {
            "university" => Some(InstitutionType::University),
            "college" => Some(InstitutionType::College),
            _ => None,
        }
    }

    /// Universities fall under UGC, colleges under AICTE.
    pub fn reviewing_authority(&self) -> Authority {
        match self {
            InstitutionType::University => Authority::Ugc,
            InstitutionType::College => Authority::Aicte,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Institution {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[sqlx(rename = "institution_type")]
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
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Institution {
    pub fn institution_type(&self) -> Option<InstitutionType> {
        InstitutionType::parse(&self.institution_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_follows_institution_type() {
        assert_eq!(InstitutionType::University.reviewing_authority(), Authority::Ugc);
        assert_eq!(InstitutionType::College.reviewing_authority(), Authority::Aicte);
    }
}
