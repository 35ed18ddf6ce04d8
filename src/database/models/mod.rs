pub mod ai;
pub mod api_key;
pub mod application;
pub mod document;
pub mod institution;
pub mod parameter;
pub mod user;

pub use ai::{AiAnalysis, AiReport, AnalysisStatus};
pub use api_key::ApiKey;
pub use application::{Application, ApplicationStatus, Authority};
pub use document::Document;
pub use institution::{Institution, InstitutionType};
pub use parameter::{InstitutionParameter, ParameterTemplate};
pub use user::User;
