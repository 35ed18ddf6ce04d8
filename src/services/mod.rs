pub mod ai_client;
pub mod ai_service;
pub mod api_key_service;
pub mod application_service;
pub mod document_service;
pub mod institution_service;
pub mod parameter_service;
pub mod stats_service;
pub mod storage;
pub mod template_service;
pub mod user_service;

pub use ai_service::AiService;
pub use api_key_service::ApiKeyService;
pub use application_service::ApplicationService;
pub use document_service::DocumentService;
pub use institution_service::InstitutionService;
pub use parameter_service::ParameterService;
pub use stats_service::StatsService;
pub use template_service::TemplateService;
pub use user_service::UserService;
