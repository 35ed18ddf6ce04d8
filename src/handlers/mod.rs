pub mod admin;
pub mod ai_analysis;
pub mod application;
pub mod auth;
pub mod central_repo;
pub mod document;
pub mod institution;
pub mod parameter;
