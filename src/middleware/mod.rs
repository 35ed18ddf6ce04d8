pub mod auth;
pub mod central_repo;
pub mod response;

pub use auth::AuthUser;
pub use central_repo::RepoIdentity;
pub use response::{ApiResponse, ApiResult};
