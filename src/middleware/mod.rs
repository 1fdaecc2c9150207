pub mod auth;
pub mod errors;
pub mod response;
pub mod tenant;

pub use auth::{jwt_auth_middleware, AuthUser};
pub use errors::expose_internal_errors_middleware;
pub use response::{ApiResponse, ApiResult, Paging};
pub use tenant::resolve_tenant_middleware;
