pub mod middleware;
pub mod rate_limit;
pub mod revocation;
pub mod service;

pub use middleware::{require_admin, require_auth, Identity};
pub use rate_limit::RateLimiter;
pub use revocation::{RevocationSet, RevocationSweeper};
pub use service::{AuthConfig, AuthError, AuthService, Claims};
