pub mod jwt_auth;
pub mod metrics;

pub use jwt_auth::{jwt_auth_middleware, AuthUser, SessionJwt};
pub use metrics::metrics_middleware;
