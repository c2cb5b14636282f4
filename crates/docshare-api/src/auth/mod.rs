//! Bearer authentication
//!
//! The middleware pulls the bearer credential, hands it to the configured
//! [`PrincipalResolver`] and stores the resulting principal in the request
//! extensions, where [`AuthPrincipal`] picks it up.

pub mod middleware;
pub mod models;
pub mod resolver;

pub use middleware::auth_middleware;
pub use models::{AuthPrincipal, IdentityClaims};
pub use resolver::{
    create_resolver, FixedPrincipalResolver, IntrospectionPrincipalResolver,
    JwtPrincipalResolver, PrincipalResolver,
};
