//! Scope-based authorization for the registry.
//!
//! Every core operation is gated on a `(Permission, Scope)` pair. The
//! caller's identity is resolved by an [`AuthDriver`] implementation
//! chosen at deployment time; the [`ScopeAuthorizer`] turns the resolved
//! identity into yes/no decisions and bearer challenges.

pub mod authorizer;
pub mod driver;
pub mod permission;
pub mod scope;
pub mod static_driver;

pub use authorizer::ScopeAuthorizer;
pub use driver::{AuthDriver, AuthError, Authorization, TenantGrant, TenantRole, UserIdentity};
pub use permission::Permission;
pub use scope::Scope;
pub use static_driver::{StaticAuthDriver, StaticUser};
