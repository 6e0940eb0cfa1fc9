//! Moorgate - multi-tenant organization membership and access control
//!
//! Moorgate provides the membership layer of a multi-tenant SaaS backend:
//! organizations, role-based memberships, token-based invites, a permission
//! catalog with authorization gates, provider-backed identity resolution and
//! an audit trail for every mutation.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use moorgate::{
//!     AccessGate, IdentityResolver, InMemoryStore, JwtVerifier, Operation,
//!     OrgScope, OrganizationService,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     moorgate::init_tracing();
//!
//!     let store = InMemoryStore::new();
//!     moorgate::seed_catalog(&store).await.unwrap();
//!
//!     let verifier = JwtVerifier::from_secret(b"dev-secret", "https://issuer", "authenticated");
//!     let gate = AccessGate::new(IdentityResolver::new(verifier), store.clone());
//!     let orgs = OrganizationService::new(store.clone(), store.clone());
//!
//!     let header = "Bearer <token>";
//!     let member = gate
//!         .check(Some(header), &OrgScope::from_org_id_param("org-1"), Operation::ListMembers)
//!         .await
//!         .unwrap();
//!     let members = orgs.organization_members(&member.organization_id).await.unwrap();
//!     println!("{} members", members.len());
//! }
//! ```

pub mod admin;
pub mod audit;
pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod org;
pub mod rbac;

pub use admin::AdminService;
pub use audit::{AuditAction, AuditEntry, AuditSink};
pub use config::IdentityConfig;
pub use context::{AccessGate, AuthedContext, MemberContext, OrgScope, ScopedContext};
pub use error::{AccessError, Result};
pub use identity::{IdentityClaims, IdentityResolver, JwtVerifier, VerifiedSubject};
pub use org::{
    AccessStore, CatalogStore, InMemoryStore, InviteStore, MemberRecord, Membership,
    MembershipStore, Organization, OrganizationInvite, OrganizationService, OrganizationStore,
    User, UserStore, DEFAULT_AUDIT_LIMIT,
};
#[cfg(feature = "database")]
pub use org::SeaOrmStore;
pub use rbac::{
    authorize, authorize_role, permissions_for_role, require_global_role, seed_catalog,
    AssignableRole, GlobalRole, Operation, OrgRole, Permission,
};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize tracing with sensible defaults.
///
/// Respects the `RUST_LOG` environment variable for filtering (defaults to
/// `info`). Set `MOORGATE_LOG_JSON=true` for JSON output.
///
/// # Example
///
/// ```rust,no_run
/// fn main() {
///     moorgate::init_tracing();
///     // ... rest of your app
/// }
/// ```
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("MOORGATE_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
