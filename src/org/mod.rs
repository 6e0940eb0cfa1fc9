//! Organization domain: types, storage seams, and the lifecycle service.

pub mod memory;
#[cfg(feature = "database")]
pub mod sea_orm;
pub mod service;
pub mod storage;
pub mod types;

mod utils;

pub use memory::InMemoryStore;
#[cfg(feature = "database")]
pub use sea_orm::SeaOrmStore;
pub use service::{OrganizationService, DEFAULT_AUDIT_LIMIT};
pub use storage::{
    AccessStore, CatalogStore, InviteStore, MembershipStore, OrganizationStore, UserStore,
};
pub use types::{MemberRecord, Membership, Organization, OrganizationInvite, User};
