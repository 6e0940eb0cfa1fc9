//! Role-based access control: roles, the permission catalog, and the
//! authorization gates.

mod catalog;
mod gate;
mod role;

pub use catalog::{permissions_for_role, seed_catalog, Permission, UnknownPermissionError};
pub use gate::{authorize, authorize_role, require_global_role, Operation};
pub use role::{AssignableRole, GlobalRole, OrgRole, ParseRoleError};
