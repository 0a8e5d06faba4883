mod access;
mod principal;

pub use access::{may_access, require_access, resolve_owners, resolve_target, scope_filter};
pub use principal::{PermissionLevel, Principal};
