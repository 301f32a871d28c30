//! Authentication and authorization.
//!
//! Token issuance lives in `login`, account creation in `register`, the
//! per-request bearer filter and route policy table in `policy`, and the
//! owner-or-admin check in `principal`. Tokens are stateless HS512 JWTs;
//! validity is purely signature + expiry at verification time.

pub(crate) mod login;
pub(crate) mod policy;
pub(crate) mod principal;
pub(crate) mod register;
pub(crate) mod storage;
pub(crate) mod types;
pub(crate) mod utils;

pub use policy::{gate, required_role};
pub use principal::{Principal, Role, authorize_owner_or_admin};
