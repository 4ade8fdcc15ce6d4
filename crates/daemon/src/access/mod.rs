//! Access control.
//!
//! - [`MembershipGate`]: per-principal cached membership decisions
//! - [`AccessPolicy`]: the context rule applied before every action

pub mod membership;
pub mod policy;

pub use membership::{MemberStatus, MembershipGate, MembershipOracle, OracleError};
pub use policy::AccessPolicy;
