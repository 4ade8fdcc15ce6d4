//! Folder navigation.
//!
//! - [`tokens`]: short button tokens standing in for folder paths
//! - [`paths`]: parent/depth helpers on remote paths
//! - [`links`]: link marker files announced instead of delivered
//! - [`navigator`]: the browse step state machine

pub mod links;
pub mod navigator;
pub mod paths;
pub mod tokens;

pub use links::{extract_url, MarkerRule, LINK_NOT_FOUND};
pub use navigator::{NavSettings, Navigator, StepReport};
pub use tokens::TokenStore;
