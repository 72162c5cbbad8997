//! Version layer shared by the resolver
//!
//! Pure functions over version strings: ordering releases by version and
//! deriving the version-prefix labels selectors match on.
//!
//! # Modules
//!
//! - [`semver`]: Version parsing and the latest-first total order
//! - [`label`]: Label-safe version encoding and version-prefix label sets
//! - [`error`]: Error types for version parsing

pub mod error;
pub mod label;
pub mod semver;
