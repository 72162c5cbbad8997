pub mod config;
pub mod logging;
pub mod resolver;
pub mod version;

pub use config::{ConfigError, LogConfig, ResolverConfig};
pub use resolver::Resolver;
pub use resolver::error::ResolveError;
pub use resolver::query::{OsImageQuery, OsImageResult, Query, Resolution};
pub use resolver::selector::{Operator, Requirement, Selector, SelectorError};
pub use resolver::types::{Entity, EntityKey, EntityKind, OsImage, Release};
