//! Release and OS image resolution
//!
//! Watch loops push releases and OS images in; webhooks and status controllers
//! ask which release and OS images satisfy a cluster's ports.
//!
//! # Architecture
//!
//! ```text
//!   add / remove                           resolve
//!        │                                    │
//!        ▼                                    ▼
//! ┌─────────────┐   read lock   ┌─────────────┐     ┌─────────────┐
//! │    Cache    │──────────────▶│   Filter    │◀────│  Normalize  │
//! │  (indices)  │               │ (selectors) │     │   (query)   │
//! └─────────────┘               └─────────────┘     └─────────────┘
//!        ▲                             │ snapshot
//!        │                             ▼
//! ┌─────────────┐               ┌─────────────┐
//! │   Labels    │               │    Sort     │
//! │ (projector) │               │  (latest)   │
//! └─────────────┘               └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`types`]: Releases, OS images and the entity enum
//! - [`labels`]: Labels derived from entity fields and status
//! - [`selector`]: Label selectors and their textual grammar
//! - [`query`]: Query and result shapes
//! - [`normalize`]: Query normalization
//! - [`sort`]: Latest-release ranking
//! - [`error`]: Error types for resolution

mod cache;
pub mod error;
mod filter;
pub mod labels;
pub mod normalize;
pub mod query;
pub mod selector;
pub mod sort;
pub mod types;

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use crate::config::ResolverConfig;
use crate::resolver::cache::Cache;
use crate::resolver::error::ResolveError;
use crate::resolver::query::{Query, Resolution};
use crate::resolver::types::{Entity, EntityKey, EntityKind, OsImage, Release};

/// Thread-safe resolver over a cache of releases and OS images.
///
/// Mutations take the cache lock exclusively; resolutions hold it shared only
/// while filtering, so concurrent resolutions never block each other.
pub struct Resolver {
    cache: RwLock<Cache>,
    config: ResolverConfig,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self::with_config(ResolverConfig::default())
    }

    pub fn with_config(config: ResolverConfig) -> Self {
        info!(
            "Initializing resolver (excluded labels: {:?}, intersect ports: {})",
            config.excluded_labels, config.intersect_ports
        );
        Self {
            cache: RwLock::new(Cache::default()),
            config,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Add or replace releases and OS images. Invalid entities must carry
    /// `valid = false`. Entities with a deletion timestamp are removed.
    pub fn add<I, E>(&self, entities: I)
    where
        I: IntoIterator<Item = E>,
        E: Into<Entity>,
    {
        let entities: Vec<Entity> = entities.into_iter().map(Into::into).collect();
        let mut cache = self.write();
        for entity in entities {
            cache.add(entity);
        }
    }

    /// Remove releases and OS images by kind and name
    pub fn remove<I, K>(&self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<EntityKey>,
    {
        let keys: Vec<EntityKey> = keys.into_iter().map(Into::into).collect();
        let mut cache = self.write();
        for key in &keys {
            cache.remove(key);
        }
    }

    pub fn get(&self, name: &str, kind: EntityKind) -> Option<Entity> {
        self.read().get(name, kind)
    }

    pub fn get_release(&self, name: &str) -> Option<Arc<Release>> {
        self.read().releases.get(name).cloned()
    }

    pub fn get_os_image(&self, name: &str) -> Option<Arc<OsImage>> {
        self.read().os_images.get(name).cloned()
    }

    /// Resolve every port of `query` against the current cache contents.
    ///
    /// Fails only if a release with an unparseable version is ranked, which
    /// means an invalid release was not marked `valid = false`.
    pub fn resolve(&self, query: &Query) -> Result<Resolution, ResolveError> {
        let query = normalize::normalize(query, &self.config.excluded_labels);

        let details = self.read().filter(&query);
        let details = if self.config.intersect_ports {
            filter::intersect(details)
        } else {
            details
        };

        let resolution = sort::sort(details)?;
        debug!(
            "Resolved control plane: {:?}, machine deployments: {:?}",
            resolution.control_plane.as_ref().map(|port| &port.release_name),
            resolution
                .machine_deployments
                .iter()
                .map(|port| port.as_ref().map(|port| &port.release_name))
                .collect::<Vec<_>>()
        );
        Ok(resolution)
    }

    // Mutations never panic mid-update, so a poisoned lock still guards a
    // consistent cache.
    fn read(&self) -> RwLockReadGuard<'_, Cache> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Cache> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }
}
