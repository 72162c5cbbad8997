//! Resolution requests and results

use std::collections::HashMap;

use crate::resolver::selector::Selector;
use crate::resolver::types::{OsImages, Releases};

/// What to resolve: the control plane and each machine deployment.
///
/// A `None` port requests no resolution and yields no result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub control_plane: Option<OsImageQuery>,
    pub machine_deployments: Vec<Option<OsImageQuery>>,
}

/// Constraints for a single port
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OsImageQuery {
    /// Kubernetes version prefix, e.g. `v1.20` or `v1.20.1+vmware.1`
    pub k8s_version_prefix: String,
    pub release_selector: Selector,
    pub os_image_selector: Selector,
}

impl OsImageQuery {
    pub fn new(k8s_version_prefix: impl Into<String>) -> Self {
        Self {
            k8s_version_prefix: k8s_version_prefix.into(),
            ..Self::default()
        }
    }

    pub fn with_release_selector(mut self, selector: Selector) -> Self {
        self.release_selector = selector;
        self
    }

    pub fn with_os_image_selector(mut self, selector: Selector) -> Self {
        self.os_image_selector = selector;
        self
    }
}

/// Per-port results, positionally matching the query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub control_plane: Option<OsImageResult>,
    pub machine_deployments: Vec<Option<OsImageResult>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OsImageResult {
    /// Kubernetes version shipped by the latest release, if any matched
    pub k8s_version: Option<String>,
    /// Name of the latest matching release
    pub release_name: Option<String>,
    /// Every matching release, grouped by the Kubernetes version it ships
    pub releases_by_k8s_version: HashMap<String, Releases>,
    /// Matching OS images of each matching release
    pub os_images_by_release: HashMap<String, OsImages>,
}

impl OsImageResult {
    /// True if no release satisfied the port
    pub fn is_empty(&self) -> bool {
        self.release_name.is_none()
    }
}
