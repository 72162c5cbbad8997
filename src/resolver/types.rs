//! Entity types held by the resolver cache

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::version::label;

/// Label set of a release or OS image
pub type Labels = BTreeMap<String, String>;

/// Releases keyed by name
pub type Releases = HashMap<String, Arc<Release>>;

/// OS images keyed by name
pub type OsImages = HashMap<String, Arc<OsImage>>;

/// Derive the object name of a release from its version
pub fn release_name(version: &str) -> String {
    label::label(version)
}

/// A Kubernetes distribution release: a versioned bundle shipping one
/// Kubernetes version and referencing the OS images built for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub name: String,
    #[serde(default)]
    pub labels: Labels,
    /// Set once the object is being deleted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    pub spec: ReleaseSpec,
    #[serde(default)]
    pub status: ReleaseStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSpec {
    /// Release version, e.g. `v1.20.1+vmware.1-tkg.2`
    pub version: String,
    /// Kubernetes version shipped, e.g. `v1.20.1+vmware.1`
    pub kubernetes_version: String,
    #[serde(default)]
    pub os_images: Vec<OsImageRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OsImageRef {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseStatus {
    pub compatible: bool,
    pub valid: bool,
    /// Derived on insertion: false while any excluding label is present
    pub ready: bool,
}

impl Default for ReleaseStatus {
    fn default() -> Self {
        Self {
            compatible: true,
            valid: true,
            ready: true,
        }
    }
}

impl Release {
    /// A compatible, valid release named after its version, shipping no OS images
    pub fn new(version: impl Into<String>, kubernetes_version: impl Into<String>) -> Self {
        let version = version.into();
        Self {
            name: release_name(&version),
            labels: Labels::new(),
            deletion_timestamp: None,
            spec: ReleaseSpec {
                version,
                kubernetes_version: kubernetes_version.into(),
                os_images: Vec::new(),
            },
            status: ReleaseStatus::default(),
        }
    }

    pub fn with_os_images<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.os_images = names
            .into_iter()
            .map(|name| OsImageRef { name: name.into() })
            .collect();
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_compatible(mut self, compatible: bool) -> Self {
        self.status.compatible = compatible;
        self
    }

    pub fn with_valid(mut self, valid: bool) -> Self {
        self.status.valid = valid;
        self
    }

    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    /// Names of the OS images this release ships
    pub fn os_image_names(&self) -> impl Iterator<Item = &str> {
        self.spec.os_images.iter().map(|r| r.name.as_str())
    }
}

/// A machine image built for one Kubernetes version and OS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsImage {
    pub name: String,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    pub spec: OsImageSpec,
    #[serde(default)]
    pub status: OsImageStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsImageSpec {
    pub kubernetes_version: String,
    #[serde(default)]
    pub os: OsInfo,
    #[serde(default)]
    pub image: ImageInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsInfo {
    #[serde(rename = "type")]
    pub os_type: String,
    pub name: String,
    pub version: String,
    pub arch: String,
}

/// Image type tag plus a provider-specific reference, e.g.
/// `{"type": "ami", "ref": {"region": "us-east-1", "id": "ami-123"}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageInfo {
    #[serde(rename = "type")]
    pub image_type: String,
    #[serde(rename = "ref")]
    pub image_ref: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsImageStatus {
    pub compatible: bool,
    pub valid: bool,
}

impl Default for OsImageStatus {
    fn default() -> Self {
        Self {
            compatible: true,
            valid: true,
        }
    }
}

impl OsImage {
    /// A compatible, valid OS image with empty OS and image descriptors
    pub fn new(name: impl Into<String>, kubernetes_version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: Labels::new(),
            deletion_timestamp: None,
            spec: OsImageSpec {
                kubernetes_version: kubernetes_version.into(),
                os: OsInfo::default(),
                image: ImageInfo::default(),
            },
            status: OsImageStatus::default(),
        }
    }

    pub fn with_os(mut self, os: OsInfo) -> Self {
        self.spec.os = os;
        self
    }

    pub fn with_image(mut self, image_type: impl Into<String>, image_ref: serde_json::Value) -> Self {
        self.spec.image = ImageInfo {
            image_type: image_type.into(),
            image_ref,
        };
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_compatible(mut self, compatible: bool) -> Self {
        self.status.compatible = compatible;
        self
    }

    pub fn with_valid(mut self, valid: bool) -> Self {
        self.status.valid = valid;
        self
    }

    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }
}

/// Kind of entity held by the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Release,
    OsImage,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Release => "release",
            EntityKind::OsImage => "os_image",
        }
    }
}

/// A release or an OS image
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Release(Arc<Release>),
    OsImage(Arc<OsImage>),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Release(_) => EntityKind::Release,
            Entity::OsImage(_) => EntityKind::OsImage,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::Release(release) => &release.name,
            Entity::OsImage(os_image) => &os_image.name,
        }
    }

    pub fn key(&self) -> EntityKey {
        EntityKey {
            kind: self.kind(),
            name: self.name().to_string(),
        }
    }

    pub fn as_release(&self) -> Option<&Arc<Release>> {
        match self {
            Entity::Release(release) => Some(release),
            Entity::OsImage(_) => None,
        }
    }

    pub fn as_os_image(&self) -> Option<&Arc<OsImage>> {
        match self {
            Entity::OsImage(os_image) => Some(os_image),
            Entity::Release(_) => None,
        }
    }
}

impl From<Release> for Entity {
    fn from(release: Release) -> Self {
        Entity::Release(Arc::new(release))
    }
}

impl From<Arc<Release>> for Entity {
    fn from(release: Arc<Release>) -> Self {
        Entity::Release(release)
    }
}

impl From<OsImage> for Entity {
    fn from(os_image: OsImage) -> Self {
        Entity::OsImage(Arc::new(os_image))
    }
}

impl From<Arc<OsImage>> for Entity {
    fn from(os_image: Arc<OsImage>) -> Self {
        Entity::OsImage(os_image)
    }
}

/// Identifies an entity for removal: kind and name only
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub name: String,
}

impl EntityKey {
    pub fn release(name: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Release,
            name: name.into(),
        }
    }

    pub fn os_image(name: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::OsImage,
            name: name.into(),
        }
    }
}

impl From<&Entity> for EntityKey {
    fn from(entity: &Entity) -> Self {
        entity.key()
    }
}

impl From<Entity> for EntityKey {
    fn from(entity: Entity) -> Self {
        entity.key()
    }
}

impl From<&Release> for EntityKey {
    fn from(release: &Release) -> Self {
        EntityKey::release(release.name.clone())
    }
}

impl From<&OsImage> for EntityKey {
    fn from(os_image: &OsImage) -> Self {
        EntityKey::os_image(os_image.name.clone())
    }
}
