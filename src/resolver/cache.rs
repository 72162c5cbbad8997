//! Release and OS image store with cross-reference indices
//!
//! Releases and OS images arrive from independent watch streams in any order.
//! A release may reference an OS image that is not cached yet: its slot in the
//! forward index is reserved as `None` and filled when the image arrives, so
//! both indices converge regardless of arrival order.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::resolver::labels::{augment_os_image, augment_release};
use crate::resolver::types::{Entity, EntityKey, EntityKind, OsImage, OsImages, Release, Releases};

/// OS image slots of one release, keyed by image name.
/// `None` marks a referenced image that is not cached.
pub type OsImageSlots = HashMap<String, Option<Arc<OsImage>>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Cache {
    pub(crate) releases: Releases,
    pub(crate) os_images: OsImages,

    /// Release name -> slots of every OS image it references
    pub(crate) release_to_os_images: HashMap<String, OsImageSlots>,
    /// OS image name -> releases referencing it (cached or not)
    pub(crate) os_image_to_releases: HashMap<String, Releases>,
}

impl Cache {
    /// Upsert an entity; one carrying a deletion timestamp is removed instead.
    pub(crate) fn add(&mut self, entity: Entity) {
        match entity {
            Entity::Release(release) if release.is_deleting() => self.remove_release(&release.name),
            Entity::Release(release) => self.add_release(Arc::unwrap_or_clone(release)),
            Entity::OsImage(os_image) if os_image.is_deleting() => {
                self.remove_os_image(&os_image.name)
            }
            Entity::OsImage(os_image) => self.add_os_image(Arc::unwrap_or_clone(os_image)),
        }
    }

    pub(crate) fn remove(&mut self, key: &EntityKey) {
        match key.kind {
            EntityKind::Release => self.remove_release(&key.name),
            EntityKind::OsImage => self.remove_os_image(&key.name),
        }
    }

    pub(crate) fn get(&self, name: &str, kind: EntityKind) -> Option<Entity> {
        match kind {
            EntityKind::Release => self.releases.get(name).cloned().map(Entity::Release),
            EntityKind::OsImage => self.os_images.get(name).cloned().map(Entity::OsImage),
        }
    }

    fn add_release(&mut self, mut release: Release) {
        augment_release(&mut release);

        // A re-added release may reference a different set of images
        self.unlink_release(&release.name);

        let release = Arc::new(release);
        let slots: OsImageSlots = release
            .os_image_names()
            .map(|name| (name.to_string(), self.os_images.get(name).cloned()))
            .collect();

        if slots.is_empty() {
            warn!("Release {} ships no OS images", release.name);
        }

        for os_image_name in slots.keys() {
            self.os_image_to_releases
                .entry(os_image_name.clone())
                .or_default()
                .insert(release.name.clone(), Arc::clone(&release));
        }

        debug!(
            "Cached release {} ({} of {} OS images available)",
            release.name,
            slots.values().filter(|slot| slot.is_some()).count(),
            slots.len()
        );

        self.release_to_os_images.insert(release.name.clone(), slots);
        self.releases.insert(release.name.clone(), release);
    }

    fn add_os_image(&mut self, mut os_image: OsImage) {
        augment_os_image(&mut os_image);

        let os_image = Arc::new(os_image);
        if let Some(releases) = self.os_image_to_releases.get(&os_image.name) {
            for release_name in releases.keys() {
                if let Some(slots) = self.release_to_os_images.get_mut(release_name) {
                    slots.insert(os_image.name.clone(), Some(Arc::clone(&os_image)));
                }
            }
        }

        debug!("Cached OS image {}", os_image.name);
        self.os_images.insert(os_image.name.clone(), os_image);
    }

    fn remove_release(&mut self, name: &str) {
        if self.releases.remove(name).is_some() {
            debug!("Removed release {}", name);
        }
        self.unlink_release(name);
    }

    /// Drop the release's forward entry and its membership in every reverse
    /// entry. Reverse entries left without releases are dropped.
    fn unlink_release(&mut self, name: &str) {
        let Some(slots) = self.release_to_os_images.remove(name) else {
            return;
        };
        for os_image_name in slots.keys() {
            if let Some(releases) = self.os_image_to_releases.get_mut(os_image_name) {
                releases.remove(name);
                if releases.is_empty() {
                    self.os_image_to_releases.remove(os_image_name);
                }
            }
        }
    }

    /// Referencing releases keep their slot for the image, reset to `None`.
    /// The reverse entry stays, so re-adding the image refills those slots.
    fn remove_os_image(&mut self, name: &str) {
        if self.os_images.remove(name).is_some() {
            debug!("Removed OS image {}", name);
        }
        if let Some(releases) = self.os_image_to_releases.get(name) {
            for release_name in releases.keys() {
                if let Some(slot) = self
                    .release_to_os_images
                    .get_mut(release_name)
                    .and_then(|slots| slots.get_mut(name))
                {
                    *slot = None;
                }
            }
        }
    }
}
