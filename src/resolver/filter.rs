//! Filtering of cached releases and OS images against a normalized query

use std::collections::HashMap;

use crate::resolver::cache::Cache;
use crate::resolver::query::{OsImageQuery, Query};
use crate::resolver::types::{OsImages, Releases};

/// Matching releases of one port and, per release, its matching OS images
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct OsImageDetails {
    pub(crate) releases: Releases,
    pub(crate) os_images_by_release: HashMap<String, OsImages>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Details {
    pub(crate) control_plane: Option<OsImageDetails>,
    pub(crate) machine_deployments: Vec<Option<OsImageDetails>>,
}

impl Cache {
    /// Filter every port. The returned details share entities with the cache
    /// but no longer borrow it.
    pub(crate) fn filter(&self, query: &Query) -> Details {
        Details {
            control_plane: query.control_plane.as_ref().map(|port| self.filter_port(port)),
            machine_deployments: query
                .machine_deployments
                .iter()
                .map(|port| port.as_ref().map(|port| self.filter_port(port)))
                .collect(),
        }
    }

    fn filter_port(&self, query: &OsImageQuery) -> OsImageDetails {
        let considered = self.considered_releases(query);
        let os_images_by_release = self.os_images_by_release(query, &considered);

        // A release without a satisfying OS image cannot be resolved
        let releases = considered
            .into_iter()
            .filter(|(name, _)| os_images_by_release.contains_key(name))
            .collect();

        OsImageDetails {
            releases,
            os_images_by_release,
        }
    }

    /// Releases whose labels satisfy the release selector
    fn considered_releases(&self, query: &OsImageQuery) -> Releases {
        self.releases
            .iter()
            .filter(|(_, release)| query.release_selector.matches(&release.labels))
            .map(|(name, release)| (name.clone(), release.clone()))
            .collect()
    }

    /// Matching OS images grouped by release. Releases left without OS images
    /// are not included.
    fn os_images_by_release(&self, query: &OsImageQuery, considered: &Releases) -> HashMap<String, OsImages> {
        let mut result = HashMap::with_capacity(considered.len());
        for release_name in considered.keys() {
            let Some(slots) = self.release_to_os_images.get(release_name) else {
                continue;
            };
            let os_images: OsImages = slots
                .iter()
                .filter_map(|(name, slot)| slot.as_ref().map(|os_image| (name, os_image)))
                .filter(|(_, os_image)| query.os_image_selector.matches(&os_image.labels))
                .map(|(name, os_image)| (name.clone(), os_image.clone()))
                .collect();
            if !os_images.is_empty() {
                result.insert(release_name.clone(), os_images);
            }
        }
        result
    }
}

/// Restrict every non-empty port to the releases all non-empty ports share:
/// the whole cluster runs one release.
pub(crate) fn intersect(details: Details) -> Details {
    let Some(common) = common_releases(&details) else {
        return details;
    };

    let restrict = |port: Option<OsImageDetails>| port.map(|port| restrict_to(port, &common));
    Details {
        control_plane: restrict(details.control_plane),
        machine_deployments: details.machine_deployments.into_iter().map(restrict).collect(),
    }
}

/// Releases present in every non-empty port, `None` if all ports are empty
fn common_releases(details: &Details) -> Option<Releases> {
    let mut ports = details
        .control_plane
        .iter()
        .chain(details.machine_deployments.iter().flatten());

    let mut common = ports.next()?.releases.clone();
    for port in ports {
        common.retain(|name, _| port.releases.contains_key(name));
    }
    Some(common)
}

fn restrict_to(port: OsImageDetails, releases: &Releases) -> OsImageDetails {
    OsImageDetails {
        releases: port
            .releases
            .into_iter()
            .filter(|(name, _)| releases.contains_key(name))
            .collect(),
        os_images_by_release: port
            .os_images_by_release
            .into_iter()
            .filter(|(name, _)| releases.contains_key(name))
            .collect(),
    }
}
