//! Ranking of filtered releases

use std::collections::HashMap;
use std::sync::Arc;

use tracing::error;

use crate::resolver::error::ResolveError;
use crate::resolver::filter::{Details, OsImageDetails};
use crate::resolver::query::{OsImageResult, Resolution};
use crate::resolver::types::{Release, Releases};
use crate::version::semver::{Version, parse_version};

/// Rank the releases of every port
pub(crate) fn sort(details: Details) -> Result<Resolution, ResolveError> {
    Ok(Resolution {
        control_plane: details.control_plane.map(sort_port).transpose()?,
        machine_deployments: details
            .machine_deployments
            .into_iter()
            .map(|port| port.map(sort_port).transpose())
            .collect::<Result<_, _>>()?,
    })
}

fn sort_port(details: OsImageDetails) -> Result<OsImageResult, ResolveError> {
    let (k8s_version, release_name) = latest_release(&details.releases)?
        .map(|release| (release.spec.kubernetes_version.clone(), release.name.clone()))
        .unzip();

    // resulting map can't be larger than the release set
    let mut releases_by_k8s_version: HashMap<String, Releases> =
        HashMap::with_capacity(details.releases.len());
    for release in details.releases.values() {
        releases_by_k8s_version
            .entry(release.spec.kubernetes_version.clone())
            .or_default()
            .insert(release.name.clone(), Arc::clone(release));
    }

    Ok(OsImageResult {
        k8s_version,
        release_name,
        releases_by_k8s_version,
        os_images_by_release: details.os_images_by_release,
    })
}

/// The latest release of `releases`, e.g. of one Kubernetes version group of
/// an [`OsImageResult`]. `None` for an empty set.
pub fn latest_release(releases: &Releases) -> Result<Option<&Arc<Release>>, ResolveError> {
    let mut latest: Option<(Version, &Arc<Release>)> = None;
    for release in releases.values() {
        let version = release_version(release)?;
        if latest.as_ref().is_none_or(|(latest, _)| latest.less_than(&version)) {
            latest = Some((version, release));
        }
    }
    Ok(latest.map(|(_, release)| release))
}

fn release_version(release: &Release) -> Result<Version, ResolveError> {
    parse_version(&release.spec.version).map_err(|source| {
        error!(
            "Release {} reached ranking with unparseable version {:?}",
            release.name, release.spec.version
        );
        ResolveError::InvalidVersion {
            release: release.name.clone(),
            source,
        }
    })
}
