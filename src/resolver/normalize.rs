//! Query normalization
//!
//! Extends each non-empty port's selectors so that only entities carrying the
//! requested version-prefix label, and none of the excluding labels, can match.

use crate::resolver::query::{OsImageQuery, Query};
use crate::resolver::selector::{Requirement, Selector};
use crate::version::label;

/// Normalize every port of `query`. `None` ports pass through untouched.
pub fn normalize(query: &Query, excluded_labels: &[String]) -> Query {
    Query {
        control_plane: query
            .control_plane
            .as_ref()
            .map(|port| normalize_os_image_query(port, excluded_labels)),
        machine_deployments: query
            .machine_deployments
            .iter()
            .map(|port| {
                port.as_ref()
                    .map(|port| normalize_os_image_query(port, excluded_labels))
            })
            .collect(),
    }
}

/// Appends the equivalent of `<k8s-version-prefix-label>,!incompatible,!deactivated,!invalid`
/// to both the release and the OS image selector.
pub fn normalize_os_image_query(query: &OsImageQuery, excluded_labels: &[String]) -> OsImageQuery {
    let prefix_label = label::label(&query.k8s_version_prefix);

    OsImageQuery {
        k8s_version_prefix: query.k8s_version_prefix.clone(),
        release_selector: constrain(query.release_selector.clone(), &prefix_label, excluded_labels),
        os_image_selector: constrain(query.os_image_selector.clone(), &prefix_label, excluded_labels),
    }
}

fn constrain(selector: Selector, prefix_label: &str, excluded_labels: &[String]) -> Selector {
    let selector = excluded_labels
        .iter()
        .fold(selector, |selector, label| {
            selector.add(Requirement::does_not_exist(label.as_str()))
        });

    // An empty prefix asks for any version
    if prefix_label.is_empty() {
        selector
    } else {
        selector.add(Requirement::exists(prefix_label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::labels::EXCLUDING_LABELS;
    use crate::resolver::types::Labels;
    use rstest::rstest;

    fn excluded() -> Vec<String> {
        EXCLUDING_LABELS.iter().map(|l| l.to_string()).collect()
    }

    fn labels(keys: &[&str]) -> Labels {
        keys.iter().map(|k| (k.to_string(), String::new())).collect()
    }

    #[rstest]
    #[case(&["v1.20.1---vmware.1"], true)]
    #[case(&["v1.20.1---vmware.1", "incompatible"], false)]
    #[case(&["v1.20.1---vmware.1", "deactivated"], false)]
    #[case(&["v1.20.1---vmware.1", "invalid"], false)]
    #[case(&["v1.20.2---vmware.1"], false)]
    fn normalized_selectors_require_prefix_and_exclude_markers(
        #[case] keys: &[&str],
        #[case] expected: bool,
    ) {
        let query = OsImageQuery::new("v1.20.1+vmware.1");

        let normalized = normalize_os_image_query(&query, &excluded());

        assert_eq!(normalized.release_selector.matches(&labels(keys)), expected);
        assert_eq!(normalized.os_image_selector.matches(&labels(keys)), expected);
    }

    #[test]
    fn normalize_keeps_caller_requirements() {
        let query = OsImageQuery::new("v1.20")
            .with_os_image_selector("os-name=ubuntu".parse().unwrap());

        let normalized = normalize_os_image_query(&query, &excluded());

        assert_eq!(
            normalized.os_image_selector.to_string(),
            "os-name=ubuntu,!incompatible,!deactivated,!invalid,v1.20"
        );
        assert_eq!(
            normalized.release_selector.to_string(),
            "!incompatible,!deactivated,!invalid,v1.20"
        );
    }

    #[test]
    fn normalize_passes_empty_ports_through() {
        let query = Query {
            control_plane: None,
            machine_deployments: vec![Some(OsImageQuery::new("v1.21")), None],
        };

        let normalized = normalize(&query, &excluded());

        assert!(normalized.control_plane.is_none());
        assert_eq!(normalized.machine_deployments.len(), 2);
        assert!(normalized.machine_deployments[0].is_some());
        assert!(normalized.machine_deployments[1].is_none());
    }

    #[test]
    fn empty_prefix_adds_no_version_requirement() {
        let normalized = normalize_os_image_query(&OsImageQuery::new(""), &excluded());

        assert!(normalized.release_selector.matches(&labels(&["v1.19"])));
        assert!(!normalized.release_selector.matches(&labels(&["invalid"])));
    }
}
