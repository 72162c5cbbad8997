use std::sync::Arc;
use std::thread;

use rstest::{fixture, rstest};
use serde_json::json;
use tkr_resolver::resolver::sort::latest_release;
use tkr_resolver::resolver::types::OsInfo;
use tkr_resolver::{
    EntityKey, EntityKind, OsImage, OsImageQuery, Query, Release, ResolveError, Resolver,
    ResolverConfig,
};

const RELEASE_A: &str = "v1.20.1---vmware.1-tkg.1";
const RELEASE_B: &str = "v1.20.2---vmware.1-tkg.1";
const RELEASE_C: &str = "v1.21.1---vmware.1-tkg.1";

fn os_image(name: &str, k8s_version: &str, os_name: &str) -> OsImage {
    OsImage::new(name, k8s_version)
        .with_os(OsInfo {
            os_type: "linux".to_string(),
            name: os_name.to_string(),
            version: "20.04".to_string(),
            arch: "amd64".to_string(),
        })
        .with_image("ami", json!({ "region": "us-east-1", "id": format!("ami-{name}") }))
}

fn release_a() -> Release {
    Release::new("v1.20.1+vmware.1-tkg.1", "v1.20.1+vmware.1")
        .with_os_images(["ubuntu-a", "photon-a"])
}

fn release_b() -> Release {
    Release::new("v1.20.2+vmware.1-tkg.1", "v1.20.2+vmware.1").with_os_images(["ubuntu-b"])
}

fn release_c() -> Release {
    Release::new("v1.21.1+vmware.1-tkg.1", "v1.21.1+vmware.1").with_os_images(["ubuntu-c"])
}

#[fixture]
fn resolver() -> Resolver {
    let resolver = Resolver::new();
    resolver.add([release_a(), release_b(), release_c()]);
    resolver.add([
        os_image("ubuntu-a", "v1.20.1+vmware.1", "ubuntu"),
        os_image("photon-a", "v1.20.1+vmware.1", "photon"),
        os_image("ubuntu-b", "v1.20.2+vmware.1", "ubuntu"),
        os_image("ubuntu-c", "v1.21.1+vmware.1", "ubuntu"),
    ]);
    resolver
}

fn control_plane(port: OsImageQuery) -> Query {
    Query {
        control_plane: Some(port),
        machine_deployments: Vec::new(),
    }
}

fn sorted_keys<V>(map: &std::collections::HashMap<String, V>) -> Vec<&str> {
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort();
    keys
}

#[rstest]
fn resolve_version_prefix_returns_latest_release(resolver: Resolver) {
    let resolution = resolver.resolve(&control_plane(OsImageQuery::new("v1.20"))).unwrap();

    let result = resolution.control_plane.unwrap();
    assert_eq!(result.release_name.as_deref(), Some(RELEASE_B));
    assert_eq!(result.k8s_version.as_deref(), Some("v1.20.2+vmware.1"));
    assert_eq!(
        sorted_keys(&result.releases_by_k8s_version),
        ["v1.20.1+vmware.1", "v1.20.2+vmware.1"]
    );
    assert_eq!(sorted_keys(&result.os_images_by_release), [RELEASE_A, RELEASE_B]);
    assert_eq!(
        sorted_keys(&result.os_images_by_release[RELEASE_A]),
        ["photon-a", "ubuntu-a"]
    );
}

#[rstest]
#[case::major_minor("v1.21", Some(RELEASE_C))]
#[case::exact_k8s_version("v1.20.1+vmware.1", Some(RELEASE_A))]
#[case::any_version("", Some(RELEASE_C))]
#[case::unknown_version("v1.19", None)]
fn resolve_returns_expected(
    resolver: Resolver,
    #[case] prefix: &str,
    #[case] expected: Option<&str>,
) {
    let resolution = resolver.resolve(&control_plane(OsImageQuery::new(prefix))).unwrap();

    let result = resolution.control_plane.unwrap();
    assert_eq!(result.release_name.as_deref(), expected);
    assert_eq!(result.is_empty(), expected.is_none());
}

#[rstest]
fn resolve_skips_release_re_added_as_incompatible(resolver: Resolver) {
    resolver.add([release_b().with_compatible(false)]);

    let resolution = resolver.resolve(&control_plane(OsImageQuery::new("v1.20"))).unwrap();

    let result = resolution.control_plane.unwrap();
    assert_eq!(result.release_name.as_deref(), Some(RELEASE_A));
    assert!(!resolver.get_release(RELEASE_B).unwrap().status.ready);
}

#[rstest]
fn resolve_skips_deactivated_os_images(resolver: Resolver) {
    resolver.add([os_image("ubuntu-b", "v1.20.2+vmware.1", "ubuntu").with_label("deactivated", "")]);

    let resolution = resolver.resolve(&control_plane(OsImageQuery::new("v1.20"))).unwrap();

    assert_eq!(
        resolution.control_plane.unwrap().release_name.as_deref(),
        Some(RELEASE_A)
    );
}

#[rstest]
fn resolve_applies_os_image_selector(resolver: Resolver) {
    let port = OsImageQuery::new("v1.20").with_os_image_selector("os-name=photon".parse().unwrap());

    let resolution = resolver.resolve(&control_plane(port)).unwrap();

    let result = resolution.control_plane.unwrap();
    assert_eq!(result.release_name.as_deref(), Some(RELEASE_A));
    assert_eq!(sorted_keys(&result.os_images_by_release[RELEASE_A]), ["photon-a"]);
}

#[rstest]
fn resolve_applies_image_ref_labels(resolver: Resolver) {
    let port = OsImageQuery::new("").with_os_image_selector("ami-id=ami-ubuntu-a".parse().unwrap());

    let resolution = resolver.resolve(&control_plane(port)).unwrap();

    assert_eq!(
        resolution.control_plane.unwrap().release_name.as_deref(),
        Some(RELEASE_A)
    );
}

#[rstest]
fn resolve_keeps_empty_ports_absent(resolver: Resolver) {
    let resolution = resolver
        .resolve(&Query {
            control_plane: None,
            machine_deployments: vec![None, Some(OsImageQuery::new("v1.21"))],
        })
        .unwrap();

    assert!(resolution.control_plane.is_none());
    assert_eq!(resolution.machine_deployments.len(), 2);
    assert!(resolution.machine_deployments[0].is_none());
    assert_eq!(
        resolution.machine_deployments[1]
            .as_ref()
            .unwrap()
            .release_name
            .as_deref(),
        Some(RELEASE_C)
    );
}

#[rstest]
fn resolve_intersects_ports_on_common_releases(resolver: Resolver) {
    let query = Query {
        control_plane: Some(OsImageQuery::new("v1.20")),
        machine_deployments: vec![Some(
            OsImageQuery::new("v1.20").with_os_image_selector("os-name=photon".parse().unwrap()),
        )],
    };

    let resolution = resolver.resolve(&query).unwrap();

    // only release A ships a photon image, so the control plane follows it
    let control_plane = resolution.control_plane.unwrap();
    assert_eq!(control_plane.release_name.as_deref(), Some(RELEASE_A));
    assert_eq!(
        sorted_keys(&control_plane.os_images_by_release[RELEASE_A]),
        ["photon-a", "ubuntu-a"]
    );
}

#[test]
fn resolve_without_intersection_resolves_ports_independently() {
    let resolver = Resolver::with_config(ResolverConfig {
        intersect_ports: false,
        ..ResolverConfig::default()
    });
    resolver.add([release_a(), release_b()]);
    resolver.add([
        os_image("photon-a", "v1.20.1+vmware.1", "photon"),
        os_image("ubuntu-b", "v1.20.2+vmware.1", "ubuntu"),
    ]);
    let query = Query {
        control_plane: Some(OsImageQuery::new("v1.20")),
        machine_deployments: vec![Some(
            OsImageQuery::new("v1.20").with_os_image_selector("os-name=photon".parse().unwrap()),
        )],
    };

    let resolution = resolver.resolve(&query).unwrap();

    assert_eq!(
        resolution.control_plane.unwrap().release_name.as_deref(),
        Some(RELEASE_B)
    );
    assert_eq!(
        resolution.machine_deployments[0]
            .as_ref()
            .unwrap()
            .release_name
            .as_deref(),
        Some(RELEASE_A)
    );
}

#[rstest]
fn resolve_after_os_image_removal_and_re_add(resolver: Resolver) {
    let query = control_plane(OsImageQuery::new("v1.20.2"));

    resolver.remove([EntityKey::os_image("ubuntu-b")]);
    assert!(resolver.resolve(&query).unwrap().control_plane.unwrap().is_empty());

    resolver.add([os_image("ubuntu-b", "v1.20.2+vmware.1", "ubuntu")]);
    assert_eq!(
        resolver
            .resolve(&query)
            .unwrap()
            .control_plane
            .unwrap()
            .release_name
            .as_deref(),
        Some(RELEASE_B)
    );
}

#[rstest]
fn get_reflects_adds_and_removals(resolver: Resolver) {
    let release = resolver.get(RELEASE_A, EntityKind::Release).unwrap();
    assert_eq!(release.name(), RELEASE_A);
    assert!(resolver.get(RELEASE_A, EntityKind::OsImage).is_none());

    let os_image = resolver.get_os_image("ubuntu-a").unwrap();
    assert_eq!(os_image.labels["os-name"], "ubuntu");
    assert!(os_image.labels.contains_key("v1.20.1"));

    resolver.remove([&release_a()]);
    assert!(resolver.get(RELEASE_A, EntityKind::Release).is_none());
    assert!(resolver.get_os_image("ubuntu-a").is_some());
}

#[rstest]
fn add_with_deletion_timestamp_removes_entity(resolver: Resolver) {
    let mut release = release_c();
    release.deletion_timestamp = Some(chrono::Utc::now());

    resolver.add([release]);

    assert!(resolver.get_release(RELEASE_C).is_none());
    let resolution = resolver.resolve(&control_plane(OsImageQuery::new("v1.21"))).unwrap();
    assert!(resolution.control_plane.unwrap().is_empty());
}

#[test]
fn resolve_fails_on_release_with_unparseable_version() {
    let resolver = Resolver::new();
    resolver.add([Release::new("not-a-version", "v1.20.1+vmware.1").with_os_images(["img"])]);
    resolver.add([OsImage::new("img", "v1.20.1+vmware.1")]);

    let err = resolver.resolve(&control_plane(OsImageQuery::new(""))).unwrap_err();

    let ResolveError::InvalidVersion { release, .. } = err;
    assert_eq!(release, "not-a-version");
}

#[test]
fn resolve_ignores_unparseable_release_marked_invalid() {
    let resolver = Resolver::new();
    resolver.add([Release::new("not-a-version", "v1.20.1+vmware.1")
        .with_os_images(["img"])
        .with_valid(false)]);
    resolver.add([OsImage::new("img", "v1.20.1+vmware.1")]);

    let resolution = resolver.resolve(&control_plane(OsImageQuery::new(""))).unwrap();

    assert!(resolution.control_plane.unwrap().is_empty());
}

#[rstest]
fn latest_release_ranks_a_version_group(resolver: Resolver) {
    let resolution = resolver.resolve(&control_plane(OsImageQuery::new("v1"))).unwrap();
    let result = resolution.control_plane.unwrap();

    let group = &result.releases_by_k8s_version["v1.20.1+vmware.1"];
    let latest = latest_release(group).unwrap().unwrap();

    assert_eq!(latest.name, RELEASE_A);
}

#[test]
fn concurrent_adds_and_resolves_converge() {
    let resolver = Arc::new(Resolver::new());

    thread::scope(|scope| {
        for patch in 0..8 {
            let resolver = Arc::clone(&resolver);
            scope.spawn(move || {
                let k8s_version = format!("v1.22.{patch}+vmware.1");
                let image = format!("image-{patch}");
                resolver.add([os_image(&image, &k8s_version, "ubuntu")]);
                resolver.add([Release::new(format!("{k8s_version}-tkg.1"), k8s_version.as_str())
                    .with_os_images([image.as_str()])]);
            });
        }
        for _ in 0..4 {
            let resolver = Arc::clone(&resolver);
            scope.spawn(move || {
                resolver
                    .resolve(&control_plane(OsImageQuery::new("v1.22")))
                    .unwrap();
            });
        }
    });

    let resolution = resolver.resolve(&control_plane(OsImageQuery::new("v1.22"))).unwrap();
    let result = resolution.control_plane.unwrap();
    assert_eq!(result.release_name.as_deref(), Some("v1.22.7---vmware.1-tkg.1"));
    assert_eq!(result.releases_by_k8s_version.len(), 8);
}
