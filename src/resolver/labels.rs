//! Derived labels for releases and OS images
//!
//! Selectors only see labels, so everything a query may filter on (version
//! prefixes, status markers, OS and image descriptors) is projected into the
//! label set whenever an entity enters the cache. Projection is idempotent.

use serde_json::Value;

use crate::resolver::types::{Labels, OsImage, Release};
use crate::version::label;

/// Present iff the entity is not compatible with the management cluster
pub const LABEL_INCOMPATIBLE: &str = "incompatible";
/// Present iff the entity failed validation
pub const LABEL_INVALID: &str = "invalid";
/// Set by administrators to retire an entity
pub const LABEL_DEACTIVATED: &str = "deactivated";

pub const LABEL_OS_TYPE: &str = "os-type";
pub const LABEL_OS_NAME: &str = "os-name";
pub const LABEL_OS_VERSION: &str = "os-version";
pub const LABEL_OS_ARCH: &str = "os-arch";
pub const LABEL_IMAGE_TYPE: &str = "image-type";

/// Labels that take an entity out of consideration
pub const EXCLUDING_LABELS: [&str; 3] = [LABEL_INCOMPATIBLE, LABEL_DEACTIVATED, LABEL_INVALID];

/// Sets version-prefix labels for `spec.version`, syncs the incompatible and
/// invalid markers with status, then derives `status.ready`.
pub fn augment_release(release: &mut Release) {
    merge_version_prefixes(&mut release.labels, &release.spec.version);

    ensure_label(&mut release.labels, LABEL_INCOMPATIBLE, !release.status.compatible);
    ensure_label(&mut release.labels, LABEL_INVALID, !release.status.valid);

    release.status.ready = !EXCLUDING_LABELS
        .iter()
        .any(|label| release.labels.contains_key(*label));
}

/// Sets version-prefix labels for `spec.kubernetesVersion`, OS descriptor
/// labels, the image-type label and one label per leaf of the image reference,
/// and syncs the incompatible and invalid markers with status.
pub fn augment_os_image(os_image: &mut OsImage) {
    merge_version_prefixes(&mut os_image.labels, &os_image.spec.kubernetes_version);

    let os = &os_image.spec.os;
    let labels = &mut os_image.labels;
    labels.insert(LABEL_OS_TYPE.to_string(), os.os_type.clone());
    labels.insert(LABEL_OS_NAME.to_string(), os.name.clone());
    labels.insert(LABEL_OS_VERSION.to_string(), os.version.clone());
    labels.insert(LABEL_OS_ARCH.to_string(), os.arch.clone());

    let image = &os_image.spec.image;
    labels.insert(LABEL_IMAGE_TYPE.to_string(), image.image_type.clone());
    set_ref_labels(labels, &image.image_type, &image.image_ref);

    ensure_label(labels, LABEL_INCOMPATIBLE, !os_image.status.compatible);
    ensure_label(labels, LABEL_INVALID, !os_image.status.valid);
}

/// Add `<image_type>-<dotted.path>` labels for every leaf of `image_ref`.
///
/// `{"region": "us-east-1", "id": "ami-123"}` with type `ami` yields
/// `ami-region=us-east-1` and `ami-id=ami-123`; nested objects extend the path
/// with `.`.
pub fn set_ref_labels(labels: &mut Labels, image_type: &str, image_ref: &Value) {
    set_ref_label(labels, image_type, "", image_ref);
}

fn set_ref_label(labels: &mut Labels, image_type: &str, path: &str, value: &Value) {
    match value {
        Value::Object(fields) => {
            for (name, field) in fields {
                let path = if path.is_empty() {
                    name.clone()
                } else {
                    format!("{path}.{name}")
                };
                set_ref_label(labels, image_type, &path, field);
            }
        }
        // a scalar ref has no field name to label
        _ if path.is_empty() => {}
        leaf => {
            labels.insert(format!("{image_type}-{path}"), leaf_value(leaf));
        }
    }
}

fn leaf_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn merge_version_prefixes(labels: &mut Labels, version: &str) {
    for prefix in label::prefixes(&label::label(version)) {
        labels.insert(prefix, String::new());
    }
}

fn ensure_label(labels: &mut Labels, label: &str, should_set: bool) {
    if should_set {
        labels.insert(label.to_string(), String::new());
    } else {
        labels.remove(label);
    }
}
