//! Label-safe version strings and version-prefix label sets

use std::collections::BTreeSet;

/// Replacement for `+`, which label keys and object names cannot contain
pub const BUILD_METADATA_SEPARATOR: &str = "---";

/// Encode a version as a label-safe string: `v1.17.9+vmware.2` -> `v1.17.9---vmware.2`
pub fn label(version: &str) -> String {
    version.replace('+', BUILD_METADATA_SEPARATOR)
}

/// All prefixes of a version label that end on a component boundary,
/// including the label itself.
///
/// `v1.17.9---vmware.2-tkg.3` yields `v1.17.9---vmware.2-tkg.3`,
/// `v1.17.9---vmware.2-tkg`, `v1.17.9---vmware.2`, `v1.17.9---vmware`,
/// `v1.17.9`, `v1.17` and `v1`.
pub fn prefixes(version_label: &str) -> BTreeSet<String> {
    let mut result = BTreeSet::new();
    if version_label.is_empty() {
        return result;
    }

    let mut prev_alphanumeric = false;
    for (i, c) in version_label.char_indices() {
        let alphanumeric = c.is_ascii_alphanumeric();
        if !alphanumeric && prev_alphanumeric {
            result.insert(version_label[..i].to_string());
        }
        prev_alphanumeric = alphanumeric;
    }
    result.insert(version_label.to_string());

    result
}
