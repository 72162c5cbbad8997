use thiserror::Error;

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("Invalid version {version:?}: {source}")]
    Parse {
        version: String,
        #[source]
        source: semver::Error,
    },
}
