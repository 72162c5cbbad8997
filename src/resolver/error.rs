use thiserror::Error;

use crate::version::error::VersionError;

#[derive(Debug, Error)]
pub enum ResolveError {
    /// Only valid releases may reach ranking, so this is a broken upstream invariant
    #[error("Release {release:?} has an unparseable version: {source}")]
    InvalidVersion {
        release: String,
        #[source]
        source: VersionError,
    },
}
