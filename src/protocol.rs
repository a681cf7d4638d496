//! Protocol versions understood by the node

use anyhow::{Context, Result};
use semver::Version;

/// Protocol versions this node can operate with
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["0.2.0", "0.3.0"];

/// First protocol version that requires a commitment before registering or
/// updating a node URL
pub const COMMITMENT_PROTOCOL_VERSION: Version = Version::new(0, 3, 0);

pub fn parse_protocol_version(version: &str) -> Result<Version> {
    Version::parse(version).with_context(|| format!("Invalid protocol version: {}", version))
}

pub fn is_supported_protocol_version(version: &Version) -> bool {
    SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .filter_map(|v| Version::parse(v).ok())
        .any(|supported| &supported == version)
}

/// Whether node registration and URL updates go through commit-then-act
pub fn requires_commitment(version: &Version) -> bool {
    *version >= COMMITMENT_PROTOCOL_VERSION
}
