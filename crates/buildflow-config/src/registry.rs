//! Registry identity helpers
//!
//! Destination image naming, tag validation, and registry host inference.

use crate::error::{ConfigError, Result};

/// Auth-config key kaniko expects for Docker Hub credentials.
pub const DOCKER_HUB_AUTH_SERVER: &str = "https://index.docker.io/v1/";

/// Tag used when `DOCKER_TAG` is unset.
pub const DEFAULT_TAG: &str = "latest";

/// Extract the registry host from an image reference
///
/// # Examples
/// - `ghcr.io/org/app:tag` -> `ghcr.io`
/// - `myuser/app:tag` -> `docker.io`
/// - `123456.dkr.ecr.region.amazonaws.com/app` -> `123456.dkr.ecr.region.amazonaws.com`
/// - `localhost:5000/app` -> `localhost:5000`
pub fn extract_registry(image: &str) -> &str {
    if let Some((first, _)) = image.split_once('/')
        && (first.contains('.') || first.contains(':'))
    {
        return first;
    }

    "docker.io"
}

/// Key under which registry credentials are stored in the auth-config document.
///
/// Docker Hub credentials must be keyed by the legacy index URL; every other
/// registry is keyed by its host.
pub fn auth_server_for(image: &str) -> String {
    match extract_registry(image) {
        "docker.io" => DOCKER_HUB_AUTH_SERVER.to_string(),
        host => host.to_string(),
    }
}

/// Longest tag a registry accepts
const MAX_TAG_LEN: usize = 128;

/// Check `tag` against the registry tag grammar `[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}`
pub fn validate_tag(tag: &str) -> Result<()> {
    let invalid = |reason: &'static str| ConfigError::InvalidTag {
        tag: tag.to_string(),
        reason,
    };
    let tag_char = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-');

    let Some(first) = tag.chars().next() else {
        return Err(invalid("tag is empty"));
    };
    if tag.len() > MAX_TAG_LEN {
        return Err(invalid("longer than 128 characters"));
    }
    if !(first.is_ascii_alphanumeric() || first == '_') {
        return Err(invalid("must start with a letter, digit or underscore"));
    }
    if !tag.chars().all(tag_char) {
        return Err(invalid("only letters, digits, '_', '.' and '-' are allowed"));
    }

    Ok(())
}
