//! Deployment profiles and execution modes.

use crate::{Error, Result};
use serde::Deserialize;

/// Where the backend is deployed.
///
/// The profile only selects default hostnames; any explicit host or URI
/// setting wins over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentProfile {
    /// Docker Compose service names (`mongo`, `redis`).
    #[default]
    Compose,
    /// Kubernetes service names (`mongo-service`, `redis-service`).
    Kubernetes,
}

impl DeploymentProfile {
    /// Parses a profile name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for unknown names.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "compose" | "docker" | "docker-compose" => Ok(Self::Compose),
            "kubernetes" | "k8s" => Ok(Self::Kubernetes),
            other => Err(Error::InvalidConfig(format!(
                "unknown deployment profile '{other}' (expected compose or kubernetes)"
            ))),
        }
    }

    /// Returns the profile name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Compose => "compose",
            Self::Kubernetes => "kubernetes",
        }
    }

    /// Default database host for this profile.
    #[must_use]
    pub const fn database_host(self) -> &'static str {
        match self {
            Self::Compose => "mongo",
            Self::Kubernetes => "mongo-service",
        }
    }

    /// Default cache host for this profile.
    #[must_use]
    pub const fn cache_host(self) -> &'static str {
        match self {
            Self::Compose => "redis",
            Self::Kubernetes => "redis-service",
        }
    }
}

impl std::fmt::Display for DeploymentProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether connectors may touch the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Connect to real dependencies.
    #[default]
    Normal,
    /// Skip every connection attempt.
    Test,
}

impl ExecutionMode {
    /// Maps a `NODE_ENV` style environment name to a mode.
    ///
    /// `test` selects [`ExecutionMode::Test`]; every other name, including
    /// ones this crate has never heard of, runs normally.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("test") {
            Self::Test
        } else {
            Self::Normal
        }
    }

    /// Returns `true` if network I/O is suppressed.
    #[must_use]
    pub const fn skips_network(self) -> bool {
        matches!(self, Self::Test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("compose", DeploymentProfile::Compose; "compose")]
    #[test_case("Docker", DeploymentProfile::Compose; "docker alias")]
    #[test_case("kubernetes", DeploymentProfile::Kubernetes; "kubernetes")]
    #[test_case(" k8s ", DeploymentProfile::Kubernetes; "k8s alias trimmed")]
    fn test_profile_parse(input: &str, expected: DeploymentProfile) {
        assert_eq!(DeploymentProfile::parse(input).ok(), Some(expected));
    }

    #[test]
    fn test_profile_parse_unknown() {
        assert!(matches!(
            DeploymentProfile::parse("nomad"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_profile_hosts() {
        assert_eq!(DeploymentProfile::Compose.database_host(), "mongo");
        assert_eq!(DeploymentProfile::Compose.cache_host(), "redis");
        assert_eq!(DeploymentProfile::Kubernetes.database_host(), "mongo-service");
        assert_eq!(DeploymentProfile::Kubernetes.cache_host(), "redis-service");
    }

    #[test_case("test", ExecutionMode::Test)]
    #[test_case("TEST", ExecutionMode::Test)]
    #[test_case("production", ExecutionMode::Normal)]
    #[test_case("development", ExecutionMode::Normal)]
    #[test_case("qa", ExecutionMode::Normal)]
    #[test_case("ci", ExecutionMode::Normal)]
    #[test_case("testing", ExecutionMode::Normal)]
    fn test_mode_from_name(input: &str, expected: ExecutionMode) {
        assert_eq!(ExecutionMode::from_name(input), expected);
    }

    #[test]
    fn test_mode_skips_network() {
        assert!(ExecutionMode::Test.skips_network());
        assert!(!ExecutionMode::Normal.skips_network());
    }
}
