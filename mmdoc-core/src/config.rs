//! Process configuration

use std::collections::BTreeSet;
use std::env;

use tracing::warn;

use crate::backend::BackendKind;

/// Environment variable listing backends to treat as unavailable
pub const DISABLED_BACKENDS_ENV: &str = "MMDOC_DISABLED_BACKENDS";

/// Configuration for the backend availability probe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Backends reported unavailable even when compiled in
    pub disabled_backends: BTreeSet<BackendKind>,
}

impl ProbeConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Self {
        match env::var(DISABLED_BACKENDS_ENV) {
            Ok(value) => Self::parse(&value),
            Err(_) => Self::default(),
        }
    }

    /// Parse a comma separated list of backend names
    ///
    /// Unknown names are logged and skipped.
    pub fn parse(value: &str) -> Self {
        let mut disabled_backends = BTreeSet::new();
        for name in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match name.parse::<BackendKind>() {
                Ok(kind) => {
                    disabled_backends.insert(kind);
                }
                Err(_) => warn!(name, "ignoring unknown backend in {}", DISABLED_BACKENDS_ENV),
            }
        }
        Self { disabled_backends }
    }

    /// Check whether a backend is disabled
    pub fn is_disabled(&self, kind: BackendKind) -> bool {
        self.disabled_backends.contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_disabled_backends() {
        let config = ProbeConfig::parse("candle, torch,,");
        assert!(config.is_disabled(BackendKind::Candle));
        assert!(config.is_disabled(BackendKind::Torch));
        assert!(!config.is_disabled(BackendKind::NdArray));
    }

    #[test]
    fn test_parse_skips_unknown_names() {
        let config = ProbeConfig::parse("jax,numpy");
        assert_eq!(config.disabled_backends.len(), 1);
        assert!(config.is_disabled(BackendKind::NdArray));
    }

    #[test]
    fn test_default_disables_nothing() {
        assert!(ProbeConfig::default().disabled_backends.is_empty());
    }
}
