//! Deployment configuration loading.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use cirrus_aws::DeploymentSpec;

/// Load a deployment spec from a YAML file, or fall back to the built-in
/// defaults when no path is given.
pub fn load_spec(path: Option<&Path>) -> Result<DeploymentSpec> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            let spec: DeploymentSpec = serde_yaml::from_str(&raw)
                .with_context(|| format!("parsing config {}", path.display()))?;
            info!("loaded deployment '{}' from {}", spec.name, path.display());
            Ok(spec)
        }
        None => {
            info!("no config given, using built-in defaults");
            Ok(DeploymentSpec::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_when_no_config() {
        let spec = load_spec(None).unwrap();
        assert_eq!(spec.name, "payment-platform");
        assert_eq!(spec.cidr, "10.1.0.0/16");
    }

    #[test]
    fn test_partial_yaml_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name: staging-platform").unwrap();
        writeln!(file, "cidr: 10.9.0.0/16").unwrap();
        writeln!(file, "features:").unwrap();
        writeln!(file, "  build_pipeline: true").unwrap();

        let spec = load_spec(Some(file.path())).unwrap();
        assert_eq!(spec.name, "staging-platform");
        assert_eq!(spec.cidr, "10.9.0.0/16");
        assert!(spec.features.build_pipeline);
        // Untouched fields keep their defaults.
        assert_eq!(spec.nat_gateways, 1);
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name: [unterminated").unwrap();

        assert!(load_spec(Some(file.path())).is_err());
    }
}
