//! Config validation.

use std::path::Path;

use combat_core::config::CombatConfig;

use crate::error::{Result, ToolError};

/// Load and validate a RON combat config.
///
/// # Errors
///
/// Returns an error if the file is missing, does not parse, or fails
/// validation.
pub fn load_config(path: &Path) -> Result<CombatConfig> {
    if !path.exists() {
        return Err(ToolError::FileNotFound(path.display().to_string()));
    }
    let contents = std::fs::read_to_string(path)?;
    let config = CombatConfig::from_ron_str(&contents)?;
    tracing::debug!(path = %path.display(), seed = config.seed, "Loaded combat config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_reported() {
        let err = load_config(Path::new("does/not/exist.ron")).unwrap_err();
        assert!(matches!(err, ToolError::FileNotFound(_)));
    }

    #[test]
    fn test_valid_file_loads() {
        let path = std::env::temp_dir().join("combat_tools_validate_ok.ron");
        std::fs::write(&path, "(seed: 9)").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.seed, 9);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let path = std::env::temp_dir().join("combat_tools_validate_bad.ron");
        std::fs::write(&path, "(rage: (health_threshold: 2.0))").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ToolError::Config(_)));
        let _ = std::fs::remove_file(path);
    }
}
