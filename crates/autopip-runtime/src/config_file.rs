//! Settings files for the CLI: the stored settings shape as TOML or JSON.

use std::path::{Path, PathBuf};

use autopip_core::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported settings format: {} (expected .toml or .json)", path.display())]
    UnsupportedFormat { path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
}

impl Format {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Some(Self::Toml),
            Some("json") => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn load(path: &Path) -> Result<Config, ConfigFileError> {
    let format = Format::from_path(path).ok_or_else(|| ConfigFileError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    let text = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text, format, path)
}

/// Built-in defaults when no file is given.
pub fn load_or_default(path: Option<&Path>) -> Result<Config, ConfigFileError> {
    match path {
        Some(path) => load(path),
        None => Ok(Config::default()),
    }
}

pub fn parse(text: &str, format: Format, origin: &Path) -> Result<Config, ConfigFileError> {
    match format {
        Format::Toml => toml::from_str(text).map_err(|source| ConfigFileError::Toml {
            path: origin.to_path_buf(),
            source,
        }),
        Format::Json => serde_json::from_str(text).map_err(|source| ConfigFileError::Json {
            path: origin.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autopip_core::config::Feature;

    #[test]
    fn toml_uses_stored_key_names() {
        let text = r#"
            enabled = true
            collapseWidthPx = 12
            exitOnExpand = false
            showBlockAlerts = false

            [siteSettings."www.youtube.com"]
            enableTab = false
        "#;
        let cfg = parse(text, Format::Toml, Path::new("s.toml")).unwrap();
        assert_eq!(cfg.collapse_width_px, 12);
        assert_eq!(cfg.collapse_height_px, 80);
        assert!(!cfg.exit_on_expand);
        assert!(!cfg.show_block_alerts);
        assert!(!cfg.site_enabled("www.youtube.com", Feature::TabSwitch));
        assert!(cfg.site_enabled("www.youtube.com", Feature::PanelCollapse));
    }

    #[test]
    fn json_ignores_deprecated_keys() {
        let text = r#"{"armMinutes": 5, "siteEnabled": {"a.com": false}, "enableTabSwitch": false}"#;
        let cfg = parse(text, Format::Json, Path::new("s.json")).unwrap();
        assert_eq!(cfg.arm_minutes, 5);
        assert!(cfg.site_enabled("a.com", Feature::TabSwitch));
    }

    #[test]
    fn errors_name_the_file() {
        let err = parse("enabled = [", Format::Toml, Path::new("broken.toml")).unwrap_err();
        assert!(matches!(err, ConfigFileError::Toml { .. }));
        assert!(err.to_string().contains("broken.toml"));

        let err = load(Path::new("settings.yaml")).unwrap_err();
        assert!(matches!(err, ConfigFileError::UnsupportedFormat { .. }));

        let err = load(Path::new("/nonexistent/autopip/settings.json")).unwrap_err();
        assert!(matches!(err, ConfigFileError::Io { .. }));
    }
}
