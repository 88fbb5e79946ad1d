use graft_mapping::RegistryBuilder;
use graft_patch::PatchConfig;
use graft_search::SearchConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub mapping: MappingSettings,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub patch: PatchConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.search.validate()?;
        self.patch.validate()?;
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingSettings {
    /// Match presentation field names ignoring ASCII case.
    #[serde(default = "default_case_insensitive")]
    pub case_insensitive_fields: bool,
}
fn default_case_insensitive() -> bool {
    true
}
impl Default for MappingSettings {
    fn default() -> Self {
        Self {
            case_insensitive_fields: default_case_insensitive(),
        }
    }
}

impl MappingSettings {
    /// Carry these settings into a registry under construction.
    pub fn apply(&self, builder: RegistryBuilder) -> RegistryBuilder {
        builder.case_insensitive_fields(self.case_insensitive_fields)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    /// Default file looked up in the working directory.
    pub const DEFAULT_CONFIG_FILE: &str = "graft.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let file = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if file.exists() {
            builder = builder.add_source(File::from(file));
        } else if path.is_some() {
            return Err(format!("config file not found: {}", file.display()));
        }
        // Environment variable overrides, e.g., GRAFT__SEARCH__MAX_FILTER_TOKENS=16
        builder = builder.add_source(
            Environment::with_prefix("GRAFT")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }

    pub fn load_config_with_default_path<P: AsRef<Path>>(path: Option<P>) -> Result<AppConfig, String> {
        let p = path
            .as_ref()
            .map(|p| p.as_ref().to_string_lossy().to_string());
        load_config(p.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_mapping::fixtures::shop_builder;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(cfg.mapping.case_insensitive_fields);
        assert_eq!(cfg.search.max_filter_tokens, 32);
        assert_eq!(cfg.search.max_order_tokens, 8);
        assert_eq!(cfg.patch.max_operations, 256);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_invalid_level() {
        let cfg = AppConfig {
            logging: LoggingConfig {
                level: "loud".into(),
            },
            ..AppConfig::default()
        };
        assert!(cfg.validate().unwrap_err().contains("logging.level"));
    }

    #[test]
    fn test_mapping_settings_reach_the_registry() {
        let settings = MappingSettings {
            case_insensitive_fields: false,
        };
        let registry = settings.apply(shop_builder()).build().unwrap();
        assert!(!registry.case_insensitive());
        assert!(registry.lookup("OrderDto", "PLACEDON").is_none());
        assert!(registry.lookup("OrderDto", "placedOn").is_some());
    }
}
