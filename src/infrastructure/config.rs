use crate::domain::config::{DeviceConfig, LinkConfig, PhysisConfig};
use crate::domain::error::{PhysisError, PhysisResult};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = ".physis";
const CONFIG_FILE: &str = "config.toml";

/// Configuration manager
pub struct ConfigManager {
    global_config_path: PathBuf,
    project_config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Create new configuration manager
    pub fn new() -> PhysisResult<Self> {
        let global_config_path = Self::get_global_config_path()?;
        let project_config_path = Self::find_project_config_path();

        Ok(Self {
            global_config_path,
            project_config_path,
        })
    }

    /// Manager rooted at explicit paths
    pub fn with_paths(global_config_path: PathBuf, project_config_path: Option<PathBuf>) -> Self {
        Self {
            global_config_path,
            project_config_path,
        }
    }

    /// Load configuration from files
    pub fn load_config(&self) -> PhysisResult<PhysisConfig> {
        let mut config = PhysisConfig::default();

        if self.global_config_path.exists() {
            let global_config = self.load_config_from_path(&self.global_config_path)?;
            config.global = global_config.global;
            config.simulator = global_config.simulator;
            config.devices = global_config.devices;
        }

        // Project settings win; project devices are added after global ones
        if let Some(project_path) = &self.project_config_path {
            if project_path.exists() {
                let project_config = self.load_config_from_path(project_path)?;
                config.global = project_config.global;
                config.simulator = project_config.simulator;
                config.devices.extend(project_config.devices);
            }
        }

        Ok(config)
    }

    /// Get global configuration path
    fn get_global_config_path() -> PhysisResult<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| PhysisError::Config {
            message: "Could not determine home directory".to_string(),
        })?;

        Ok(home.join(".config").join("physis").join(CONFIG_FILE))
    }

    /// Find project configuration path by walking up directory tree
    fn find_project_config_path() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        let mut path = current_dir.as_path();

        loop {
            let config_path = path.join(CONFIG_DIR).join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }

            path = path.parent()?;
        }
    }

    /// Load configuration from specific path
    pub fn load_config_from_path(&self, path: &Path) -> PhysisResult<PhysisConfig> {
        let content = fs::read_to_string(path).map_err(|e| PhysisError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| PhysisError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })
    }

    /// Save configuration to specific path
    pub fn save_config_to_path(&self, path: &Path, config: &PhysisConfig) -> PhysisResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PhysisError::Config {
                message: format!("Failed to create config directory: {}", e),
            })?;
        }

        let content = toml::to_string_pretty(config).map_err(|e| PhysisError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| PhysisError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })
    }

    /// Create a project configuration with one example kit per link type
    pub fn init_project_config(&self, path: &Path) -> PhysisResult<PathBuf> {
        let config_file = path.join(CONFIG_DIR).join(CONFIG_FILE);

        if config_file.exists() {
            return Err(PhysisError::Config {
                message: "Project configuration already exists".to_string(),
            });
        }

        let default_config = PhysisConfig {
            devices: vec![
                DeviceConfig {
                    name: "example_ble".to_string(),
                    description: "Kit reached directly over BLE".to_string(),
                    link: LinkConfig::Ble {
                        serial_number: "PHYSIS-SIM".to_string(),
                    },
                },
                DeviceConfig {
                    name: "example_mqtt".to_string(),
                    description: "Kit reached through a broker".to_string(),
                    link: LinkConfig::Mqtt {
                        serial_number: "PHYSIS-SIM".to_string(),
                        subscribe_topic: "physis/monitor".to_string(),
                        publish_topic: "physis/control".to_string(),
                    },
                },
            ],
            ..PhysisConfig::default()
        };

        self.save_config_to_path(&config_file, &default_config)?;

        Ok(config_file)
    }

    /// Get the current project config path (if any)
    pub fn get_project_config_path(&self) -> Option<&PathBuf> {
        self.project_config_path.as_ref()
    }

    /// Get the global config path
    pub fn get_global_config_path_ref(&self) -> &PathBuf {
        &self.global_config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::SubscribePolicy;
    use tempfile::TempDir;

    fn isolated(temp_dir: &TempDir) -> ConfigManager {
        ConfigManager::with_paths(temp_dir.path().join("global.toml"), None)
    }

    #[test]
    fn test_config_manager_creation() {
        let _manager = ConfigManager::new().unwrap();
    }

    #[test]
    fn test_load_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = isolated(&temp_dir).load_config().unwrap();

        assert_eq!(config.global.log_level, "info");
        assert_eq!(config.global.history_limit, 1000);
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_init_project_config() {
        let temp_dir = TempDir::new().unwrap();
        let manager = isolated(&temp_dir);

        let config_file = manager.init_project_config(temp_dir.path()).unwrap();
        assert_eq!(config_file, temp_dir.path().join(".physis").join("config.toml"));

        let config = manager.load_config_from_path(&config_file).unwrap();
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.devices[1].link.kind(), "mqtt");

        assert!(manager.init_project_config(temp_dir.path()).is_err());
    }

    #[test]
    fn test_project_overrides_global() {
        let temp_dir = TempDir::new().unwrap();
        let global_path = temp_dir.path().join("global.toml");
        let project_path = temp_dir.path().join("project.toml");

        fs::write(
            &global_path,
            r#"
            [global]
            log_level = "debug"

            [[devices]]
            name = "a"
            link = { type = "ble", serial_number = "A1" }
            "#,
        )
        .unwrap();
        fs::write(
            &project_path,
            r#"
            [global]
            subscribe_policy = "always"

            [[devices]]
            name = "b"
            link = { type = "ble", serial_number = "B1" }
            "#,
        )
        .unwrap();

        let manager = ConfigManager::with_paths(global_path, Some(project_path));
        let config = manager.load_config().unwrap();
        assert_eq!(config.global.subscribe_policy, SubscribePolicy::Always);
        assert_eq!(config.global.log_level, "info");
        let names: Vec<&str> = config.devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let bad = temp_dir.path().join("bad.toml");
        fs::write(&bad, "global = 3").unwrap();

        let err = isolated(&temp_dir).load_config_from_path(&bad).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }
}
