//! Configuration loading and conversion into a directory snapshot
//!
//! The file is JSON with `Modes` and `Settings` sections. Mode and server maps
//! are read into [`OrderedMap`] so the order written in the file is the order
//! used for menus and round-robin advertisement.

use crate::directory::{Mode, ServerDirectory, ServerEntry};
use crate::error::ConfigError;
use crate::policy::ErrorPolicy;
use log::{info, warn};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "servers_info.json";

/// JSON object that keeps its keys in file order. Duplicate keys are kept so
/// validation can reject them instead of silently overwriting.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(pub Vec<(String, V)>);

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<V> OrderedMap<V> {
    pub fn iter(&self) -> impl Iterator<Item = (&String, &V)> {
        self.0.iter().map(|(key, value)| (key, value))
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedMapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    entries.push((key, value));
                }
                Ok(OrderedMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServersInfoConfig {
    #[serde(rename = "Modes", default)]
    pub modes: OrderedMap<ModeConfig>,
    #[serde(rename = "Settings", default)]
    pub settings: SettingsConfig,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModeConfig {
    #[serde(default)]
    pub servers: OrderedMap<ServerConfig>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub alias_ip: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_adv_time() -> f32 {
    60.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsConfig {
    #[serde(default = "default_adv_time")]
    pub adv_time: f32,
    #[serde(default)]
    pub order: bool,
    #[serde(default = "default_true")]
    pub show_categories: bool,
    #[serde(default = "default_true")]
    pub log_errors: bool,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            adv_time: default_adv_time(),
            order: true,
            show_categories: true,
            log_errors: true,
        }
    }
}

fn server(ip: &str, display_name: &str, alias_ip: &str) -> ServerConfig {
    ServerConfig {
        ip: Some(ip.to_string()),
        alias_ip: Some(alias_ip.to_string()),
        display_name: Some(display_name.to_string()),
    }
}

impl Default for ServersInfoConfig {
    fn default() -> Self {
        let awp = ModeConfig {
            servers: OrderedMap(vec![
                ("server1".to_string(), server("127.0.0.1:27015", "AWP #1", "")),
                ("server2".to_string(), server("127.0.0.1:27016", "AWP #2", "")),
            ]),
        };
        let public = ModeConfig {
            servers: OrderedMap(vec![(
                "server1".to_string(),
                server("127.0.0.1:27017", "Public #1", "203.0.113.1:27016"),
            )]),
        };

        Self {
            modes: OrderedMap(vec![
                ("AWP".to_string(), awp),
                ("PUBLIC".to_string(), public),
            ]),
            settings: SettingsConfig::default(),
        }
    }
}

/// Validated runtime settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub advertise_interval: Duration,
    pub ordered_advertisement: bool,
    pub show_categories: bool,
    pub log_query_errors: bool,
}

impl Settings {
    pub fn error_policy(&self) -> ErrorPolicy {
        ErrorPolicy::new(self.log_query_errors)
    }
}

impl TryFrom<&SettingsConfig> for Settings {
    type Error = ConfigError;

    fn try_from(config: &SettingsConfig) -> Result<Self, Self::Error> {
        if !config.adv_time.is_finite() || config.adv_time <= 0.0 {
            return Err(ConfigError::InvalidInterval(config.adv_time));
        }

        let advertise_interval = Duration::try_from_secs_f32(config.adv_time)
            .map_err(|_| ConfigError::InvalidInterval(config.adv_time))?;

        Ok(Self {
            advertise_interval,
            ordered_advertisement: config.order,
            show_categories: config.show_categories,
            log_query_errors: config.log_errors,
        })
    }
}

/// One configuration generation. Settings and directory always travel together
/// so readers never mix generations.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub generation: u64,
    pub directory: ServerDirectory,
    pub settings: Settings,
}

impl Snapshot {
    pub fn from_config(config: &ServersInfoConfig, generation: u64) -> Result<Self, ConfigError> {
        let settings = Settings::try_from(&config.settings)?;

        let mut mode_keys = HashSet::new();
        let mut modes = Vec::with_capacity(config.modes.0.len());

        for (mode_key, mode) in config.modes.iter() {
            if !mode_keys.insert(mode_key.as_str()) {
                return Err(ConfigError::DuplicateMode(mode_key.clone()));
            }

            let mut server_keys = HashSet::new();
            let mut servers = Vec::with_capacity(mode.servers.0.len());

            for (server_key, server) in mode.servers.iter() {
                if !server_keys.insert(server_key.as_str()) {
                    return Err(ConfigError::DuplicateServer {
                        mode: mode_key.clone(),
                        server: server_key.clone(),
                    });
                }

                servers.push(
                    ServerEntry::new(
                        server_key.as_str(),
                        server.ip.as_deref().unwrap_or_default().trim(),
                        server.display_name.as_deref().unwrap_or_default(),
                    )
                    .with_alias(server.alias_ip.as_deref().unwrap_or_default().trim()),
                );
            }

            modes.push(Mode::new(mode_key.as_str(), servers));
        }

        let directory = ServerDirectory::new(modes);
        for (mode, server) in directory.inert_servers() {
            warn!("Server {mode}.{server} has no ip or display_name and will be skipped");
        }

        Ok(Self {
            generation,
            directory,
            settings,
        })
    }
}

pub fn parse(path: &Path, contents: &str) -> Result<ServersInfoConfig, ConfigError> {
    serde_json::from_str(contents).map_err(|err| ConfigError::Parse(path.to_path_buf(), err))
}

/// Reads the config at `path`, writing the default config first if the file
/// does not exist yet.
pub fn load_or_create(path: &Path) -> Result<ServersInfoConfig, ConfigError> {
    if !path.exists() {
        let config = ServersInfoConfig::default();
        let contents = serde_json::to_string_pretty(&config).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        info!("Config {} was missing, a default one was created", path.display());
        return Ok(config);
    }

    let contents =
        std::fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
    parse(path, &contents)
}

pub fn load_snapshot(path: &Path, generation: u64) -> Result<Snapshot, ConfigError> {
    let config = load_or_create(path)?;
    let snapshot = Snapshot::from_config(&config, generation)?;
    info!(
        "Loaded {} ({} modes, {} servers, generation {})",
        path.display(),
        snapshot.directory.modes().len(),
        snapshot.directory.server_count(),
        generation
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::path::PathBuf;

    fn test_path() -> PathBuf {
        PathBuf::from("servers_info.json")
    }

    const SAMPLE: &str = r#"{
        "Modes": {
            "PUBLIC": {
                "servers": {
                    "server1": { "ip": "127.0.0.1:27017", "alias_ip": "203.0.113.1:27016", "display_name": "Public #1" }
                }
            },
            "AWP": {
                "servers": {
                    "server2": { "ip": "127.0.0.1:27016", "alias_ip": "", "display_name": "AWP #2" },
                    "server1": { "ip": "127.0.0.1:27015", "display_name": "AWP #1" }
                }
            }
        },
        "Settings": { "adv_time": 30.5, "order": false, "show_categories": false, "log_errors": false }
    }"#;

    #[test]
    fn test_parse_keeps_file_order() {
        let config = parse(&test_path(), SAMPLE).unwrap();
        let snapshot = Snapshot::from_config(&config, 1).unwrap();

        assert_eq!(snapshot.directory.modes(), vec!["PUBLIC", "AWP"]);
        let keys: Vec<&str> = snapshot
            .directory
            .servers_in("AWP")
            .unwrap()
            .iter()
            .map(|server| server.key.as_str())
            .collect();
        assert_eq!(keys, vec!["server2", "server1"]);
    }

    #[test]
    fn test_parse_settings() {
        let config = parse(&test_path(), SAMPLE).unwrap();
        let settings = Settings::try_from(&config.settings).unwrap();

        assert_approx_eq!(settings.advertise_interval.as_secs_f32(), 30.5, 0.001);
        assert!(!settings.ordered_advertisement);
        assert!(!settings.show_categories);
        assert!(!settings.log_query_errors);
        assert!(!settings.error_policy().should_log());
    }

    #[test]
    fn test_missing_settings_use_defaults() {
        let config = parse(&test_path(), r#"{ "Modes": {} }"#).unwrap();
        assert!(config.settings.show_categories);
        assert!(config.settings.log_errors);
        assert_approx_eq!(config.settings.adv_time, 60.0, 0.001);
    }

    #[test]
    fn test_alias_handling() {
        let config = parse(&test_path(), SAMPLE).unwrap();
        let snapshot = Snapshot::from_config(&config, 1).unwrap();
        let all = snapshot.directory.all_servers();

        assert_eq!(all[0].1.alias_address.as_deref(), Some("203.0.113.1:27016"));
        assert_eq!(all[1].1.alias_address, None);
        assert_eq!(all[2].1.alias_address, None);
    }

    #[test]
    fn test_invalid_interval_rejected() {
        for adv_time in [0.0, -5.0, f32::NAN, f32::INFINITY, 1e20] {
            let mut config = ServersInfoConfig::default();
            config.settings.adv_time = adv_time;
            assert!(matches!(
                Snapshot::from_config(&config, 1),
                Err(ConfigError::InvalidInterval(_))
            ));
        }
    }

    #[test]
    fn test_duplicate_mode_rejected() {
        let json = r#"{ "Modes": { "AWP": { "servers": {} }, "AWP": { "servers": {} } } }"#;
        let config = parse(&test_path(), json).unwrap();
        assert!(matches!(
            Snapshot::from_config(&config, 1),
            Err(ConfigError::DuplicateMode(mode)) if mode == "AWP"
        ));
    }

    #[test]
    fn test_duplicate_server_rejected() {
        let json = r#"{ "Modes": { "AWP": { "servers": {
            "server1": { "ip": "127.0.0.1:1", "display_name": "a" },
            "server1": { "ip": "127.0.0.1:2", "display_name": "b" }
        } } } }"#;
        let config = parse(&test_path(), json).unwrap();
        assert!(matches!(
            Snapshot::from_config(&config, 1),
            Err(ConfigError::DuplicateServer { .. })
        ));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            parse(&test_path(), "{ \"Modes\": "),
            Err(ConfigError::Parse(_, _))
        ));
    }

    #[test]
    fn test_default_config_round_trips_through_json() {
        let config = ServersInfoConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed = parse(&test_path(), &json).unwrap();
        assert_eq!(parsed, config);

        let snapshot = Snapshot::from_config(&parsed, 1).unwrap();
        assert_eq!(snapshot.directory.modes(), vec!["AWP", "PUBLIC"]);
        assert_eq!(snapshot.directory.server_count(), 3);
        assert!(snapshot.settings.ordered_advertisement);
    }

    #[test]
    fn test_load_or_create_writes_default() {
        let dir = std::env::temp_dir().join(format!("servers-info-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("servers_info.json");
        let _ = std::fs::remove_file(&path);

        let created = load_or_create(&path).unwrap();
        assert!(path.exists());
        let reloaded = load_or_create(&path).unwrap();
        assert_eq!(created, reloaded);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
