//! Configuration for the Modbus bridge.

use aquasight_common::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// MQTT broker settings
    pub mqtt: MqttConfig,

    /// Modbus slave settings
    pub modbus: ModbusConfig,

    /// Site profiles to poll
    pub sites: Vec<SiteConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// MQTT broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker host address (IP or hostname)
    pub host: String,

    /// Broker port (default: 1883)
    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_keep_alive_secs() -> u64 {
    30
}

/// Modbus TCP slave configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModbusConfig {
    /// Slave IP address
    pub host: String,

    /// TCP port (default: 502)
    #[serde(default = "default_modbus_port")]
    pub port: u16,

    /// Modbus unit/slave ID (1-247)
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// Connect/read timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Redial attempts per register read after a transport failure
    #[serde(default = "default_retries")]
    pub retries: u32,
}

fn default_modbus_port() -> u16 {
    502
}

fn default_unit_id() -> u8 {
    1
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_retries() -> u32 {
    3
}

/// Profile of a single monitored site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site identifier (e.g. "t500"), used to derive topic and client id
    pub id: String,

    /// MQTT topic override; defaults to `wwtp/<id>/data`
    #[serde(default)]
    pub topic: Option<String>,

    /// MQTT client identifier override; defaults to `<id>-modbus-bridge`
    #[serde(default)]
    pub client_id: Option<String>,

    /// Poll interval in seconds, measured from the end of each cycle
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Instrument fields in publish order
    pub fields: Vec<FieldConfig>,
}

fn default_poll_interval() -> u64 {
    60
}

impl SiteConfig {
    /// The MQTT topic this site publishes to.
    pub fn topic(&self) -> String {
        self.topic
            .clone()
            .unwrap_or_else(|| format!("wwtp/{}/data", self.id))
    }

    /// The MQTT client identifier for this site's session.
    pub fn client_id(&self) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| format!("{}-modbus-bridge", self.id))
    }
}

/// One measurement field: a name and the starting address of its
/// 2-register block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Field name as published in the payload
    pub name: String,

    /// Starting holding-register address
    pub address: u16,
}

impl BridgeConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: BridgeConfig = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sites.is_empty() {
            return Err(ConfigError::Validation(
                "At least one site must be configured".to_string(),
            ));
        }

        if self.modbus.unit_id == 0 {
            return Err(ConfigError::Validation(
                "unit_id must be 1-247".to_string(),
            ));
        }

        for site in &self.sites {
            if site.id.is_empty() {
                return Err(ConfigError::Validation(
                    "Site id cannot be empty".to_string(),
                ));
            }

            if site.fields.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Site '{}': must declare at least one field",
                    site.id
                )));
            }

            for field in &site.fields {
                if field.name.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "Site '{}': field name cannot be empty",
                        site.id
                    )));
                }

                if field.address == u16::MAX {
                    return Err(ConfigError::Validation(format!(
                        "Site '{}': field '{}' at address {} has no room for a second register",
                        site.id, field.name, field.address
                    )));
                }
            }

            let mut names: Vec<&str> = site.fields.iter().map(|f| f.name.as_str()).collect();
            names.sort_unstable();
            names.dedup();
            if names.len() != site.fields.len() {
                return Err(ConfigError::Validation(format!(
                    "Site '{}': duplicate field names",
                    site.id
                )));
            }

            // Each field occupies [address, address + 1]; blocks must not overlap.
            let mut addresses: Vec<u16> = site.fields.iter().map(|f| f.address).collect();
            addresses.sort_unstable();
            for pair in addresses.windows(2) {
                if pair[1] - pair[0] < 2 {
                    return Err(ConfigError::Validation(format!(
                        "Site '{}': register blocks at {} and {} overlap",
                        site.id, pair[0], pair[1]
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let json = r#"{
            mqtt: { host: "192.168.100.8" },
            modbus: { host: "192.168.100.1" },
            sites: [
                {
                    id: "t500",
                    fields: [
                        { name: "cod", address: 9 },
                        { name: "tss", address: 11 }
                    ]
                }
            ]
        }"#;

        let config: BridgeConfig = json5::from_str(json).unwrap();
        config.validate().unwrap();

        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.modbus.port, 502);
        assert_eq!(config.modbus.unit_id, 1);
        assert_eq!(config.sites.len(), 1);
        assert_eq!(config.sites[0].poll_interval_secs, 60);
        assert_eq!(config.sites[0].fields[1].address, 11);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_topic_and_client_id_defaults() {
        let site = SiteConfig {
            id: "t700".to_string(),
            topic: None,
            client_id: None,
            poll_interval_secs: 60,
            fields: vec![FieldConfig {
                name: "cod".to_string(),
                address: 1,
            }],
        };

        assert_eq!(site.topic(), "wwtp/t700/data");
        assert_eq!(site.client_id(), "t700-modbus-bridge");
    }

    #[test]
    fn test_topic_and_client_id_overrides() {
        let json = r#"{
            mqtt: { host: "broker" },
            modbus: { host: "slave" },
            sites: [
                {
                    id: "t700",
                    topic: "plant/effluent",
                    client_id: "rpi01_modbus_publisher",
                    fields: [ { name: "cod", address: 1 } ]
                }
            ]
        }"#;

        let config: BridgeConfig = json5::from_str(json).unwrap();
        assert_eq!(config.sites[0].topic(), "plant/effluent");
        assert_eq!(config.sites[0].client_id(), "rpi01_modbus_publisher");
    }

    #[test]
    fn test_validate_empty_sites() {
        let json = r#"{
            mqtt: { host: "broker" },
            modbus: { host: "slave" },
            sites: []
        }"#;

        let config: BridgeConfig = json5::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_fields() {
        let json = r#"{
            mqtt: { host: "broker" },
            modbus: { host: "slave" },
            sites: [ { id: "t500", fields: [] } ]
        }"#;

        let config: BridgeConfig = json5::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_overlapping_registers() {
        let json = r#"{
            mqtt: { host: "broker" },
            modbus: { host: "slave" },
            sites: [
                {
                    id: "t500",
                    fields: [
                        { name: "cod", address: 9 },
                        { name: "tss", address: 10 }
                    ]
                }
            ]
        }"#;

        let config: BridgeConfig = json5::from_str(json).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_validate_duplicate_field_names() {
        let json = r#"{
            mqtt: { host: "broker" },
            modbus: { host: "slave" },
            sites: [
                {
                    id: "t500",
                    fields: [
                        { name: "cod", address: 1 },
                        { name: "cod", address: 3 }
                    ]
                }
            ]
        }"#;

        let config: BridgeConfig = json5::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_unit_id() {
        let json = r#"{
            mqtt: { host: "broker" },
            modbus: { host: "slave", unit_id: 0 },
            sites: [ { id: "t500", fields: [ { name: "cod", address: 9 } ] } ]
        }"#;

        let config: BridgeConfig = json5::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }
}
