use std::path::PathBuf;
use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;

/// Top-level configuration for the gateway process.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub gateway: GatewaySettings,
    pub logging: LoggingSettings,
}

/// How the gateway device is reached.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    Serial,
    Ip,
}

/// Connection and protocol settings for one gateway.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GatewaySettings {
    pub kind: GatewayKind,
    pub serial_port: String,
    pub baud_rate: u32,
    pub ip_address: String,
    pub tcp_port: u16,
    /// Minimum gap between two transmissions.
    pub send_delay_ms: u64,
    pub skip_startup_check: bool,
    pub enable_network_sanity_check: bool,
    /// Answer I_CONFIG with "I" instead of "M".
    pub imperial_units: bool,
    pub reconnect_interval_ms: u64,
    pub startup_check_attempts: u32,
    pub startup_check_timeout_ms: u64,
    pub sanity_check_interval_ms: u64,
    pub sanity_check_reply_timeout_ms: u64,
    pub sanity_check_max_missed: u32,
    pub id_cache_path: PathBuf,
}

impl GatewaySettings {
    /// Minimum gap between two transmissions.
    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }

    /// Supervisor tick; never shorter than 1ms.
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms.max(1))
    }

    /// How long each handshake attempt waits for the I_VERSION reply.
    pub fn startup_check_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_check_timeout_ms)
    }

    /// Period between liveness probes; never shorter than 1ms.
    pub fn sanity_check_interval(&self) -> Duration {
        Duration::from_millis(self.sanity_check_interval_ms.max(1))
    }

    /// How long a liveness probe waits for its reply.
    pub fn sanity_check_reply_timeout(&self) -> Duration {
        Duration::from_millis(self.sanity_check_reply_timeout_ms)
    }

    /// Reject values that would stop the gateway from ever connecting or
    /// probing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = [
            ("reconnect_interval_ms", self.reconnect_interval_ms),
            ("startup_check_timeout_ms", self.startup_check_timeout_ms),
            ("sanity_check_interval_ms", self.sanity_check_interval_ms),
            ("sanity_check_reply_timeout_ms", self.sanity_check_reply_timeout_ms),
            ("startup_check_attempts", u64::from(self.startup_check_attempts)),
            ("sanity_check_max_missed", u64::from(self.sanity_check_max_missed)),
        ];
        for (key, value) in non_zero {
            if value == 0 {
                return Err(ConfigError::Message(format!(
                    "gateway.{key} must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration as loaded from files or environment.
///
/// Every field is optional; missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub gateway: Option<PartialGatewaySettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialGatewaySettings {
    pub kind: Option<GatewayKind>,
    pub serial_port: Option<String>,
    pub baud_rate: Option<u32>,
    pub ip_address: Option<String>,
    pub tcp_port: Option<u16>,
    pub send_delay_ms: Option<u64>,
    pub skip_startup_check: Option<bool>,
    pub enable_network_sanity_check: Option<bool>,
    pub imperial_units: Option<bool>,
    pub reconnect_interval_ms: Option<u64>,
    pub startup_check_attempts: Option<u32>,
    pub startup_check_timeout_ms: Option<u64>,
    pub sanity_check_interval_ms: Option<u64>,
    pub sanity_check_reply_timeout_ms: Option<u64>,
    pub sanity_check_max_missed: Option<u32>,
    pub id_cache_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            kind: GatewayKind::Serial,
            serial_port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            ip_address: "127.0.0.1".to_string(),
            tcp_port: 5003,
            send_delay_ms: 100,
            skip_startup_check: false,
            enable_network_sanity_check: true,
            imperial_units: false,
            reconnect_interval_ms: 10_000,
            startup_check_attempts: 5,
            startup_check_timeout_ms: 1_000,
            sanity_check_interval_ms: 180_000,
            sanity_check_reply_timeout_ms: 3_000,
            sanity_check_max_missed: 3,
            id_cache_path: PathBuf::from("cache/given_ids.json"),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gateway: GatewaySettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl PartialSettings {
    /// Fill every missing value from the defaults.
    pub fn merge_with_defaults(self) -> Settings {
        let default = Settings::default();
        let g = self.gateway.unwrap_or_default();
        let d = default.gateway;
        let l = self.logging.unwrap_or_default();

        Settings {
            gateway: GatewaySettings {
                kind: g.kind.unwrap_or(d.kind),
                serial_port: g.serial_port.unwrap_or(d.serial_port),
                baud_rate: g.baud_rate.unwrap_or(d.baud_rate),
                ip_address: g.ip_address.unwrap_or(d.ip_address),
                tcp_port: g.tcp_port.unwrap_or(d.tcp_port),
                send_delay_ms: g.send_delay_ms.unwrap_or(d.send_delay_ms),
                skip_startup_check: g.skip_startup_check.unwrap_or(d.skip_startup_check),
                enable_network_sanity_check: g
                    .enable_network_sanity_check
                    .unwrap_or(d.enable_network_sanity_check),
                imperial_units: g.imperial_units.unwrap_or(d.imperial_units),
                reconnect_interval_ms: g.reconnect_interval_ms.unwrap_or(d.reconnect_interval_ms),
                startup_check_attempts: g
                    .startup_check_attempts
                    .unwrap_or(d.startup_check_attempts),
                startup_check_timeout_ms: g
                    .startup_check_timeout_ms
                    .unwrap_or(d.startup_check_timeout_ms),
                sanity_check_interval_ms: g
                    .sanity_check_interval_ms
                    .unwrap_or(d.sanity_check_interval_ms),
                sanity_check_reply_timeout_ms: g
                    .sanity_check_reply_timeout_ms
                    .unwrap_or(d.sanity_check_reply_timeout_ms),
                sanity_check_max_missed: g
                    .sanity_check_max_missed
                    .unwrap_or(d.sanity_check_max_missed),
                id_cache_path: g.id_cache_path.unwrap_or(d.id_cache_path),
            },
            logging: LoggingSettings {
                level: l.level.unwrap_or(default.logging.level),
            },
        }
    }
}
