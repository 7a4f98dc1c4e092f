//! # Blind Controller Configuration
//!
//! Every field has a default, so an empty file (or no file at all) gives the
//! stock settings: a 200 cm blind rolling at 8 cm/s,
//! driven through an H-bridge on a Raspberry Pi.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [blind]
//! height = 180.0
//! speed = 7.5
//!
//! [motor]
//! raise_duty = 100
//! lower_duty = 85
//!
//! [controller]
//! state_file = "/var/lib/blindd/blind-state.txt"
//!
//! [server]
//! bind = "0.0.0.0:5000"
//!
//! [hardware]
//! backend = "simulated"
//! ```
//!
//! ## Example: Rust Usage
//!
//! ```rust
//! use blind_rs::config::Config;
//! let config: Config = toml::from_str("[blind]\nheight = 180.0").unwrap();
//! assert_eq!(config.blind.height, 180.0);
//! assert_eq!(config.blind.speed, 8.0);
//! assert!(config.validate().is_ok());
//! ```

// src/config.rs - Single configuration file
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration struct for the blind, motor, control loop, command server and hardware.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub blind: BlindConfig,
    #[serde(default)]
    pub motor: MotorConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
}

/// Physical properties of the blind.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlindConfig {
    /// Travel distance from fully retracted to fully extended.
    #[serde(default = "default_height")]
    pub height: f64,
    /// Linear speed in length-units per second.
    #[serde(default = "default_speed")]
    pub speed: f64,
}

impl Default for BlindConfig {
    fn default() -> Self {
        Self {
            height: default_height(),
            speed: default_speed(),
        }
    }
}

/// Motor power levels. Raising the blind costs more power than lowering it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MotorConfig {
    #[serde(default = "default_raise_duty")]
    pub raise_duty: u8,
    #[serde(default = "default_lower_duty")]
    pub lower_duty: u8,
    /// Transient duty used to get the motor turning before settling.
    #[serde(default = "default_ramp_duty")]
    pub ramp_duty: u8,
    #[serde(default = "default_ramp_settle_ms")]
    pub ramp_settle_ms: u64,
    #[serde(default = "default_pwm_frequency_hz")]
    pub pwm_frequency_hz: u32,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            raise_duty: default_raise_duty(),
            lower_duty: default_lower_duty(),
            ramp_duty: default_ramp_duty(),
            ramp_settle_ms: default_ramp_settle_ms(),
            pwm_frequency_hz: default_pwm_frequency_hz(),
        }
    }
}

/// Control loop timing and position persistence.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Flush interval while moving. 0 disables periodic flushes.
    #[serde(default = "default_persist_interval_ms")]
    pub persist_interval_ms: u64,
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            persist_interval_ms: default_persist_interval_ms(),
            state_file: default_state_file(),
        }
    }
}

/// Command server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            read_timeout_ms: default_read_timeout_ms(),
            max_connections: default_max_connections(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HardwareBackend {
    Sysfs,
    Simulated,
}

/// Pin assignment (BCM numbering) and sysfs locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HardwareConfig {
    #[serde(default = "default_backend")]
    pub backend: HardwareBackend,
    #[serde(default = "default_gpio_root")]
    pub gpio_root: PathBuf,
    #[serde(default = "default_pwm_chip")]
    pub pwm_chip: PathBuf,
    #[serde(default)]
    pub pwm_channel: u32,
    #[serde(default = "default_input1_pin")]
    pub input1_pin: u32,
    #[serde(default = "default_input2_pin")]
    pub input2_pin: u32,
    #[serde(default = "default_up_led_pin")]
    pub up_led_pin: u32,
    #[serde(default = "default_stop_led_pin")]
    pub stop_led_pin: u32,
    #[serde(default = "default_down_led_pin")]
    pub down_led_pin: u32,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            gpio_root: default_gpio_root(),
            pwm_chip: default_pwm_chip(),
            pwm_channel: 0,
            input1_pin: default_input1_pin(),
            input2_pin: default_input2_pin(),
            up_led_pin: default_up_led_pin(),
            stop_led_pin: default_stop_led_pin(),
            down_led_pin: default_down_led_pin(),
        }
    }
}

impl Config {
    /// Validate value ranges the control loop relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.blind.height.is_finite() && self.blind.height > 0.0) {
            return Err(ConfigError::Invalid("blind.height must be a positive number".to_string()));
        }
        if !(self.blind.speed.is_finite() && self.blind.speed > 0.0) {
            return Err(ConfigError::Invalid("blind.speed must be a positive number".to_string()));
        }
        for (name, duty) in [
            ("raise_duty", self.motor.raise_duty),
            ("lower_duty", self.motor.lower_duty),
            ("ramp_duty", self.motor.ramp_duty),
        ] {
            if duty > 100 {
                return Err(ConfigError::Invalid(format!("motor.{} must be between 0 and 100", name)));
            }
        }
        if self.motor.pwm_frequency_hz == 0 {
            return Err(ConfigError::Invalid("motor.pwm_frequency_hz must be > 0".to_string()));
        }
        if self.controller.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("controller.tick_interval_ms must be > 0".to_string()));
        }
        if self.server.max_connections == 0 {
            return Err(ConfigError::Invalid("server.max_connections must be > 0".to_string()));
        }
        Ok(())
    }
}

// Default value functions
fn default_height() -> f64 { 200.0 }
fn default_speed() -> f64 { 8.0 }
fn default_raise_duty() -> u8 { 100 }
fn default_lower_duty() -> u8 { 90 }
fn default_ramp_duty() -> u8 { 100 }
fn default_ramp_settle_ms() -> u64 { 250 }
fn default_pwm_frequency_hz() -> u32 { 50 }
fn default_tick_interval_ms() -> u64 { 5 }
fn default_persist_interval_ms() -> u64 { 1000 }
fn default_state_file() -> PathBuf { PathBuf::from("blind-state.txt") }
fn default_bind() -> String { "0.0.0.0:5000".to_string() }
fn default_read_timeout_ms() -> u64 { 2000 }
fn default_max_connections() -> usize { 64 }
fn default_shutdown_grace_ms() -> u64 { 1000 }
fn default_backend() -> HardwareBackend { HardwareBackend::Sysfs }
fn default_gpio_root() -> PathBuf { PathBuf::from("/sys/class/gpio") }
fn default_pwm_chip() -> PathBuf { PathBuf::from("/sys/class/pwm/pwmchip0") }
fn default_input1_pin() -> u32 { 26 }
fn default_input2_pin() -> u32 { 4 }
fn default_up_led_pin() -> u32 { 5 }
fn default_stop_led_pin() -> u32 { 6 }
fn default_down_led_pin() -> u32 { 13 }

/// Load and validate configuration from a TOML file at the given path.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path.display(), e);
            return Err(ConfigError::Io(e));
        }
    };
    let config: Config = match toml::from_str(&contents) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to parse config TOML: {}", e);
            return Err(ConfigError::Toml(e));
        }
    };
    config.validate()?;
    Ok(config)
}
