// src/hardware/mod.rs
//! Capability interfaces for the blind's actuator and status lights, plus the
//! bindings that implement them.
//!
//! The controller owns exactly one [`MotorDriver`] and one [`StatusIndicator`],
//! constructed once at startup and moved into it. There is no ambient board
//! state: each binding holds its own pins.
pub mod indicator;
pub mod motor;
pub mod sysfs;

pub use indicator::{IndicatorLog, SimulatedIndicator, SysfsIndicator};
pub use motor::{MotorLog, SimulatedMotor, SysfsMotor};

use crate::config::{HardwareBackend, HardwareConfig};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("sysfs access to '{path}' failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Hardware fault: {0}")]
    Fault(String),
}

/// H-bridge driven DC motor.
pub trait MotorDriver: Send {
    /// Select rotation direction. `true` rolls the blind up.
    fn set_direction(&mut self, upward: bool) -> Result<(), HardwareError>;
    /// Set power as a duty cycle percentage (0-100).
    fn set_power(&mut self, level: u8) -> Result<(), HardwareError>;
    /// Cut power.
    fn stop(&mut self) -> Result<(), HardwareError>;
    /// Give the underlying pins back to the system.
    fn release(&mut self) -> Result<(), HardwareError>;
}

/// What the status lights show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorState {
    Up,
    Stopped,
    Down,
}

/// Three-state visual indicator.
pub trait StatusIndicator: Send {
    fn show(&mut self, state: IndicatorState) -> Result<(), HardwareError>;
    /// Turn every light off.
    fn clear(&mut self) -> Result<(), HardwareError>;
    fn release(&mut self) -> Result<(), HardwareError>;
}

/// The hardware handed to the motion controller.
pub struct Peripherals {
    pub motor: Box<dyn MotorDriver>,
    pub indicator: Box<dyn StatusIndicator>,
}

impl Peripherals {
    pub fn new(motor: impl MotorDriver + 'static, indicator: impl StatusIndicator + 'static) -> Self {
        Self {
            motor: Box::new(motor),
            indicator: Box::new(indicator),
        }
    }
}

/// Construct the configured motor and indicator bindings.
pub fn build(config: &HardwareConfig, pwm_frequency_hz: u32) -> Result<Peripherals, HardwareError> {
    match config.backend {
        HardwareBackend::Sysfs => {
            tracing::info!(
                "Opening sysfs hardware: PWM {}/pwm{}, H-bridge pins {}/{}",
                config.pwm_chip.display(),
                config.pwm_channel,
                config.input1_pin,
                config.input2_pin
            );
            let motor = SysfsMotor::open(config, pwm_frequency_hz)?;
            let indicator = SysfsIndicator::open(config)?;
            Ok(Peripherals::new(motor, indicator))
        }
        HardwareBackend::Simulated => {
            tracing::info!("Using simulated motor and indicator");
            Ok(Peripherals::new(SimulatedMotor::new(), SimulatedIndicator::new()))
        }
    }
}

/// [`build`] on the blocking pool. Sysfs export waits for udev with
/// blocking sleeps, which must not stall a runtime worker.
pub async fn open(config: HardwareConfig, pwm_frequency_hz: u32) -> Result<Peripherals, HardwareError> {
    tokio::task::spawn_blocking(move || build(&config, pwm_frequency_hz))
        .await
        .map_err(|e| HardwareError::Fault(format!("hardware setup task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_simulated_backend() {
        let config = HardwareConfig {
            backend: HardwareBackend::Simulated,
            ..Default::default()
        };
        let mut peripherals = build(&config, 50).unwrap();
        assert!(peripherals.motor.set_direction(true).is_ok());
        assert!(peripherals.motor.set_power(100).is_ok());
        assert!(peripherals.indicator.show(IndicatorState::Up).is_ok());
    }

    #[test]
    fn test_build_sysfs_backend_missing_tree_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = HardwareConfig {
            backend: HardwareBackend::Sysfs,
            gpio_root: dir.path().join("no-such-gpio"),
            pwm_chip: dir.path().join("no-such-pwmchip"),
            ..Default::default()
        };
        assert!(matches!(build(&config, 50), Err(HardwareError::Io { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_open_builds_off_the_runtime_workers() {
        let simulated = HardwareConfig {
            backend: HardwareBackend::Simulated,
            ..Default::default()
        };
        let mut peripherals = open(simulated, 50).await.unwrap();
        assert!(peripherals.motor.stop().is_ok());

        let dir = tempfile::tempdir().unwrap();
        let missing = HardwareConfig {
            backend: HardwareBackend::Sysfs,
            gpio_root: dir.path().join("no-such-gpio"),
            pwm_chip: dir.path().join("no-such-pwmchip"),
            ..Default::default()
        };
        assert!(matches!(open(missing, 50).await, Err(HardwareError::Io { .. })));
    }
}
