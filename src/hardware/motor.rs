// src/hardware/motor.rs - H-bridge motor bindings
use super::sysfs::{SysfsGpio, SysfsPwm};
use super::{HardwareError, MotorDriver};
use crate::config::HardwareConfig;
use std::sync::{Arc, Mutex};

/// DC motor behind an H-bridge: two direction inputs and one PWM enable line.
#[derive(Debug)]
pub struct SysfsMotor {
    input1: SysfsGpio,
    input2: SysfsGpio,
    pwm: SysfsPwm,
}

impl SysfsMotor {
    pub fn open(config: &HardwareConfig, pwm_frequency_hz: u32) -> Result<Self, HardwareError> {
        let pwm = SysfsPwm::export(&config.pwm_chip, config.pwm_channel, pwm_frequency_hz)?;
        let mut input1 = SysfsGpio::export_output(&config.gpio_root, config.input1_pin)?;
        let mut input2 = SysfsGpio::export_output(&config.gpio_root, config.input2_pin)?;
        input1.set(false)?;
        input2.set(false)?;
        Ok(Self { input1, input2, pwm })
    }
}

impl MotorDriver for SysfsMotor {
    fn set_direction(&mut self, upward: bool) -> Result<(), HardwareError> {
        tracing::debug!(
            "H-bridge pins {}={} {}={}",
            self.input1.pin(),
            upward,
            self.input2.pin(),
            !upward
        );
        // never drive the bridge while its inputs are switching
        self.pwm.set_enabled(false)?;
        self.input1.set(upward)?;
        self.input2.set(!upward)?;
        self.pwm.set_enabled(true)
    }

    fn set_power(&mut self, level: u8) -> Result<(), HardwareError> {
        self.pwm.set_duty_percent(level.min(100))
    }

    fn stop(&mut self) -> Result<(), HardwareError> {
        self.pwm.set_duty_percent(0)
    }

    fn release(&mut self) -> Result<(), HardwareError> {
        // Attempt every step, report the first failure.
        let results = [
            self.pwm.set_duty_percent(0),
            self.pwm.unexport(),
            self.input1.set(false),
            self.input2.set(false),
            self.input1.unexport(),
            self.input2.unexport(),
        ];
        results.into_iter().collect()
    }
}

/// Everything a [`SimulatedMotor`] has been told to do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotorLog {
    /// Current direction, `None` until one has been set.
    pub upward: Option<bool>,
    /// Current duty cycle.
    pub power: u8,
    pub directions: Vec<bool>,
    pub powers: Vec<u8>,
    pub stops: usize,
    pub releases: usize,
}

/// In-memory motor. Clones share the same log, so a test can keep one clone
/// while the controller owns another.
#[derive(Debug, Clone, Default)]
pub struct SimulatedMotor {
    log: Arc<Mutex<MotorLog>>,
}

impl SimulatedMotor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MotorLog {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_running(&self) -> bool {
        self.snapshot().power > 0
    }

    fn with_log<R>(&self, f: impl FnOnce(&mut MotorLog) -> R) -> R {
        let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut log)
    }
}

impl MotorDriver for SimulatedMotor {
    fn set_direction(&mut self, upward: bool) -> Result<(), HardwareError> {
        tracing::debug!("sim motor: direction {}", if upward { "up" } else { "down" });
        self.with_log(|log| {
            log.upward = Some(upward);
            log.directions.push(upward);
        });
        Ok(())
    }

    fn set_power(&mut self, level: u8) -> Result<(), HardwareError> {
        let level = level.min(100);
        tracing::debug!("sim motor: power {}%", level);
        self.with_log(|log| {
            log.power = level;
            log.powers.push(level);
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<(), HardwareError> {
        tracing::debug!("sim motor: stop");
        self.with_log(|log| {
            log.power = 0;
            log.stops += 1;
        });
        Ok(())
    }

    fn release(&mut self) -> Result<(), HardwareError> {
        self.with_log(|log| {
            log.power = 0;
            log.releases += 1;
        });
        Ok(())
    }
}
