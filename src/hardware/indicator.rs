// src/hardware/indicator.rs - Green/red/yellow status lights
use super::sysfs::SysfsGpio;
use super::{HardwareError, IndicatorState, StatusIndicator};
use crate::config::HardwareConfig;
use std::sync::{Arc, Mutex};

/// One LED per state, exactly one lit at a time.
#[derive(Debug)]
pub struct SysfsIndicator {
    up: SysfsGpio,
    stopped: SysfsGpio,
    down: SysfsGpio,
}

impl SysfsIndicator {
    pub fn open(config: &HardwareConfig) -> Result<Self, HardwareError> {
        Ok(Self {
            up: SysfsGpio::export_output(&config.gpio_root, config.up_led_pin)?,
            stopped: SysfsGpio::export_output(&config.gpio_root, config.stop_led_pin)?,
            down: SysfsGpio::export_output(&config.gpio_root, config.down_led_pin)?,
        })
    }
}

impl StatusIndicator for SysfsIndicator {
    fn show(&mut self, state: IndicatorState) -> Result<(), HardwareError> {
        self.up.set(state == IndicatorState::Up)?;
        self.stopped.set(state == IndicatorState::Stopped)?;
        self.down.set(state == IndicatorState::Down)
    }

    fn clear(&mut self) -> Result<(), HardwareError> {
        self.up.set(false)?;
        self.stopped.set(false)?;
        self.down.set(false)
    }

    fn release(&mut self) -> Result<(), HardwareError> {
        let results = [
            self.clear(),
            self.up.unexport(),
            self.stopped.unexport(),
            self.down.unexport(),
        ];
        results.into_iter().collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorLog {
    pub current: Option<IndicatorState>,
    pub history: Vec<IndicatorState>,
    pub clears: usize,
    pub releases: usize,
}

/// In-memory indicator; clones share one log.
#[derive(Debug, Clone, Default)]
pub struct SimulatedIndicator {
    log: Arc<Mutex<IndicatorLog>>,
}

impl SimulatedIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> IndicatorLog {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn current(&self) -> Option<IndicatorState> {
        self.snapshot().current
    }
}

impl StatusIndicator for SimulatedIndicator {
    fn show(&mut self, state: IndicatorState) -> Result<(), HardwareError> {
        tracing::debug!("sim indicator: {:?}", state);
        let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        log.current = Some(state);
        log.history.push(state);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), HardwareError> {
        let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        log.current = None;
        log.clears += 1;
        Ok(())
    }

    fn release(&mut self) -> Result<(), HardwareError> {
        let mut log = self.log.lock().unwrap_or_else(|e| e.into_inner());
        log.current = None;
        log.releases += 1;
        Ok(())
    }
}
