// src/hardware/sysfs.rs - Linux sysfs GPIO and PWM access
use super::HardwareError;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Freshly exported attributes can take a moment to become writable while
/// udev fixes up permissions.
const EXPORT_RETRIES: u32 = 10;
const EXPORT_RETRY_DELAY: Duration = Duration::from_millis(10);

fn write_attr(path: &Path, value: &str) -> Result<(), HardwareError> {
    std::fs::write(path, value).map_err(|source| HardwareError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_attr_after_export(path: &Path, value: &str) -> Result<(), HardwareError> {
    let mut attempt = 0;
    loop {
        match write_attr(path, value) {
            Ok(()) => return Ok(()),
            Err(e) if attempt + 1 >= EXPORT_RETRIES => return Err(e),
            Err(_) => {
                attempt += 1;
                std::thread::sleep(EXPORT_RETRY_DELAY);
            }
        }
    }
}

/// A single GPIO line configured as output.
#[derive(Debug)]
pub struct SysfsGpio {
    root: PathBuf,
    dir: PathBuf,
    pin: u32,
}

impl SysfsGpio {
    pub fn export_output(root: &Path, pin: u32) -> Result<Self, HardwareError> {
        let dir = root.join(format!("gpio{}", pin));
        if !dir.exists() {
            tracing::debug!("Exporting GPIO {}", pin);
            write_attr(&root.join("export"), &pin.to_string())?;
        }
        write_attr_after_export(&dir.join("direction"), "out")?;
        Ok(Self {
            root: root.to_path_buf(),
            dir,
            pin,
        })
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    pub fn set(&mut self, high: bool) -> Result<(), HardwareError> {
        write_attr(&self.dir.join("value"), if high { "1" } else { "0" })
    }

    pub fn unexport(&mut self) -> Result<(), HardwareError> {
        tracing::debug!("Unexporting GPIO {}", self.pin);
        write_attr(&self.root.join("unexport"), &self.pin.to_string())
    }
}

/// One channel of a hardware PWM chip.
#[derive(Debug)]
pub struct SysfsPwm {
    chip: PathBuf,
    dir: PathBuf,
    channel: u32,
    period_ns: u64,
}

impl SysfsPwm {
    pub fn export(chip: &Path, channel: u32, frequency_hz: u32) -> Result<Self, HardwareError> {
        let dir = chip.join(format!("pwm{}", channel));
        if !dir.exists() {
            tracing::debug!("Exporting PWM channel {} on {}", channel, chip.display());
            write_attr(&chip.join("export"), &channel.to_string())?;
        }
        let period_ns = 1_000_000_000 / u64::from(frequency_hz.max(1));
        write_attr_after_export(&dir.join("duty_cycle"), "0")?;
        write_attr(&dir.join("period"), &period_ns.to_string())?;
        write_attr(&dir.join("enable"), "1")?;
        Ok(Self {
            chip: chip.to_path_buf(),
            dir,
            channel,
            period_ns,
        })
    }

    pub fn period_ns(&self) -> u64 {
        self.period_ns
    }

    pub fn set_duty_percent(&mut self, percent: u8) -> Result<(), HardwareError> {
        let duty_ns = self.period_ns * u64::from(percent.min(100)) / 100;
        write_attr(&self.dir.join("duty_cycle"), &duty_ns.to_string())
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Result<(), HardwareError> {
        write_attr(&self.dir.join("enable"), if enabled { "1" } else { "0" })
    }

    pub fn unexport(&mut self) -> Result<(), HardwareError> {
        self.set_enabled(false)?;
        write_attr(&self.chip.join("unexport"), &self.channel.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_gpio_skips_export_when_already_present() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("gpio26")).unwrap();
        let mut gpio = SysfsGpio::export_output(root.path(), 26).unwrap();
        assert!(!root.path().join("export").exists());
        assert_eq!(fs::read_to_string(root.path().join("gpio26/direction")).unwrap(), "out");

        gpio.set(true).unwrap();
        assert_eq!(fs::read_to_string(root.path().join("gpio26/value")).unwrap(), "1");
        gpio.set(false).unwrap();
        assert_eq!(fs::read_to_string(root.path().join("gpio26/value")).unwrap(), "0");

        gpio.unexport().unwrap();
        assert_eq!(fs::read_to_string(root.path().join("unexport")).unwrap(), "26");
    }

    #[test]
    fn test_gpio_export_fails_without_kernel_directory() {
        let root = tempfile::tempdir().unwrap();
        let result = SysfsGpio::export_output(root.path(), 4);
        // export is written, but the kernel never creates gpio4/
        assert_eq!(fs::read_to_string(root.path().join("export")).unwrap(), "4");
        assert!(matches!(result, Err(HardwareError::Io { .. })));
    }

    #[test]
    fn test_pwm_duty_is_fraction_of_period() {
        let chip = tempfile::tempdir().unwrap();
        fs::create_dir(chip.path().join("pwm0")).unwrap();
        let mut pwm = SysfsPwm::export(chip.path(), 0, 50).unwrap();
        assert_eq!(pwm.period_ns(), 20_000_000);
        assert_eq!(fs::read_to_string(chip.path().join("pwm0/period")).unwrap(), "20000000");
        assert_eq!(fs::read_to_string(chip.path().join("pwm0/enable")).unwrap(), "1");

        pwm.set_duty_percent(90).unwrap();
        assert_eq!(fs::read_to_string(chip.path().join("pwm0/duty_cycle")).unwrap(), "18000000");
        pwm.set_duty_percent(250).unwrap();
        assert_eq!(fs::read_to_string(chip.path().join("pwm0/duty_cycle")).unwrap(), "20000000");

        pwm.unexport().unwrap();
        assert_eq!(fs::read_to_string(chip.path().join("pwm0/enable")).unwrap(), "0");
        assert_eq!(fs::read_to_string(chip.path().join("unexport")).unwrap(), "0");
    }
}
