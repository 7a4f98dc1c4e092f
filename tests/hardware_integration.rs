// Integration tests for the sysfs motor and indicator bindings behind the controller

use blind_rs::config::{HardwareBackend, HardwareConfig};
use blind_rs::hardware::{self, HardwareError};
use blind_rs::motion::{Command, MotionController, MotionSettings};
use blind_rs::position_store::FilePositionStore;
use blind_rs::ManualClock;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Lay out a fake sysfs tree with every line already exported.
fn sysfs_tree() -> (TempDir, HardwareConfig) {
    let dir = tempfile::tempdir().unwrap();
    let config = HardwareConfig {
        backend: HardwareBackend::Sysfs,
        gpio_root: dir.path().join("gpio"),
        pwm_chip: dir.path().join("pwmchip0"),
        ..Default::default()
    };
    for pin in [26, 4, 5, 6, 13] {
        fs::create_dir_all(config.gpio_root.join(format!("gpio{}", pin))).unwrap();
    }
    fs::create_dir_all(config.pwm_chip.join("pwm0")).unwrap();
    (dir, config)
}

fn read(path: impl AsRef<Path>) -> String {
    fs::read_to_string(path).unwrap()
}

fn leds(config: &HardwareConfig) -> [String; 3] {
    [5, 6, 13].map(|pin| read(config.gpio_root.join(format!("gpio{}/value", pin))))
}

#[tokio::test]
async fn test_controller_drives_sysfs_lines() {
    let (dir, config) = sysfs_tree();
    let peripherals = hardware::build(&config, 50).unwrap();
    assert_eq!(read(config.pwm_chip.join("pwm0/period")), "20000000");

    let store = FilePositionStore::open(dir.path().join("blind-state.txt")).await.unwrap();
    let clock = Arc::new(ManualClock::new());
    let mut controller = MotionController::new(
        MotionSettings::default(),
        peripherals,
        Box::new(store),
        clock.clone(),
    )
    .await
    .unwrap();
    assert_eq!(leds(&config), ["0", "1", "0"]);

    controller.handle().instruct(Command::MoveFullDown);
    controller.tick().await.unwrap();
    assert_eq!(read(config.gpio_root.join("gpio26/value")), "0");
    assert_eq!(read(config.gpio_root.join("gpio4/value")), "1");
    assert_eq!(read(config.pwm_chip.join("pwm0/duty_cycle")), "20000000");
    assert_eq!(leds(&config), ["0", "0", "1"]);

    clock.advance_secs(0.3);
    controller.tick().await.unwrap();
    assert_eq!(read(config.pwm_chip.join("pwm0/duty_cycle")), "18000000");

    controller.handle().instruct(Command::Stop);
    controller.tick().await.unwrap();
    assert_eq!(read(config.pwm_chip.join("pwm0/duty_cycle")), "0");
    assert_eq!(leds(&config), ["0", "1", "0"]);

    tokio_test::assert_ok!(controller.start().shutdown().await);
    assert_eq!(read(config.pwm_chip.join("pwm0/enable")), "0");
    assert_eq!(read(config.pwm_chip.join("unexport")), "0");
    assert_eq!(leds(&config), ["0", "0", "0"]);
    assert_eq!(read(dir.path().join("blind-state.txt")), "2.4");
}

#[test]
fn test_missing_pwm_chip_is_reported() {
    let (dir, mut config) = sysfs_tree();
    config.pwm_chip = dir.path().join("pwmchip7");
    match hardware::build(&config, 50) {
        Err(HardwareError::Io { path, .. }) => assert!(path.starts_with(&config.pwm_chip)),
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("build should fail without a PWM chip"),
    }
}
