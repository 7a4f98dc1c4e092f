// Integration tests for the blind position file

#[cfg(test)]
mod tests {
    use blind_rs::hardware::{Peripherals, SimulatedIndicator, SimulatedMotor};
    use blind_rs::motion::{Command, MotionController, MotionSettings};
    use blind_rs::position_store::{FilePositionStore, PositionStore};
    use blind_rs::ManualClock;
    use std::sync::Arc;
    use tempfile::tempdir;

    async fn controller_on(path: &std::path::Path, clock: Arc<ManualClock>) -> MotionController {
        let store = FilePositionStore::open(path).await.unwrap();
        MotionController::new(
            MotionSettings::default(),
            Peripherals::new(SimulatedMotor::new(), SimulatedIndicator::new()),
            Box::new(store),
            clock,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_position_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blind-state.txt");
        {
            let mut store = FilePositionStore::open(&path).await.unwrap();
            store.save(137.25).await.unwrap();
        }
        let mut store = FilePositionStore::open(&path).await.unwrap();
        assert_eq!(store.load().await.unwrap(), 137.25);
    }

    #[tokio::test]
    async fn test_corrupted_file_reads_as_zero() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blind-state.txt");
        std::fs::write(&path, "twelve and a half").unwrap();

        let mut store = FilePositionStore::open(&path).await.unwrap();
        assert_eq!(store.load().await.unwrap(), 0.0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0");
    }

    #[tokio::test]
    async fn test_controller_restart_restores_position() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blind-state.txt");
        std::fs::write(&path, "20\n").unwrap();

        let clock = Arc::new(ManualClock::new());
        let mut controller = controller_on(&path, clock.clone()).await;
        assert_eq!(controller.extension_length(), 20.0);

        controller.handle().instruct(Command::MoveFullDown);
        controller.tick().await.unwrap();
        clock.advance_secs(2.5);
        controller.tick().await.unwrap();
        controller.handle().instruct(Command::Stop);
        controller.tick().await.unwrap();
        assert_eq!(controller.extension_length(), 40.0);
        drop(controller);

        let restarted = controller_on(&path, clock).await;
        assert_eq!(restarted.extension_length(), 40.0);
    }
}
