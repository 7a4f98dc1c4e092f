// Integration tests for the command server over real TCP connections

#[cfg(test)]
mod tests {
    use blind_rs::client::send_instruction;
    use blind_rs::config::ServerConfig;
    use blind_rs::hardware::{IndicatorState, Peripherals, SimulatedIndicator, SimulatedMotor};
    use blind_rs::motion::{ControllerTask, MotionController, MotionSettings};
    use blind_rs::position_store::FilePositionStore;
    use blind_rs::server::{CommandServer, ServerError};
    use blind_rs::StdClock;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::broadcast;
    use tokio::task::JoinHandle;

    const TIMEOUT: Duration = Duration::from_secs(5);

    struct Harness {
        addr: SocketAddr,
        motor: SimulatedMotor,
        indicator: SimulatedIndicator,
        task: ControllerTask,
        shutdown: broadcast::Sender<()>,
        server: JoinHandle<Result<(), ServerError>>,
        _dir: TempDir,
    }

    async fn start(initial_length: &str) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let state_file = dir.path().join("blind-state.txt");
        std::fs::write(&state_file, initial_length).unwrap();

        let motor = SimulatedMotor::new();
        let indicator = SimulatedIndicator::new();
        let store = FilePositionStore::open(&state_file).await.unwrap();
        let controller = MotionController::new(
            MotionSettings::default(),
            Peripherals::new(motor.clone(), indicator.clone()),
            Box::new(store),
            Arc::new(StdClock),
        )
        .await
        .unwrap();
        let task = controller.start();

        let config = ServerConfig {
            bind: "127.0.0.1:0".to_string(),
            ..Default::default()
        };
        let server = CommandServer::bind(&config, task.handle()).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (shutdown, rx) = broadcast::channel(1);
        let server = tokio::spawn(server.run(rx));

        Harness {
            addr,
            motor,
            indicator,
            task,
            shutdown,
            server,
            _dir: dir,
        }
    }

    async fn send(addr: SocketAddr, payload: &str) -> String {
        send_instruction(addr, payload, TIMEOUT).await.unwrap()
    }

    async fn stop(harness: Harness) {
        let _ = harness.shutdown.send(());
        tokio_test::assert_ok!(harness.server.await.unwrap());
        tokio_test::assert_ok!(harness.task.shutdown().await);
    }

    #[tokio::test]
    async fn test_status_is_bare_instruction_value() {
        let harness = start("100").await;
        assert_eq!(send(harness.addr, "status").await, "stop");
        assert_eq!(send(harness.addr, "down").await, "HTTP/1.1 \"204 No Content\"");
        assert_eq!(send(harness.addr, "status").await, "down");
        stop(harness).await;
    }

    #[tokio::test]
    async fn test_repeated_instruction_is_not_modified_and_not_actuated() {
        let harness = start("100").await;
        assert_eq!(send(harness.addr, "down").await, "HTTP/1.1 \"204 No Content\"");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(harness.motor.snapshot().directions, vec![false]);
        assert_eq!(harness.indicator.current(), Some(IndicatorState::Down));

        assert_eq!(send(harness.addr, "down").await, "HTTP/1.1 \"304 Not Modified\"");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(harness.motor.snapshot().directions, vec![false]);
        stop(harness).await;
    }

    #[tokio::test]
    async fn test_malformed_requests_are_rejected() {
        let harness = start("100").await;
        assert_eq!(send(harness.addr, "up").await, "HTTP/1.1 \"204 No Content\"");

        for payload in ["bogus\n", "bogus", "", "up\n", "UP"] {
            assert_eq!(
                send(harness.addr, payload).await,
                "HTTP/1.1 \"400 Bad Request\"",
                "payload {:?}",
                payload
            );
        }
        assert_eq!(send(harness.addr, "status").await, "up");
        stop(harness).await;
    }

    #[tokio::test]
    async fn test_only_final_line_counts() {
        let harness = start("100").await;
        assert_eq!(send(harness.addr, "down\nup\n42").await, "HTTP/1.1 \"204 No Content\"");
        assert_eq!(send(harness.addr, "status").await, "42");
        assert_eq!(send(harness.addr, "noise\r\n42.0").await, "HTTP/1.1 \"304 Not Modified\"");
        stop(harness).await;
    }

    #[tokio::test]
    async fn test_idle_connection_times_out_with_bad_request() {
        let harness = start("0").await;
        let mut stream = tokio::net::TcpStream::connect(harness.addr).await.unwrap();
        let mut reply = String::new();
        // never send anything; the server gives up after its read timeout
        tokio::time::timeout(TIMEOUT, tokio::io::AsyncReadExt::read_to_string(&mut stream, &mut reply))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply, "HTTP/1.1 \"400 Bad Request\"");
        stop(harness).await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_accepting() {
        let harness = start("0").await;
        let addr = harness.addr;
        stop(harness).await;
        tokio_test::assert_err!(send_instruction(addr, "status", Duration::from_millis(500)).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_status_is_never_torn_under_concurrent_instructions() {
        const SENT: [&str; 6] = ["up", "down", "stop", "20", "150", "42.5"];
        let harness = start("100").await;
        let addr = harness.addr;

        let mut clients = tokio::task::JoinSet::new();
        for client in 0..8 {
            clients.spawn(async move {
                let mut seen = Vec::new();
                for round in 0..25 {
                    let reply = send(addr, SENT[(client + round) % SENT.len()]).await;
                    assert!(
                        reply == "HTTP/1.1 \"204 No Content\"" || reply == "HTTP/1.1 \"304 Not Modified\"",
                        "unexpected reply {:?}",
                        reply
                    );
                    seen.push(send(addr, "status").await);
                }
                seen
            });
        }

        while let Some(seen) = clients.join_next().await {
            for status in seen.unwrap() {
                assert!(SENT.contains(&status.as_str()), "torn status {:?}", status);
            }
        }
        stop(harness).await;
    }
}
