//! End-to-end tests: real TCP control connections and real WebSocket viewers
//! against a fully wired emulator on ephemeral ports.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};

use lgdisplay_core::{InputSource, PowerState};
use lgdisplay_emulator::application::{run_sweep, DisplayRegistry, EventBus, NotificationHub};
use lgdisplay_emulator::domain::DashboardMsg;
use lgdisplay_emulator::infrastructure::{CommandServer, DashboardServer};

type Viewer = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(3);

// ── Harness ───────────────────────────────────────────────────────────────────

struct Emulator {
    control: SocketAddr,
    dashboard: SocketAddr,
    running: Arc<AtomicBool>,
}

impl Drop for Emulator {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

async fn start_emulator(displays: u32, reboot: Duration, ack: bool) -> Emulator {
    let bus = Arc::new(EventBus::new());
    let registry = Arc::new(DisplayRegistry::with_reboot_duration(
        Arc::clone(&bus),
        reboot,
    ));
    let (hub, handle) = NotificationHub::new(registry.clone());
    hub.start(&bus);
    for _ in 0..displays {
        registry.create_display().await;
    }

    let running = Arc::new(AtomicBool::new(true));
    let command = CommandServer::bind("127.0.0.1:0".parse().unwrap(), registry.clone(), ack)
        .await
        .unwrap();
    let dashboard = DashboardServer::bind("127.0.0.1:0".parse().unwrap(), handle, 25)
        .await
        .unwrap();
    let emulator = Emulator {
        control: command.local_addr().unwrap(),
        dashboard: dashboard.local_addr().unwrap(),
        running: Arc::clone(&running),
    };

    tokio::spawn(command.run(Arc::clone(&running)));
    tokio::spawn(dashboard.run(Arc::clone(&running)));
    tokio::spawn(run_sweep(
        registry,
        Duration::from_millis(20),
        Arc::clone(&running),
    ));
    emulator
}

async fn connect_viewer(emulator: &Emulator) -> Viewer {
    let (viewer, _) = connect_async(format!("ws://{}", emulator.dashboard))
        .await
        .unwrap();
    viewer
}

/// Next dashboard message, skipping control frames.
async fn next_msg(viewer: &mut Viewer) -> DashboardMsg {
    loop {
        let frame = timeout(WAIT, viewer.next())
            .await
            .expect("timed out waiting for dashboard message")
            .expect("viewer stream ended")
            .expect("viewer read failed");
        if let WsMessage::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn expect_snapshot(viewer: &mut Viewer) -> Vec<lgdisplay_core::DisplaySnapshot> {
    match next_msg(viewer).await {
        DashboardMsg::Snapshot { displays } => displays,
        other => panic!("expected snapshot, got {other:?}"),
    }
}

async fn expect_update(viewer: &mut Viewer) -> lgdisplay_core::DisplaySnapshot {
    match next_msg(viewer).await {
        DashboardMsg::DisplayUpdated { display } => display,
        other => panic!("expected update, got {other:?}"),
    }
}

async fn read_reply(control: &mut TcpStream) -> String {
    let mut buf = [0u8; 16];
    let n = timeout(WAIT, control.read(&mut buf)).await.unwrap().unwrap();
    String::from_utf8_lossy(&buf[..n]).into_owned()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_power_on_command_reaches_every_viewer() {
    // Arrange
    let emulator = start_emulator(1, Duration::from_secs(30), false).await;
    let mut first = connect_viewer(&emulator).await;
    let mut second = connect_viewer(&emulator).await;
    let snapshot = expect_snapshot(&mut first).await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].power, PowerState::Off);
    expect_snapshot(&mut second).await;

    // Act
    let mut control = TcpStream::connect(emulator.control).await.unwrap();
    control.write_all(b"ka 01 01\r").await.unwrap();

    // Assert
    for viewer in [&mut first, &mut second] {
        let display = expect_update(viewer).await;
        assert_eq!(display.id, 1);
        assert_eq!(display.power, PowerState::On);
    }
}

#[tokio::test]
async fn test_restart_completes_without_further_input() {
    // Arrange
    let reboot = Duration::from_millis(300);
    let emulator = start_emulator(2, reboot, false).await;
    let mut viewer = connect_viewer(&emulator).await;
    expect_snapshot(&mut viewer).await;
    let mut control = TcpStream::connect(emulator.control).await.unwrap();
    control.write_all(b"ka 02 01\r").await.unwrap();
    assert_eq!(expect_update(&mut viewer).await.power, PowerState::On);

    // Act
    control.write_all(b"ka 02 02\r").await.unwrap();
    let restarting = expect_update(&mut viewer).await;
    let restarted_at = Instant::now();

    // Assert
    assert_eq!(restarting.id, 2);
    assert_eq!(restarting.power, PowerState::Restarting);
    let back_on = expect_update(&mut viewer).await;
    assert_eq!(back_on.id, 2);
    assert_eq!(back_on.power, PowerState::On);
    assert!(restarted_at.elapsed() >= reboot - Duration::from_millis(50));
}

#[tokio::test]
async fn test_input_command_updates_viewer() {
    let emulator = start_emulator(1, Duration::from_secs(30), false).await;
    let mut viewer = connect_viewer(&emulator).await;
    expect_snapshot(&mut viewer).await;
    let mut control = TcpStream::connect(emulator.control).await.unwrap();

    // Selecting the current input is ignored; only the change is broadcast.
    control.write_all(b"xb 01 a0\rxb 01 d0\r").await.unwrap();

    let display = expect_update(&mut viewer).await;
    assert_eq!(display.input, InputSource::DisplayPort1);
}

#[tokio::test]
async fn test_ack_mode_replies_ok_and_ng() {
    let emulator = start_emulator(1, Duration::from_secs(30), true).await;
    let mut control = TcpStream::connect(emulator.control).await.unwrap();

    control.write_all(b"ka 01 01\r").await.unwrap();
    assert_eq!(read_reply(&mut control).await, "ka 01 OK\r");

    // Already on.
    control.write_all(b"ka 01 01\r").await.unwrap();
    assert_eq!(read_reply(&mut control).await, "ka 01 NG\r");

    // No such display.
    control.write_all(b"ka 09 00\r").await.unwrap();
    assert_eq!(read_reply(&mut control).await, "ka 09 NG\r");
}

#[tokio::test]
async fn test_malformed_command_closes_only_that_connection() {
    // Arrange
    let emulator = start_emulator(1, Duration::from_secs(30), true).await;
    let mut bad = TcpStream::connect(emulator.control).await.unwrap();
    let mut good = TcpStream::connect(emulator.control).await.unwrap();

    // Act
    bad.write_all(b"this is not a command\r").await.unwrap();

    // Assert: the bad connection sees EOF, the good one keeps working.
    let mut buf = [0u8; 8];
    let n = timeout(WAIT, bad.read(&mut buf)).await.unwrap().unwrap();
    assert_eq!(n, 0);
    good.write_all(b"ka 01 01\r").await.unwrap();
    assert_eq!(read_reply(&mut good).await, "ka 01 OK\r");
}

#[tokio::test]
async fn test_viewer_actions_drive_registry() {
    let emulator = start_emulator(1, Duration::from_secs(30), false).await;
    let mut viewer = connect_viewer(&emulator).await;
    expect_snapshot(&mut viewer).await;

    viewer
        .send(WsMessage::Text(r#"{"action":"AddDisplay"}"#.to_string()))
        .await
        .unwrap();
    match next_msg(&mut viewer).await {
        DashboardMsg::DisplayAdded { display } => {
            assert_eq!(display.id, 2);
            assert_eq!(display.power, PowerState::Off);
        }
        other => panic!("expected DisplayAdded, got {other:?}"),
    }

    viewer
        .send(WsMessage::Text("not json".to_string()))
        .await
        .unwrap();
    viewer
        .send(WsMessage::Text(
            r#"{"action":"SetInput","id":2,"input":"HDMI2"}"#.to_string(),
        ))
        .await
        .unwrap();
    let display = expect_update(&mut viewer).await;
    assert_eq!(display.id, 2);
    assert_eq!(display.input, InputSource::Hdmi2);
}

#[tokio::test]
async fn test_late_viewer_gets_current_state_in_snapshot() {
    let emulator = start_emulator(2, Duration::from_secs(30), true).await;
    let mut control = TcpStream::connect(emulator.control).await.unwrap();
    control.write_all(b"ka 02 01\r").await.unwrap();
    assert_eq!(read_reply(&mut control).await, "ka 02 OK\r");

    let mut viewer = connect_viewer(&emulator).await;
    let displays = expect_snapshot(&mut viewer).await;

    let powers: Vec<_> = displays.iter().map(|d| (d.id, d.power)).collect();
    assert_eq!(powers, vec![(1, PowerState::Off), (2, PowerState::On)]);
}

#[tokio::test]
async fn test_oversized_viewer_frame_ends_session() {
    let emulator = start_emulator(1, Duration::from_secs(30), false).await;
    let mut viewer = connect_viewer(&emulator).await;
    expect_snapshot(&mut viewer).await;

    let huge = format!(r#"{{"action":"{}"}}"#, "x".repeat(1024));
    let _ = viewer.send(WsMessage::Text(huge)).await;

    let closed = timeout(WAIT, async {
        loop {
            match viewer.next().await {
                None | Some(Err(_)) | Some(Ok(WsMessage::Close(_))) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "session should end after an oversized frame");
}

#[tokio::test]
async fn test_shutdown_flag_stops_accepting() {
    let emulator = start_emulator(1, Duration::from_secs(30), false).await;
    let control = emulator.control;

    emulator.running.store(false, Ordering::Relaxed);
    sleep(Duration::from_millis(500)).await;

    assert!(TcpStream::connect(control).await.is_err());
}
