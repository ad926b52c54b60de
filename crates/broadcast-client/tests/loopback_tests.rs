//! Runner tests against a fake simulation listening on loopback UDP.

use std::net::SocketAddr;
use std::time::Duration;

use acc_broadcast_client::{
    BroadcastRunner, ClientConfig, ClientError, ClientEvent, UdpTransport, spawn,
};
use acc_broadcast_protocol::{ConnectionIdentity, FrameWriter, HandshakeState, Notification};
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

type TestResult = Result<(), Box<dyn std::error::Error>>;

const STEP: Duration = Duration::from_secs(5);

const REGISTRATION_OK: [u8; 5] = [0x01, 42, 0, 0, 0];
const ENTRY_LIST_REQUEST: [u8; 5] = [0x0A, 42, 0, 0, 0];
const UNREGISTER: [u8; 5] = [0x09, 42, 0, 0, 0];

struct FakeSimulation {
    socket: UdpSocket,
}

impl FakeSimulation {
    async fn bind() -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        Ok(Self { socket })
    }

    fn addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        Ok(self.socket.local_addr()?)
    }

    async fn recv_frame(&self) -> Result<(Vec<u8>, SocketAddr), Box<dyn std::error::Error>> {
        let mut buf = vec![0u8; 2048];
        let (len, from) = timeout(STEP, self.socket.recv_from(&mut buf)).await??;
        buf.truncate(len);
        Ok((buf, from))
    }

    async fn send(&self, frame: &[u8], to: SocketAddr) -> TestResult {
        self.socket.send_to(frame, to).await?;
        Ok(())
    }
}

fn loopback_config(server: SocketAddr) -> ClientConfig {
    ClientConfig {
        server_address: server,
        display_name: "Loopback".to_string(),
        registration_timeout_ms: 100,
        max_registration_attempts: 3,
        ..ClientConfig::default()
    }
}

fn expected_registration() -> Vec<u8> {
    let mut frame = vec![0x01, 0x04, 0x08, 0x00];
    frame.extend_from_slice(b"Loopback");
    frame.extend_from_slice(&[0x00, 0x00, 0xE8, 0x03, 0x00, 0x00, 0x00, 0x00]);
    frame
}

fn entry_list_car_frame(car_index: u16, team: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut writer = FrameWriter::new();
    writer.write_u8(0x06)?;
    writer.write_u16_le(car_index)?;
    writer.write_u8(12)?;
    writer.write_string(team)?;
    writer.write_i32_le(88)?;
    writer.write_u8(1)?;
    writer.write_u8(0)?;
    writer.write_u16_le(3)?;
    writer.write_u8(1)?;
    writer.write_string("Max")?;
    writer.write_string("Power")?;
    writer.write_string("MPO")?;
    writer.write_u8(2)?;
    writer.write_u16_le(5)?;
    Ok(writer.into_frame())
}

async fn next_event(
    rx: &mut mpsc::Receiver<ClientEvent>,
) -> Result<ClientEvent, Box<dyn std::error::Error>> {
    timeout(STEP, rx.recv())
        .await?
        .ok_or_else(|| "event channel closed".into())
}

#[tokio::test]
async fn full_handshake_then_unregister_on_shutdown() -> TestResult {
    let sim = FakeSimulation::bind().await?;
    let config = loopback_config(sim.addr()?);
    let transport = UdpTransport::connect(config.server_address).await?;
    assert_eq!(transport.peer(), sim.addr()?);
    let runner = BroadcastRunner::new(transport, &config);

    let (tx, mut rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = tokio::spawn(runner.run(tx, shutdown_rx));

    let (register, client) = sim.recv_frame().await?;
    assert_eq!(register, expected_registration());

    sim.send(&REGISTRATION_OK, client).await?;
    let (request, _) = sim.recv_frame().await?;
    assert_eq!(request, ENTRY_LIST_REQUEST);
    assert_eq!(
        next_event(&mut rx).await?,
        ClientEvent::Notification(Notification::Registered {
            connection_id: ConnectionIdentity::new(42),
            readonly: false,
        })
    );

    sim.send(&[0x04, 42, 0, 0, 0, 2, 0, 7, 0, 3, 0], client).await?;
    assert_eq!(
        next_event(&mut rx).await?,
        ClientEvent::Notification(Notification::EntryListReplaced {
            generation: 1,
            car_count: 2,
        })
    );

    sim.send(&entry_list_car_frame(7, "Emil Frey Racing")?, client)
        .await?;
    assert_eq!(
        next_event(&mut rx).await?,
        ClientEvent::Notification(Notification::CarUpdated { car_index: 7 })
    );

    // Car 99 is not part of the entry list.
    sim.send(&entry_list_car_frame(99, "Ghost")?, client).await?;
    assert!(matches!(
        next_event(&mut rx).await?,
        ClientEvent::FrameDropped { .. }
    ));

    sim.send(&[0x02, 1, 2, 3], client).await?;
    assert!(matches!(
        next_event(&mut rx).await?,
        ClientEvent::Notification(Notification::Unhandled { .. })
    ));

    shutdown_tx.send(())?;
    let session = timeout(STEP, task).await???;
    assert_eq!(session.handshake(), HandshakeState::EntryListPopulated);
    let car = session.entry_list().get(7).ok_or("car 7 missing")?;
    assert!(car.is_populated());
    assert_eq!(car.team_name, "Emil Frey Racing");
    assert!(session.entry_list().get(3).is_some_and(|c| !c.is_populated()));

    let (unregister, _) = sim.recv_frame().await?;
    assert_eq!(unregister, UNREGISTER);
    Ok(())
}

#[tokio::test]
async fn registration_is_resent_until_attempts_run_out() -> TestResult {
    let sim = FakeSimulation::bind().await?;
    let config = loopback_config(sim.addr()?);
    let transport = UdpTransport::connect(config.server_address).await?;
    let runner = BroadcastRunner::new(transport, &config);

    let (tx, _rx) = mpsc::channel(16);
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = tokio::spawn(runner.run(tx, shutdown_rx));

    for _ in 0..3 {
        let (register, _) = sim.recv_frame().await?;
        assert_eq!(register, expected_registration());
    }

    let err = match timeout(STEP, task).await?? {
        Ok(_) => return Err("runner should give up".into()),
        Err(e) => e,
    };
    assert!(matches!(
        err.downcast_ref::<ClientError>(),
        Some(ClientError::RegistrationTimedOut { attempts: 3 })
    ));
    Ok(())
}

#[tokio::test]
async fn late_registration_result_is_accepted_after_resend() -> TestResult {
    let sim = FakeSimulation::bind().await?;
    let config = loopback_config(sim.addr()?);
    let transport = UdpTransport::connect(config.server_address).await?;
    let runner = BroadcastRunner::new(transport, &config);

    let (tx, mut rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = tokio::spawn(runner.run(tx, shutdown_rx));

    sim.recv_frame().await?;
    let (_, client) = sim.recv_frame().await?;
    sim.send(&REGISTRATION_OK, client).await?;

    assert!(matches!(
        next_event(&mut rx).await?,
        ClientEvent::Notification(Notification::Registered { .. })
    ));
    let (request, _) = sim.recv_frame().await?;
    assert_eq!(request, ENTRY_LIST_REQUEST);

    shutdown_tx.send(())?;
    let session = timeout(STEP, task).await???;
    assert_eq!(session.connection_id(), Some(ConnectionIdentity::new(42)));
    Ok(())
}

#[tokio::test]
async fn rejected_registration_stops_the_runner() -> TestResult {
    let sim = FakeSimulation::bind().await?;
    let config = loopback_config(sim.addr()?);
    let transport = UdpTransport::connect(config.server_address).await?;
    let runner = BroadcastRunner::new(transport, &config);

    let (tx, mut rx) = mpsc::channel(16);
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = tokio::spawn(runner.run(tx, shutdown_rx));

    let (_, client) = sim.recv_frame().await?;
    let mut writer = FrameWriter::new();
    writer.write_u8(0x01)?;
    writer.write_i32_le(-1)?;
    writer.write_u8(0)?;
    writer.write_u8(0)?;
    writer.write_string("Wrong password")?;
    sim.send(writer.finalize(), client).await?;

    assert_eq!(
        next_event(&mut rx).await?,
        ClientEvent::Notification(Notification::RegistrationRejected {
            message: "Wrong password".to_string(),
        })
    );

    let err = match timeout(STEP, task).await?? {
        Ok(_) => return Err("runner should stop on rejection".into()),
        Err(e) => e,
    };
    assert_eq!(
        err.downcast_ref::<ClientError>().map(ClientError::exit_code),
        Some(5)
    );
    Ok(())
}

#[tokio::test]
async fn dropped_receiver_stops_the_runner() -> TestResult {
    let sim = FakeSimulation::bind().await?;
    let config = loopback_config(sim.addr()?);
    let transport = UdpTransport::connect(config.server_address).await?;
    let runner = BroadcastRunner::new(transport, &config);

    let (tx, rx) = mpsc::channel(16);
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = tokio::spawn(runner.run(tx, shutdown_rx));
    drop(rx);

    let (_, client) = sim.recv_frame().await?;
    sim.send(&REGISTRATION_OK, client).await?;

    let session = timeout(STEP, task).await???;
    assert_eq!(session.handshake(), HandshakeState::EntryListRequested);

    let (request, _) = sim.recv_frame().await?;
    assert_eq!(request, ENTRY_LIST_REQUEST);
    let (unregister, _) = sim.recv_frame().await?;
    assert_eq!(unregister, UNREGISTER);
    Ok(())
}

#[tokio::test]
async fn spawned_handle_delivers_events_and_shuts_down() -> TestResult {
    let sim = FakeSimulation::bind().await?;
    let config = ClientConfig {
        request_track_data: true,
        ..loopback_config(sim.addr()?)
    };
    let mut handle = spawn(config).await?;

    let (_, client) = sim.recv_frame().await?;
    sim.send(&REGISTRATION_OK, client).await?;

    let (request, _) = sim.recv_frame().await?;
    assert_eq!(request, ENTRY_LIST_REQUEST);
    let (track_request, _) = sim.recv_frame().await?;
    assert_eq!(track_request, vec![0x0B, 42, 0, 0, 0]);

    let event = timeout(STEP, handle.recv()).await?;
    assert!(matches!(
        event,
        Some(ClientEvent::Notification(Notification::Registered { .. }))
    ));

    let session = timeout(STEP, handle.shutdown()).await??;
    assert_eq!(session.connection_id(), Some(ConnectionIdentity::new(42)));

    let (unregister, _) = sim.recv_frame().await?;
    assert_eq!(unregister, UNREGISTER);
    Ok(())
}

#[tokio::test]
async fn spawn_rejects_invalid_config() -> TestResult {
    let config = ClientConfig {
        update_interval_ms: -5,
        ..ClientConfig::default()
    };
    let err = match spawn(config).await {
        Ok(_) => return Err("spawn should validate the config".into()),
        Err(e) => e,
    };
    assert!(matches!(
        err.downcast_ref::<ClientError>(),
        Some(ClientError::InvalidConfiguration(_))
    ));
    Ok(())
}

#[test]
fn events_serialize_as_tagged_json() -> TestResult {
    let event = ClientEvent::Notification(Notification::CarUpdated { car_index: 7 });
    assert_eq!(
        serde_json::to_string(&event)?,
        r#"{"event":"notification","kind":"car_updated","car_index":7}"#
    );

    let dropped = ClientEvent::FrameDropped {
        error: "unknown car index 99".to_string(),
    };
    assert_eq!(
        serde_json::to_string(&dropped)?,
        r#"{"event":"frame_dropped","error":"unknown car index 99"}"#
    );
    Ok(())
}
