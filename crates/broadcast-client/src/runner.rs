//! Receive loop driving a [`ClientSession`] over a [`DatagramTransport`].
//!
//! The session lives inside one task, so inbound datagrams are handled
//! strictly one at a time in arrival order. Notifications are forwarded to
//! the caller through a bounded channel; the loop stops when the receiver is
//! dropped or shutdown is signalled.

use std::time::Duration;

use acc_broadcast_protocol::{ClientSession, HandshakeState, Notification};
use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::transport::{DatagramTransport, MAX_DATAGRAM_SIZE, UdpTransport};

const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Event delivered to the caller of the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    Notification(Notification),
    /// An inbound frame was dropped; the session is unaffected.
    FrameDropped { error: String },
}

enum Flow {
    Continue,
    Stop,
}

pub struct BroadcastRunner<T> {
    transport: T,
    session: ClientSession,
    registration_timeout: Duration,
    max_registration_attempts: u32,
}

impl<T: DatagramTransport> BroadcastRunner<T> {
    pub fn new(transport: T, config: &ClientConfig) -> Self {
        let session = ClientSession::new(config.registration_params())
            .with_track_data_request(config.request_track_data);
        Self {
            transport,
            session,
            registration_timeout: config.registration_timeout(),
            max_registration_attempts: config.max_registration_attempts,
        }
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    /// Registers, then handles datagrams until shutdown.
    ///
    /// Returns the session as it was when the loop stopped, before
    /// unregistering.
    pub async fn run(
        mut self,
        events: mpsc::Sender<ClientEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<ClientSession> {
        let register = self.session.connect()?;
        self.transport
            .send(&register)
            .await
            .context("Failed to send broadcasting registration")?;
        let mut attempts = 1u32;

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            let received = tokio::select! {
                _ = shutdown.recv() => {
                    info!("Broadcasting client shutdown requested");
                    break;
                }
                received = tokio::time::timeout(
                    self.registration_timeout,
                    self.transport.recv(&mut buf),
                ) => received,
            };

            match received {
                Ok(Ok(len)) => {
                    let datagram = buf.get(..len).unwrap_or_default();
                    match self.handle_datagram(datagram, &events).await? {
                        Flow::Continue => {}
                        Flow::Stop => break,
                    }
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Broadcasting UDP receive error");
                    tokio::time::sleep(RECV_ERROR_BACKOFF).await;
                }
                Err(_) => self.on_silence(&mut attempts).await?,
            }
        }

        let final_session = self.session.clone();
        if self.session.connection_id().is_some() {
            let unregister = self.session.disconnect()?;
            if let Err(e) = self.transport.send(&unregister).await {
                debug!(error = %e, "Failed to send broadcasting unregister");
            }
        }

        info!("Stopped broadcasting client");
        Ok(final_session)
    }

    async fn handle_datagram(
        &mut self,
        datagram: &[u8],
        events: &mpsc::Sender<ClientEvent>,
    ) -> Result<Flow> {
        let dispatch = match self.session.handle_inbound(datagram) {
            Ok(dispatch) => dispatch,
            Err(e) if e.is_frame_local() => {
                let event = ClientEvent::FrameDropped {
                    error: e.to_string(),
                };
                if events.send(event).await.is_err() {
                    debug!("Event receiver dropped, stopping broadcasting client");
                    return Ok(Flow::Stop);
                }
                return Ok(Flow::Continue);
            }
            Err(e) => return Err(ClientError::from(e).into()),
        };

        for frame in &dispatch.outbound {
            if let Err(e) = self.transport.send(frame).await {
                debug!(error = %e, "Failed to send broadcasting request");
            }
        }

        for notification in dispatch.notifications {
            let rejected = match &notification {
                Notification::RegistrationRejected { message } => Some(message.clone()),
                _ => None,
            };

            if events
                .send(ClientEvent::Notification(notification))
                .await
                .is_err()
            {
                debug!("Event receiver dropped, stopping broadcasting client");
                return Ok(Flow::Stop);
            }

            if let Some(message) = rejected {
                return Err(ClientError::RegistrationRejected(message).into());
            }
        }

        Ok(Flow::Continue)
    }

    async fn on_silence(&mut self, attempts: &mut u32) -> Result<()> {
        if self.session.handshake() != HandshakeState::AwaitingRegistration {
            debug!("No broadcasting data received (timeout)");
            return Ok(());
        }

        if self.max_registration_attempts > 0 && *attempts >= self.max_registration_attempts {
            warn!(attempts = *attempts, "Giving up on broadcasting registration");
            return Err(ClientError::RegistrationTimedOut {
                attempts: *attempts,
            }
            .into());
        }

        let register = self.session.connect()?;
        self.transport
            .send(&register)
            .await
            .context("Failed to re-send broadcasting registration")?;
        *attempts = attempts.saturating_add(1);
        debug!(attempt = *attempts, "Re-sent broadcasting registration");
        Ok(())
    }
}

/// Handle to a runner spawned on the tokio runtime.
pub struct BroadcastHandle {
    events: mpsc::Receiver<ClientEvent>,
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<Result<ClientSession>>,
}

impl BroadcastHandle {
    /// Next event, or `None` once the runner has stopped.
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        self.events.recv().await
    }

    /// Signals shutdown and waits for the runner to unregister and stop.
    pub async fn shutdown(self) -> Result<ClientSession> {
        if self.shutdown.send(()).is_err() {
            debug!("Broadcasting client already stopped");
        }
        drop(self.events);
        self.task.await.context("Broadcasting client task failed")?
    }
}

/// Connects a UDP transport and spawns the runner for `config`.
pub async fn spawn(config: ClientConfig) -> Result<BroadcastHandle> {
    config.validate()?;

    let transport = UdpTransport::connect(config.server_address)
        .await
        .with_context(|| format!("Failed to connect to {}", config.server_address))?;
    info!(
        endpoint = %transport.peer(),
        "Broadcasting client connected; waiting for protocol messages"
    );

    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let runner = BroadcastRunner::new(transport, &config);
    let task = tokio::spawn(runner.run(tx, shutdown_rx));

    Ok(BroadcastHandle {
        events: rx,
        shutdown: shutdown_tx,
        task,
    })
}
