//! Client configuration.
//!
//! Loaded from a JSON or YAML file (chosen by extension), optionally merged
//! with the simulation's own `broadcasting.json`, then overridden by CLI
//! flags.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::Path;
use std::time::Duration;

use acc_broadcast_protocol::{BROADCASTING_PROTOCOL_VERSION, RegistrationParams};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ClientError;

/// Default broadcasting port of the simulation.
pub const DEFAULT_BROADCAST_PORT: u16 = 9000;

/// Broadcasting client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Address of the simulation's broadcasting listener
    pub server_address: SocketAddr,
    /// Name shown by the simulation for this client
    pub display_name: String,
    pub connection_password: String,
    pub command_password: String,
    /// Realtime update interval requested from the simulation
    pub update_interval_ms: i32,
    pub protocol_version: u8,
    /// Request track data alongside the entry list after registering
    pub request_track_data: bool,
    /// Silence after which an unanswered registration is re-sent
    pub registration_timeout_ms: u64,
    /// Registration attempts before giving up (0 = unlimited)
    pub max_registration_attempts: u32,
    /// Capacity of the event channel handed to the caller
    pub channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::LOCALHOST,
                DEFAULT_BROADCAST_PORT,
            )),
            display_name: "AC Remote Telemetry Client".to_string(),
            connection_password: String::new(),
            command_password: String::new(),
            update_interval_ms: 1000,
            protocol_version: BROADCASTING_PROTOCOL_VERSION,
            request_track_data: false,
            registration_timeout_ms: 2000,
            max_registration_attempts: 5,
            channel_capacity: 100,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a `.json`, `.yaml` or `.yml` file.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let config = match extension.as_deref() {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            Some("json") => Self::from_json_str(&content),
            other => Err(ClientError::InvalidConfiguration(format!(
                "unsupported config file extension {other:?}"
            ))),
        }
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        debug!(path = %path.display(), "Loaded broadcasting client config");
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ClientError> {
        let config: ClientConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ClientError> {
        let config: ClientConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.update_interval_ms <= 0 {
            return Err(ClientError::InvalidConfiguration(format!(
                "update_interval_ms must be positive, got {}",
                self.update_interval_ms
            )));
        }
        if self.display_name.len() > usize::from(u16::MAX) {
            return Err(ClientError::InvalidConfiguration(
                "display_name exceeds 65535 bytes".to_string(),
            ));
        }
        if self.registration_timeout_ms == 0 {
            return Err(ClientError::InvalidConfiguration(
                "registration_timeout_ms must be positive".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ClientError::InvalidConfiguration(
                "channel_capacity must be positive".to_string(),
            ));
        }
        if self.server_address.port() == 0 {
            return Err(ClientError::InvalidConfiguration(
                "server_address needs a non-zero port".to_string(),
            ));
        }
        Ok(())
    }

    /// Fill port and passwords from the simulation's `broadcasting.json`.
    ///
    /// Accepts both `updListenerPort` (the key the simulation writes) and
    /// `udpListenerPort`. Missing keys leave the current values untouched.
    pub fn apply_broadcasting_json(&mut self, content: &str) -> Result<(), ClientError> {
        let value: Value = serde_json::from_str(content.trim_start_matches('\u{feff}'))?;
        let object = value.as_object().ok_or_else(|| {
            ClientError::InvalidConfiguration("broadcasting.json is not an object".to_string())
        })?;

        let port = object
            .get("updListenerPort")
            .or_else(|| object.get("udpListenerPort"))
            .and_then(Value::as_u64);
        if let Some(port) = port {
            let port = u16::try_from(port).map_err(|_| {
                ClientError::InvalidConfiguration(format!("listener port {port} out of range"))
            })?;
            self.server_address.set_port(port);
        }

        if let Some(password) = object.get("connectionPassword").and_then(Value::as_str) {
            self.connection_password = password.to_string();
        }
        if let Some(password) = object.get("commandPassword").and_then(Value::as_str) {
            self.command_password = password.to_string();
        }

        self.validate()
    }

    /// Read and apply a `broadcasting.json` file.
    pub async fn apply_broadcasting_json_file(&mut self, path: &Path) -> Result<()> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        self.apply_broadcasting_json(&content)
            .with_context(|| format!("Failed to apply {}", path.display()))?;
        Ok(())
    }

    pub fn registration_params(&self) -> RegistrationParams {
        RegistrationParams {
            protocol_version: self.protocol_version,
            display_name: self.display_name.clone(),
            connection_password: self.connection_password.clone(),
            update_interval_ms: self.update_interval_ms,
            command_password: self.command_password.clone(),
        }
    }

    pub fn registration_timeout(&self) -> Duration {
        Duration::from_millis(self.registration_timeout_ms)
    }
}
