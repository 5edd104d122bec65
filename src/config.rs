use crate::codec::PEER_PORT;
use crate::error::{NetPadError, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the input server address.
pub const PEER_IP_ENV: &str = "MICEWINE_JOYSTICK_SERVER_IP";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Input server address; the port is always [`PEER_PORT`].
    pub peer_ip: IpAddr,
    /// Local endpoint to bind.
    pub bind_addr: SocketAddr,
    /// How long the first caller waits for the handshake reply.
    pub handshake_wait_ms: u64,
    pub recv_timeout_ms: u64,
    /// Silent receives tolerated before every slot is dropped.
    pub max_consecutive_timeouts: u32,
    /// How long readiness is pulsed after the mass-disconnect.
    pub ready_flash_ms: u64,
    pub ready_poll_ms: u64,
    /// Bound on readiness waits. `None` waits until the server answers or
    /// the silence escalation releases the caller.
    pub ready_timeout_ms: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            peer_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            handshake_wait_ms: 2000,
            recv_timeout_ms: 2000,
            max_consecutive_timeouts: 60,
            ready_flash_ms: 250,
            ready_poll_ms: 125,
            ready_timeout_ms: None,
        }
    }
}

impl Settings {
    fn config_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| NetPadError::Config("Cannot find config directory".into()))?
            .join("netpad");
        Ok(dir.join("config.json"))
    }

    /// Defaults, then the user config file if present, then the environment.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut settings = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        settings.apply_env(std::env::var(PEER_IP_ENV).ok().as_deref())?;
        Ok(settings)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Apply the value of [`PEER_IP_ENV`], if set.
    pub fn apply_env(&mut self, peer_ip: Option<&str>) -> Result<()> {
        if let Some(raw) = peer_ip {
            self.peer_ip = raw
                .trim()
                .parse()
                .map_err(|e| NetPadError::Config(format!("{}={:?}: {}", PEER_IP_ENV, raw, e)))?;
        }
        Ok(())
    }

    pub fn peer_addr(&self) -> SocketAddr {
        SocketAddr::new(self.peer_ip, PEER_PORT)
    }

    pub fn handshake_wait(&self) -> Duration {
        Duration::from_millis(self.handshake_wait_ms)
    }

    pub fn recv_timeout(&self) -> Duration {
        // A zero read timeout is rejected by the socket layer
        Duration::from_millis(self.recv_timeout_ms.max(1))
    }

    pub fn ready_flash(&self) -> Duration {
        Duration::from_millis(self.ready_flash_ms)
    }

    /// Kept under half the readiness pulse so a waiter cannot sleep through it.
    pub fn ready_poll(&self) -> Duration {
        Duration::from_millis(self.ready_poll_ms.min(self.ready_flash_ms / 2).max(1))
    }

    pub fn ready_timeout(&self) -> Option<Duration> {
        self.ready_timeout_ms.map(Duration::from_millis)
    }
}
