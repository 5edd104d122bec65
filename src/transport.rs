use crate::codec::{self, Datagram, Reply};
use crate::config::Settings;
use crate::error::{NetPadError, Result};
use crate::state::{Registry, SlotChange};
use flume::{Receiver, Sender};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Large enough that an oversized datagram is truncated rather than
/// rejected by the socket layer.
const RECV_BUFFER_SIZE: usize = 512;

/// Session with the remote input server.
///
/// Runs on a dedicated `std::thread`: sends a poll carrying the current
/// vibration commands, waits for the state reply, applies it to the
/// [`Registry`] and marks it ready. After a long enough silence every slot
/// is dropped and readiness is pulsed so blocked callers can return.
pub struct Transport {
    shutdown: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    peer: SocketAddr,
}

impl Transport {
    /// Open the endpoint, probe the server and start the worker.
    ///
    /// Blocks for at most `handshake_wait` on the handshake reply; an
    /// unanswered probe is not an error, readiness just arrives later.
    pub fn start(settings: &Settings, peer: SocketAddr, registry: Arc<Registry>) -> Result<Self> {
        let socket = UdpSocket::bind(settings.bind_addr).map_err(|e| {
            NetPadError::TransportUnavailable(format!("bind {}: {}", settings.bind_addr, e))
        })?;

        if let Err(e) = socket.set_read_timeout(Some(settings.recv_timeout())) {
            log::warn!("Failed to set receive timeout: {}", e);
        }

        let (handshake_tx, handshake_rx) = flume::bounded(1);

        if let Err(e) = socket.send_to(&codec::probe_datagram(), peer) {
            log::warn!("Failed to send connection probe to {}: {}", peer, e);
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let alive = Arc::new(AtomicBool::new(true));

        let worker = Worker {
            socket,
            peer,
            registry,
            handshake: handshake_tx,
            shutdown: shutdown.clone(),
            recv_timeout: settings.recv_timeout(),
            max_timeouts: settings.max_consecutive_timeouts,
            ready_flash: settings.ready_flash(),
        };
        let alive_flag = alive.clone();

        let handle = thread::Builder::new()
            .name("netpad-transport".into())
            .spawn(move || {
                worker.run();
                alive_flag.store(false, Ordering::SeqCst);
            })
            .map_err(|e| NetPadError::TransportUnavailable(format!("spawn worker: {}", e)))?;

        wait_for_handshake(&handshake_rx, settings.handshake_wait(), peer);

        Ok(Self {
            shutdown,
            alive,
            handle: Some(handle),
            peer,
        })
    }

    /// Whether the worker loop is still running.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            log::debug!("Waiting for transport worker to stop...");
            let _ = handle.join();
        }
    }
}

fn wait_for_handshake(handshake: &Receiver<()>, wait: Duration, peer: SocketAddr) {
    match handshake.recv_timeout(wait) {
        Ok(()) => log::info!("Input server {} acknowledged connection", peer),
        Err(_) => log::warn!(
            "No handshake from input server {} within {:?}, continuing",
            peer,
            wait
        ),
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

struct Worker {
    socket: UdpSocket,
    peer: SocketAddr,
    registry: Arc<Registry>,
    handshake: Sender<()>,
    shutdown: Arc<AtomicBool>,
    recv_timeout: Duration,
    max_timeouts: u32,
    ready_flash: Duration,
}

impl Worker {
    fn run(self) {
        log::info!("Transport worker started (peer {})", self.peer);

        let mut buf = [0u8; RECV_BUFFER_SIZE];
        let mut timeouts: u32 = 0;

        while !self.shutdown.load(Ordering::SeqCst) {
            let poll = codec::poll_datagram(&self.registry.vibrations());
            if let Err(e) = self.socket.send_to(&poll, self.peer) {
                log::debug!("Poll send to {} failed: {}", self.peer, e);
            }

            match self.socket.recv_from(&mut buf) {
                Ok((len, from)) => {
                    timeouts = 0;
                    log::trace!("Received {} bytes from {}", len, from);
                    self.dispatch(&codec::datagram_from(&buf[..len]));
                }
                Err(e) => {
                    if !is_timeout(&e) {
                        // Errors such as a reset from an absent server return
                        // immediately; pace them like a timeout.
                        log::debug!("Receive failed: {}", e);
                        thread::sleep(self.recv_timeout);
                    }
                    timeouts = timeouts.saturating_add(1);
                    if timeouts > self.max_timeouts {
                        self.escalate();
                        timeouts = 0;
                    }
                }
            }
        }

        log::info!("Transport worker stopped");
    }

    fn dispatch(&self, datagram: &Datagram) {
        match codec::classify(datagram) {
            Reply::Handshake => {
                // Full or disconnected just means the starting caller is done waiting
                let _ = self.handshake.try_send(());
            }
            Reply::State => {
                for (slot, block) in codec::split_blocks(datagram).iter().enumerate() {
                    match self.registry.apply_block(slot, block) {
                        SlotChange::Connected => log::info!("Controller {} connected", slot),
                        SlotChange::Disconnected => {
                            log::info!("Controller {} disconnected", slot)
                        }
                        SlotChange::Updated | SlotChange::Idle => {}
                    }
                }
                self.registry.set_ready(true);
            }
            Reply::Unknown(header) => {
                log::debug!("Ignoring datagram with unknown header {}", header);
            }
        }
    }

    /// Drop every slot and pulse readiness so callers blocked on it return
    /// `NotConnected` instead of waiting for a server that is gone.
    fn escalate(&self) {
        let dropped = self.registry.disconnect_all();
        log::warn!(
            "No reply from input server {} after {} attempts, disconnected {} controller(s)",
            self.peer,
            self.max_timeouts.saturating_add(1),
            dropped
        );
        self.registry.set_ready(true);
        thread::sleep(self.ready_flash);
        self.registry.set_ready(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{BLOCK_SIZE, DATAGRAM_SIZE, REQUEST_CONNECTION, REQUEST_STATE};
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn settings() -> Settings {
        Settings {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            handshake_wait_ms: 2000,
            recv_timeout_ms: 50,
            max_consecutive_timeouts: 2,
            ready_flash_ms: 100,
            ..Settings::default()
        }
    }

    fn peer_socket() -> UdpSocket {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        socket
    }

    fn wait_until(limit: Duration, mut f: impl FnMut() -> bool) -> bool {
        let started = Instant::now();
        while started.elapsed() < limit {
            if f() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_probe_then_poll() {
        let peer = peer_socket();
        let peer_addr = peer.local_addr().unwrap();
        let registry = Arc::new(Registry::new());

        let server = thread::spawn(move || {
            let mut buf = [0u8; DATAGRAM_SIZE];
            let (_, from) = peer.recv_from(&mut buf).unwrap();
            assert_eq!(buf[0], REQUEST_CONNECTION);
            peer.send_to(&codec::probe_datagram(), from).unwrap();

            let (len, from) = peer.recv_from(&mut buf).unwrap();
            assert_eq!(len, DATAGRAM_SIZE);
            assert_eq!(buf[0], REQUEST_STATE);

            let mut reply = [0u8; DATAGRAM_SIZE];
            reply[0] = REQUEST_STATE;
            reply[BLOCK_SIZE + 1] = 1;
            peer.send_to(&reply, from).unwrap();
        });

        let started = Instant::now();
        let settings = Settings {
            max_consecutive_timeouts: 1000,
            ..settings()
        };
        let transport = Transport::start(&settings, peer_addr, registry.clone()).unwrap();
        assert!(started.elapsed() < Duration::from_millis(1500));
        server.join().unwrap();

        assert!(wait_until(Duration::from_secs(2), || registry.is_ready()));
        assert!(registry.status(1).connected);
        assert!(!registry.status(0).connected);
        assert!(transport.is_alive());
        assert_eq!(transport.peer(), peer_addr);
    }

    #[test]
    fn test_unanswered_probe_releases_caller() {
        let peer = peer_socket();
        let started = Instant::now();
        let transport = Transport::start(
            &Settings {
                handshake_wait_ms: 200,
                max_consecutive_timeouts: 1000,
                ..settings()
            },
            peer.local_addr().unwrap(),
            Arc::new(Registry::new()),
        )
        .unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(150), "{:?}", elapsed);
        assert!(elapsed < Duration::from_secs(1), "{:?}", elapsed);
        assert!(transport.is_alive());
    }

    #[test]
    fn test_late_handshake_replies_are_harmless() {
        let peer = peer_socket();
        peer.set_read_timeout(Some(Duration::from_millis(20))).unwrap();
        let peer_addr = peer.local_addr().unwrap();
        let stop = Arc::new(AtomicBool::new(false));
        let answered = Arc::new(AtomicUsize::new(0));

        let server = {
            let (stop, answered) = (stop.clone(), answered.clone());
            thread::spawn(move || {
                let mut buf = [0u8; DATAGRAM_SIZE];
                while !stop.load(Ordering::SeqCst) {
                    let Ok((_, from)) = peer.recv_from(&mut buf) else {
                        continue;
                    };
                    if peer.send_to(&codec::probe_datagram(), from).is_ok() {
                        answered.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        };

        let registry = Arc::new(Registry::new());
        let transport = Transport::start(
            &Settings {
                handshake_wait_ms: 500,
                max_consecutive_timeouts: 1000,
                ..settings()
            },
            peer_addr,
            registry.clone(),
        )
        .unwrap();

        let after_start = answered.load(Ordering::SeqCst);
        assert!(wait_until(Duration::from_secs(2), || {
            answered.load(Ordering::SeqCst) >= after_start + 5
        }));
        assert!(transport.is_alive());
        assert!(!registry.is_ready());

        stop.store(true, Ordering::SeqCst);
        server.join().unwrap();
    }

    #[test]
    fn test_silence_disconnects_and_pulses_ready() {
        let peer = peer_socket();
        let peer_addr = peer.local_addr().unwrap();
        let registry = Arc::new(Registry::new());

        let mut block = [0u8; BLOCK_SIZE];
        block[1] = 1;
        registry.apply_block(0, &block);

        let transport = Transport::start(
            &Settings {
                handshake_wait_ms: 10,
                ..settings()
            },
            peer_addr,
            registry.clone(),
        )
        .unwrap();

        assert!(wait_until(Duration::from_secs(3), || registry.is_ready()));
        assert!(!registry.status(0).connected);
        assert!(wait_until(Duration::from_secs(3), || !registry.is_ready()));
        drop(transport);
        drop(peer);
    }

    #[test]
    fn test_bind_failure_is_transport_unavailable() {
        let taken = UdpSocket::bind("127.0.0.1:0").unwrap();
        let settings = Settings {
            bind_addr: taken.local_addr().unwrap(),
            ..settings()
        };
        let result = Transport::start(
            &settings,
            "127.0.0.1:9".parse().unwrap(),
            Arc::new(Registry::new()),
        );
        assert!(matches!(result, Err(NetPadError::TransportUnavailable(_))));
    }

    #[test]
    fn test_drop_stops_worker() {
        let peer = peer_socket();
        let transport = Transport::start(
            &Settings {
                handshake_wait_ms: 10,
                max_consecutive_timeouts: 1000,
                ..settings()
            },
            peer.local_addr().unwrap(),
            Arc::new(Registry::new()),
        )
        .unwrap();
        let alive = transport.alive.clone();
        drop(transport);
        assert!(!alive.load(Ordering::SeqCst));
    }
}
