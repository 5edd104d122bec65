//! Query / command surface handed to the compatibility layer.
//!
//! [`Hal`] owns one transport session and the slot registry. The free
//! functions at the bottom operate on a process-wide instance that is
//! started on first use.

use crate::config::Settings;
use crate::device::{
    Capabilities, CapabilitiesEx, GamepadState, Keystroke, SlotSelector, SlotStatus, Vibration,
    BUTTON_GUIDE, DEVSUBTYPE_GAMEPAD, FLAG_GAMEPAD, MAX_SLOTS, PRODUCT_ID, VENDOR_ID,
};
use crate::error::{NetPadError, Result};
use crate::keystroke;
use crate::state::Registry;
use crate::transport::Transport;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

pub struct Hal {
    settings: Settings,
    registry: Arc<Registry>,
    /// Startup failure is kept so every later call can report it.
    transport: std::result::Result<Transport, String>,
}

impl Hal {
    /// Start a session with the server named in `settings`.
    pub fn start(settings: Settings) -> Self {
        let peer = settings.peer_addr();
        Self::with_peer(settings, peer)
    }

    /// Start a session with an explicit server address.
    pub fn with_peer(settings: Settings, peer: SocketAddr) -> Self {
        let registry = Arc::new(Registry::new());
        let transport = Transport::start(&settings, peer, registry.clone()).map_err(|e| {
            log::error!("Input transport unavailable: {}", e);
            e.to_string()
        });
        Self {
            settings,
            registry,
            transport,
        }
    }

    fn session(&self) -> Result<&Transport> {
        match &self.transport {
            Ok(transport) if transport.is_alive() => Ok(transport),
            Ok(_) => Err(NetPadError::TransportUnavailable(
                "transport worker has stopped".into(),
            )),
            Err(reason) => Err(NetPadError::TransportUnavailable(reason.clone())),
        }
    }

    /// Block until at least one state reply has been applied (or the
    /// silence escalation pulses readiness).
    fn wait_ready(&self) -> Result<()> {
        let started = Instant::now();
        loop {
            self.session()?;
            if self.registry.is_ready() {
                return Ok(());
            }
            if let Some(limit) = self.settings.ready_timeout() {
                if started.elapsed() >= limit {
                    return Err(NetPadError::NotReady(limit));
                }
            }
            std::thread::sleep(self.settings.ready_poll());
        }
    }

    /// Address of the input server, if the session could be started.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.transport.as_ref().ok().map(Transport::peer)
    }

    pub fn enable(&self, enable: bool) {
        self.registry.set_enabled_all(enable);
    }

    /// Store a vibration command; the transport sends it with the next poll.
    pub fn set_vibration(&self, index: u32, vibration: Vibration) -> Result<()> {
        let slot = Registry::check_index(index)?;
        self.session()?;
        self.registry.set_vibration(slot, vibration);
        Ok(())
    }

    /// Snapshot of a slot's state with the guide button masked out.
    pub fn get_state(&self, index: u32) -> Result<GamepadState> {
        let mut state = self.get_state_ex(index)?;
        state.gamepad.buttons &= !BUTTON_GUIDE;
        Ok(state)
    }

    /// Snapshot of a slot's state including the guide button.
    pub fn get_state_ex(&self, index: u32) -> Result<GamepadState> {
        let slot = Registry::check_index(index)?;
        self.wait_ready()?;
        let controller = self.registry.lock_slot(slot);
        if !controller.connected {
            return Err(NetPadError::NotConnected(index));
        }
        Ok(controller.state)
    }

    /// Next pending button transition, `None` when there is nothing new.
    ///
    /// With [`SlotSelector::Any`] slots are tried in ascending order and the
    /// first transition found is returned.
    pub fn get_keystroke(&self, selector: SlotSelector) -> Result<Option<Keystroke>> {
        match selector {
            SlotSelector::Index(index) => {
                let slot = Registry::check_index(index)?;
                Ok(self.slot_keystroke(slot))
            }
            SlotSelector::Any => Ok((0..MAX_SLOTS).find_map(|slot| self.slot_keystroke(slot))),
        }
    }

    fn slot_keystroke(&self, slot: usize) -> Option<Keystroke> {
        let mut guard = self.registry.lock_slot(slot);
        let controller = &mut *guard;
        let event = keystroke::next_keystroke(
            slot as u8,
            &controller.state.gamepad,
            &mut controller.last_keystroke,
        );
        if let Some(event) = &event {
            log::debug!("Keystroke {:?}", event);
        }
        event
    }

    pub fn get_capabilities(&self, index: u32, flags: u32) -> Result<Capabilities> {
        Ok(self.get_capabilities_ex(index, flags)?.capabilities)
    }

    /// Capabilities plus vendor / product ids. With [`FLAG_GAMEPAD`] a
    /// non-gamepad subtype is reported as not connected.
    pub fn get_capabilities_ex(&self, index: u32, flags: u32) -> Result<CapabilitiesEx> {
        let slot = Registry::check_index(index)?;
        self.wait_ready()?;
        let controller = self.registry.lock_slot(slot);
        if !controller.connected {
            return Err(NetPadError::NotConnected(index));
        }
        if flags & FLAG_GAMEPAD != 0 && controller.capabilities.sub_type != DEVSUBTYPE_GAMEPAD {
            return Err(NetPadError::NotConnected(index));
        }
        Ok(CapabilitiesEx {
            capabilities: controller.capabilities,
            vendor_id: VENDOR_ID,
            product_id: PRODUCT_ID,
        })
    }

    /// The input server carries no battery data; never succeeds.
    pub fn get_battery_information(&self, index: u32, device_kind: u8) -> Result<()> {
        self.unsupported(index, "battery information")
    }

    /// The input server carries no audio devices; never succeeds.
    pub fn get_dsound_audio_device_guids(&self, index: u32) -> Result<()> {
        self.unsupported(index, "audio device guids")
    }

    fn unsupported(&self, index: u32, feature: &'static str) -> Result<()> {
        let slot = Registry::check_index(index)?;
        if !self.registry.lock_slot(slot).connected {
            return Err(NetPadError::NotConnected(index));
        }
        Err(NetPadError::Unsupported(feature))
    }

    pub fn slot_status(&self, index: u32) -> Result<SlotStatus> {
        let slot = Registry::check_index(index)?;
        Ok(self.registry.status(slot))
    }
}

static HAL: OnceLock<Hal> = OnceLock::new();

/// The process-wide instance, started exactly once on first use.
pub fn hal() -> &'static Hal {
    HAL.get_or_init(|| {
        let _ = env_logger::try_init();
        let settings = Settings::load().unwrap_or_else(|e| {
            log::warn!("Ignoring netpad configuration: {}", e);
            Settings::default()
        });
        log::info!("Starting netpad session with {}", settings.peer_addr());
        Hal::start(settings)
    })
}

pub fn enable(enable: bool) {
    log::trace!("enable {}", enable);
    hal().enable(enable)
}

pub fn set_vibration(index: u32, vibration: Vibration) -> Result<()> {
    log::trace!("index {}, vibration {:?}", index, vibration);
    hal().set_vibration(index, vibration)
}

pub fn get_state(index: u32) -> Result<GamepadState> {
    log::trace!("get_state {}", index);
    hal().get_state(index)
}

pub fn get_state_ex(index: u32) -> Result<GamepadState> {
    log::trace!("get_state_ex {}", index);
    hal().get_state_ex(index)
}

pub fn get_keystroke(selector: impl Into<SlotSelector>) -> Result<Option<Keystroke>> {
    let selector = selector.into();
    log::trace!("get_keystroke {:?}", selector);
    hal().get_keystroke(selector)
}

pub fn get_capabilities(index: u32, flags: u32) -> Result<Capabilities> {
    log::trace!("get_capabilities {}, flags {:#x}", index, flags);
    hal().get_capabilities(index, flags)
}

pub fn get_capabilities_ex(index: u32, flags: u32) -> Result<CapabilitiesEx> {
    log::trace!("get_capabilities_ex {}, flags {:#x}", index, flags);
    hal().get_capabilities_ex(index, flags)
}

pub fn get_battery_information(index: u32, device_kind: u8) -> Result<()> {
    log::trace!("get_battery_information {}, kind {}", index, device_kind);
    hal().get_battery_information(index, device_kind)
}

pub fn get_dsound_audio_device_guids(index: u32) -> Result<()> {
    log::trace!("get_dsound_audio_device_guids {}", index);
    hal().get_dsound_audio_device_guids(index)
}

pub fn slot_status(index: u32) -> Result<SlotStatus> {
    log::trace!("slot_status {}", index);
    hal().slot_status(index)
}
