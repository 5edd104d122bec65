//! Gamepad HAL whose controllers live on a remote input server reached over
//! UDP. Exposes per-slot state, capabilities, keystroke transitions and
//! vibration for up to four controllers.

mod codec;
mod commands;
mod config;
mod device;
mod error;
mod keystroke;
mod state;
mod transport;

pub use codec::PEER_PORT;
pub use commands::{
    enable, get_battery_information, get_capabilities, get_capabilities_ex,
    get_dsound_audio_device_guids, get_keystroke, get_state, get_state_ex, hal, set_vibration,
    slot_status, Hal,
};
pub use config::{Settings, PEER_IP_ENV};
pub use device::*;
pub use error::{NetPadError, Result, STATUS_EMPTY, STATUS_SUCCESS};
