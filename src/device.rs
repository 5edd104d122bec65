use serde::{Deserialize, Serialize};

/// Number of controller slots the HAL exposes.
pub const MAX_SLOTS: usize = 4;

/// Wildcard user index accepted by keystroke queries.
pub const USER_INDEX_ANY: u32 = 0xFF;

// Gamepad button bits (XInput layout)
pub const BUTTON_DPAD_UP: u16 = 0x0001;
pub const BUTTON_DPAD_DOWN: u16 = 0x0002;
pub const BUTTON_DPAD_LEFT: u16 = 0x0004;
pub const BUTTON_DPAD_RIGHT: u16 = 0x0008;
pub const BUTTON_START: u16 = 0x0010;
pub const BUTTON_BACK: u16 = 0x0020;
pub const BUTTON_LEFT_THUMB: u16 = 0x0040;
pub const BUTTON_RIGHT_THUMB: u16 = 0x0080;
pub const BUTTON_LEFT_SHOULDER: u16 = 0x0100;
pub const BUTTON_RIGHT_SHOULDER: u16 = 0x0200;
/// Not reported by the plain state query, only by the extended one.
pub const BUTTON_GUIDE: u16 = 0x0400;
pub const BUTTON_A: u16 = 0x1000;
pub const BUTTON_B: u16 = 0x2000;
pub const BUTTON_X: u16 = 0x4000;
pub const BUTTON_Y: u16 = 0x8000;

// Pad virtual-key codes
pub const VK_PAD_A: u16 = 0x5800;
pub const VK_PAD_B: u16 = 0x5801;
pub const VK_PAD_X: u16 = 0x5802;
pub const VK_PAD_Y: u16 = 0x5803;
pub const VK_PAD_RSHOULDER: u16 = 0x5804;
pub const VK_PAD_LSHOULDER: u16 = 0x5805;
pub const VK_PAD_LTRIGGER: u16 = 0x5806;
pub const VK_PAD_RTRIGGER: u16 = 0x5807;
pub const VK_PAD_DPAD_UP: u16 = 0x5810;
pub const VK_PAD_DPAD_DOWN: u16 = 0x5811;
pub const VK_PAD_DPAD_LEFT: u16 = 0x5812;
pub const VK_PAD_DPAD_RIGHT: u16 = 0x5813;
pub const VK_PAD_START: u16 = 0x5814;
pub const VK_PAD_BACK: u16 = 0x5815;
pub const VK_PAD_LTHUMB_PRESS: u16 = 0x5816;
pub const VK_PAD_RTHUMB_PRESS: u16 = 0x5817;
/// Base of the eight left-stick direction codes: up, down, right, left,
/// up-left, up-right, down-right, down-left.
pub const VK_PAD_LTHUMB_UP: u16 = 0x5820;
/// Base of the eight right-stick direction codes, same order as the left stick.
pub const VK_PAD_RTHUMB_UP: u16 = 0x5830;

// Capability tags
pub const DEVTYPE_GAMEPAD: u8 = 0x01;
pub const DEVSUBTYPE_GAMEPAD: u8 = 0x01;
pub const CAPS_FFB_SUPPORTED: u16 = 0x0001;
/// `get_capabilities` flag: only accept gamepad-subtype devices.
pub const FLAG_GAMEPAD: u32 = 0x0000_0001;

/// Vendor / product ids reported for every remote controller.
pub const VENDOR_ID: u16 = 0x045E;
pub const PRODUCT_ID: u16 = 0x02A1;

/// Instantaneous button and analog values of one controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gamepad {
    pub buttons: u16,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub thumb_lx: i16,
    pub thumb_ly: i16,
    pub thumb_rx: i16,
    pub thumb_ry: i16,
}

/// Gamepad values plus the packet counter of the last applied update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamepadState {
    pub packet_number: u32,
    pub gamepad: Gamepad,
}

/// Force-feedback motor speeds, full 16-bit range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vibration {
    pub left_motor: u16,
    pub right_motor: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub device_type: u8,
    pub sub_type: u8,
    pub flags: u16,
    /// Maximal values for each reported control
    pub gamepad: Gamepad,
    pub vibration: Vibration,
}

impl Capabilities {
    /// Capabilities advertised for any controller the input server reports.
    pub fn remote_gamepad() -> Self {
        Self {
            device_type: DEVTYPE_GAMEPAD,
            sub_type: DEVSUBTYPE_GAMEPAD,
            flags: CAPS_FFB_SUPPORTED,
            gamepad: Gamepad {
                buttons: 0xFFFF,
                left_trigger: 3,
                right_trigger: 3,
                thumb_lx: 7,
                thumb_ly: 7,
                thumb_rx: 7,
                thumb_ry: 7,
            },
            vibration: Vibration {
                left_motor: 255,
                right_motor: 255,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitiesEx {
    pub capabilities: Capabilities,
    pub vendor_id: u16,
    pub product_id: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyAction {
    Down,
    Up,
}

impl KeyAction {
    /// Keystroke flag bits as seen by the compatibility layer.
    pub fn flags(self) -> u16 {
        match self {
            KeyAction::Down => 0x0001,
            KeyAction::Up => 0x0002,
        }
    }
}

/// One discrete button transition derived from two polled snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keystroke {
    pub virtual_key: u16,
    pub action: KeyAction,
    pub user_index: u8,
    /// Always 0, the input server carries no text
    pub unicode: u16,
    /// Always 0
    pub hid_code: u8,
}

impl Keystroke {
    pub fn new(virtual_key: u16, action: KeyAction, user_index: u8) -> Self {
        Self {
            virtual_key,
            action,
            user_index,
            unicode: 0,
            hid_code: 0,
        }
    }
}

/// Which slot(s) a keystroke query should look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotSelector {
    Index(u32),
    Any,
}

impl From<u32> for SlotSelector {
    fn from(index: u32) -> Self {
        if index == USER_INDEX_ANY {
            SlotSelector::Any
        } else {
            SlotSelector::Index(index)
        }
    }
}

/// Diagnostic view of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotStatus {
    pub index: u32,
    pub connected: bool,
    pub enabled: bool,
    pub vibration: Vibration,
}
