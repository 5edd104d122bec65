//! Wire codec for the remote input server protocol.
//!
//! Every datagram is [`DATAGRAM_SIZE`] bytes in both directions. Byte 0 is the
//! request type. A state reply carries four [`BLOCK_SIZE`]-byte blocks, one
//! per slot, at offset `BLOCK_SIZE * slot`:
//!
//! ```text
//! [0]     request type echo (block 0 only)
//! [1]     connected flag (non-zero = connected)
//! [2]     A B X Y RB LB LS RS bits
//! [3]     Start / Back bits
//! [4]     D-pad octant (0 = centered, 1..8 clockwise from up)
//! [5..9]  LX LY RX RY, unsigned 0-255
//! [9]     left trigger
//! [10]    right trigger
//! ```
//!
//! A poll request carries the rumble bytes `L0 R0 L1 R1 L2 R2 L3 R3` at 1..9.

use crate::device::{
    Gamepad, GamepadState, Vibration, BUTTON_A, BUTTON_B, BUTTON_BACK, BUTTON_DPAD_DOWN,
    BUTTON_DPAD_LEFT, BUTTON_DPAD_RIGHT, BUTTON_DPAD_UP, BUTTON_LEFT_SHOULDER, BUTTON_LEFT_THUMB,
    BUTTON_RIGHT_SHOULDER, BUTTON_RIGHT_THUMB, BUTTON_START, BUTTON_X, BUTTON_Y, MAX_SLOTS,
};

/// Fixed UDP port of the input server.
pub const PEER_PORT: u16 = 7941;

pub const BLOCK_SIZE: usize = 11;
pub const DATAGRAM_SIZE: usize = BLOCK_SIZE * MAX_SLOTS;

pub const REQUEST_CONNECTION: u8 = 1;
pub const REQUEST_STATE: u8 = 2;

pub type Datagram = [u8; DATAGRAM_SIZE];
pub type Block = [u8; BLOCK_SIZE];

// Wire bits in block[2]
const WIRE_A: u8 = 0x01;
const WIRE_B: u8 = 0x02;
const WIRE_X: u8 = 0x04;
const WIRE_Y: u8 = 0x08;
const WIRE_RB: u8 = 0x10;
const WIRE_LB: u8 = 0x20;
const WIRE_LS: u8 = 0x40;
const WIRE_RS: u8 = 0x80;

// Wire bits in block[3]
const WIRE_START: u8 = 0x01;
const WIRE_BACK: u8 = 0x02;

const FACE_BUTTONS: [(u8, u16); 8] = [
    (WIRE_A, BUTTON_A),
    (WIRE_B, BUTTON_B),
    (WIRE_X, BUTTON_X),
    (WIRE_Y, BUTTON_Y),
    (WIRE_LB, BUTTON_LEFT_SHOULDER),
    (WIRE_RB, BUTTON_RIGHT_SHOULDER),
    (WIRE_LS, BUTTON_LEFT_THUMB),
    (WIRE_RS, BUTTON_RIGHT_THUMB),
];

/// What an incoming datagram is, judged by its header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Handshake,
    State,
    Unknown(u8),
}

pub fn classify(datagram: &Datagram) -> Reply {
    match datagram[0] {
        REQUEST_CONNECTION => Reply::Handshake,
        REQUEST_STATE => Reply::State,
        other => Reply::Unknown(other),
    }
}

/// Copy a received payload into a zeroed datagram; short payloads are padded.
pub fn datagram_from(payload: &[u8]) -> Datagram {
    let mut datagram = [0u8; DATAGRAM_SIZE];
    let len = payload.len().min(DATAGRAM_SIZE);
    datagram[..len].copy_from_slice(&payload[..len]);
    datagram
}

pub fn split_blocks(datagram: &Datagram) -> [Block; MAX_SLOTS] {
    std::array::from_fn(|slot| {
        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(&datagram[slot * BLOCK_SIZE..(slot + 1) * BLOCK_SIZE]);
        block
    })
}

pub fn is_connected(block: &Block) -> bool {
    block[1] != 0
}

/// Map an unsigned stick sample onto the signed axis range.
///
/// `-32768 + raw * 65535 / 255`, exact because 65535 = 255 * 257. Note that
/// raw 128 lands on +128, not on 0.
pub fn scale_axis(raw: u8) -> i16 {
    (-32768i32 + i32::from(raw) * 65535 / 255) as i16
}

/// D-pad bits for an octant code; diagonals set two bits, unknown codes none.
pub fn dpad_buttons(octant: u8) -> u16 {
    match octant {
        1 => BUTTON_DPAD_UP,
        2 => BUTTON_DPAD_UP | BUTTON_DPAD_RIGHT,
        3 => BUTTON_DPAD_RIGHT,
        4 => BUTTON_DPAD_RIGHT | BUTTON_DPAD_DOWN,
        5 => BUTTON_DPAD_DOWN,
        6 => BUTTON_DPAD_DOWN | BUTTON_DPAD_LEFT,
        7 => BUTTON_DPAD_LEFT,
        8 => BUTTON_DPAD_LEFT | BUTTON_DPAD_UP,
        _ => 0,
    }
}

pub fn decode_gamepad(block: &Block) -> Gamepad {
    let mut buttons = FACE_BUTTONS
        .iter()
        .filter(|(wire, _)| block[2] & wire != 0)
        .fold(0u16, |acc, (_, bit)| acc | bit);

    if block[3] & WIRE_BACK != 0 {
        buttons |= BUTTON_BACK;
    }
    if block[3] & WIRE_START != 0 {
        buttons |= BUTTON_START;
    }
    buttons |= dpad_buttons(block[4]);

    Gamepad {
        buttons,
        left_trigger: block[9],
        right_trigger: block[10],
        thumb_lx: scale_axis(block[5]),
        thumb_ly: scale_axis(block[6]),
        thumb_rx: scale_axis(block[7]),
        thumb_ry: scale_axis(block[8]),
    }
}

/// Decode a block into `state`, bumping the packet counter exactly once.
pub fn decode_into(block: &Block, state: &mut GamepadState) {
    state.gamepad = decode_gamepad(block);
    state.packet_number = state.packet_number.wrapping_add(1);
}

/// 16-bit motor speed to the 8-bit wire intensity (truncating).
pub fn encode_motor(speed: u16) -> u8 {
    (speed / 257) as u8
}

pub fn probe_datagram() -> Datagram {
    let mut datagram = [0u8; DATAGRAM_SIZE];
    datagram[0] = REQUEST_CONNECTION;
    datagram
}

pub fn poll_datagram(vibrations: &[Vibration; MAX_SLOTS]) -> Datagram {
    let mut datagram = [0u8; DATAGRAM_SIZE];
    datagram[0] = REQUEST_STATE;
    for (slot, vibration) in vibrations.iter().enumerate() {
        datagram[1 + slot * 2] = encode_motor(vibration.left_motor);
        datagram[2 + slot * 2] = encode_motor(vibration.right_motor);
    }
    datagram
}
