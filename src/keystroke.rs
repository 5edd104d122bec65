//! Keystroke edge detection.
//!
//! Compares a slot's current [`Gamepad`] against the snapshot taken at the
//! last reported transition and yields at most one [`Keystroke`] per call.
//! Callers drain pending transitions by calling repeatedly until `None`.

use crate::device::{
    Gamepad, KeyAction, Keystroke, BUTTON_A, BUTTON_B, BUTTON_BACK, BUTTON_DPAD_DOWN,
    BUTTON_DPAD_LEFT, BUTTON_DPAD_RIGHT, BUTTON_DPAD_UP, BUTTON_LEFT_SHOULDER, BUTTON_LEFT_THUMB,
    BUTTON_RIGHT_SHOULDER, BUTTON_RIGHT_THUMB, BUTTON_START, BUTTON_X, BUTTON_Y, VK_PAD_A,
    VK_PAD_B, VK_PAD_BACK, VK_PAD_DPAD_DOWN, VK_PAD_DPAD_LEFT, VK_PAD_DPAD_RIGHT, VK_PAD_DPAD_UP,
    VK_PAD_LSHOULDER, VK_PAD_LTHUMB_PRESS, VK_PAD_LTHUMB_UP, VK_PAD_LTRIGGER, VK_PAD_RSHOULDER,
    VK_PAD_RTHUMB_PRESS, VK_PAD_RTHUMB_UP, VK_PAD_RTRIGGER, VK_PAD_START, VK_PAD_X, VK_PAD_Y,
};

/// Buttons in the order their transitions are reported. The guide button
/// never produces a keystroke.
const BUTTON_KEYS: [(u16, u16); 14] = [
    (BUTTON_DPAD_UP, VK_PAD_DPAD_UP),
    (BUTTON_DPAD_DOWN, VK_PAD_DPAD_DOWN),
    (BUTTON_DPAD_LEFT, VK_PAD_DPAD_LEFT),
    (BUTTON_DPAD_RIGHT, VK_PAD_DPAD_RIGHT),
    (BUTTON_START, VK_PAD_START),
    (BUTTON_BACK, VK_PAD_BACK),
    (BUTTON_LEFT_THUMB, VK_PAD_LTHUMB_PRESS),
    (BUTTON_RIGHT_THUMB, VK_PAD_RTHUMB_PRESS),
    (BUTTON_LEFT_SHOULDER, VK_PAD_LSHOULDER),
    (BUTTON_RIGHT_SHOULDER, VK_PAD_RSHOULDER),
    (BUTTON_A, VK_PAD_A),
    (BUTTON_B, VK_PAD_B),
    (BUTTON_X, VK_PAD_X),
    (BUTTON_Y, VK_PAD_Y),
];

const TRIGGER_THRESHOLD: u8 = 30;
const STICK_THRESHOLD: i16 = 20000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Zone {
    Off,
    Low,
    High,
}

fn zone(value: i16) -> Zone {
    if value > STICK_THRESHOLD {
        Zone::High
    } else if value < -STICK_THRESHOLD {
        Zone::Low
    } else {
        Zone::Off
    }
}

fn trigger_is_on(value: u8) -> bool {
    value > TRIGGER_THRESHOLD
}

/// Virtual key for a stick position, `None` when centered.
fn stick_key(x: i16, y: i16, base_vk: u16) -> Option<u16> {
    let offset = match (zone(x), zone(y)) {
        (Zone::Off, Zone::Off) => return None,
        (Zone::Low, Zone::Off) => 3,
        (_, Zone::Off) => 2,
        (Zone::Off, Zone::High) => 0,
        (Zone::Low, Zone::High) => 4,
        (Zone::High, Zone::High) => 5,
        (Zone::Off, Zone::Low) => 1,
        (Zone::Low, Zone::Low) => 7,
        (Zone::High, Zone::Low) => 6,
    };
    Some(base_vk + offset)
}

/// A stick leaving one direction reports the key-up first and parks the
/// snapshot at center, so the key-down for the new direction follows on the
/// next call.
fn check_stick(
    user_index: u8,
    cur: (i16, i16),
    last: (&mut i16, &mut i16),
    base_vk: u16,
) -> Option<Keystroke> {
    let (last_x, last_y) = last;
    let cur_vk = stick_key(cur.0, cur.1, base_vk);
    let last_vk = stick_key(*last_x, *last_y, base_vk);

    if cur_vk == last_vk {
        *last_x = cur.0;
        *last_y = cur.1;
        return None;
    }

    if let Some(vk) = last_vk {
        *last_x = 0;
        *last_y = 0;
        return Some(Keystroke::new(vk, KeyAction::Up, user_index));
    }

    *last_x = cur.0;
    *last_y = cur.1;
    cur_vk.map(|vk| Keystroke::new(vk, KeyAction::Down, user_index))
}

/// Report the highest-priority transition between `cur` and `last`, updating
/// only the part of `last` that the reported transition covers.
pub fn next_keystroke(user_index: u8, cur: &Gamepad, last: &mut Gamepad) -> Option<Keystroke> {
    for &(mask, vk) in BUTTON_KEYS.iter() {
        if (cur.buttons ^ last.buttons) & mask == 0 {
            continue;
        }
        let action = if cur.buttons & mask != 0 {
            last.buttons |= mask;
            KeyAction::Down
        } else {
            last.buttons &= !mask;
            KeyAction::Up
        };
        return Some(Keystroke::new(vk, action, user_index));
    }

    let triggers = [
        (cur.left_trigger, &mut last.left_trigger, VK_PAD_LTRIGGER),
        (cur.right_trigger, &mut last.right_trigger, VK_PAD_RTRIGGER),
    ];
    for (value, snapshot, vk) in triggers {
        let on = trigger_is_on(value);
        if on != trigger_is_on(*snapshot) {
            *snapshot = value;
            let action = if on { KeyAction::Down } else { KeyAction::Up };
            return Some(Keystroke::new(vk, action, user_index));
        }
    }

    check_stick(
        user_index,
        (cur.thumb_lx, cur.thumb_ly),
        (&mut last.thumb_lx, &mut last.thumb_ly),
        VK_PAD_LTHUMB_UP,
    )
    .or_else(|| {
        check_stick(
            user_index,
            (cur.thumb_rx, cur.thumb_ry),
            (&mut last.thumb_rx, &mut last.thumb_ry),
            VK_PAD_RTHUMB_UP,
        )
    })
}
