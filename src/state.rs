use crate::codec::{self, Block};
use crate::device::{Capabilities, Gamepad, GamepadState, SlotStatus, Vibration, MAX_SLOTS};
use crate::error::{NetPadError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// One controller identity. Everything lives behind the slot's own lock.
#[derive(Debug, Default)]
pub struct ControllerSlot {
    pub connected: bool,
    pub enabled: bool,
    pub capabilities: Capabilities,
    pub state: GamepadState,
    /// Gamepad values as of the last reported keystroke
    pub last_keystroke: Gamepad,
    pub vibration: Vibration,
}

impl ControllerSlot {
    fn connect(&mut self) {
        self.state = GamepadState::default();
        self.capabilities = Capabilities::remote_gamepad();
        self.connected = true;
        self.enabled = true;
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.enabled = false;
        self.capabilities = Capabilities::default();
    }
}

/// What applying a block did to a slot, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotChange {
    Connected,
    Updated,
    Disconnected,
    Idle,
}

/// The four controller slots plus the process-wide readiness flag.
///
/// The transport worker is the only writer of connection, capabilities and
/// gamepad state; callers write vibration and the enabled flag.
pub struct Registry {
    slots: [Mutex<ControllerSlot>; MAX_SLOTS],
    ready: AtomicBool,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Mutex::new(ControllerSlot::default())),
            ready: AtomicBool::new(false),
        }
    }

    /// Validate a caller-supplied index.
    pub fn check_index(index: u32) -> Result<usize> {
        let slot = index as usize;
        if slot < MAX_SLOTS {
            Ok(slot)
        } else {
            Err(NetPadError::InvalidSlot(index))
        }
    }

    /// Lock one slot. A poisoned lock still holds consistent plain data, so
    /// it is recovered rather than propagated.
    pub fn lock_slot(&self, slot: usize) -> MutexGuard<'_, ControllerSlot> {
        self.slots[slot]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Apply one slot's block from a state reply under a single lock hold.
    pub fn apply_block(&self, slot: usize, block: &Block) -> SlotChange {
        let mut controller = self.lock_slot(slot);
        if codec::is_connected(block) {
            let change = if controller.connected {
                SlotChange::Updated
            } else {
                controller.connect();
                SlotChange::Connected
            };
            codec::decode_into(block, &mut controller.state);
            change
        } else if controller.connected {
            controller.disconnect();
            SlotChange::Disconnected
        } else {
            SlotChange::Idle
        }
    }

    /// Force every connected slot to disconnected. Returns how many were.
    pub fn disconnect_all(&self) -> usize {
        let mut count = 0;
        for slot in 0..MAX_SLOTS {
            let mut controller = self.lock_slot(slot);
            if controller.connected {
                controller.disconnect();
                count += 1;
            }
        }
        count
    }

    /// Current vibration command of every slot, read under each slot's lock.
    pub fn vibrations(&self) -> [Vibration; MAX_SLOTS] {
        std::array::from_fn(|slot| self.lock_slot(slot).vibration)
    }

    pub fn set_vibration(&self, slot: usize, vibration: Vibration) {
        self.lock_slot(slot).vibration = vibration;
    }

    pub fn set_enabled_all(&self, enabled: bool) {
        for slot in 0..MAX_SLOTS {
            self.lock_slot(slot).enabled = enabled;
        }
    }

    pub fn status(&self, slot: usize) -> SlotStatus {
        let controller = self.lock_slot(slot);
        SlotStatus {
            index: slot as u32,
            connected: controller.connected,
            enabled: controller.enabled,
            vibration: controller.vibration,
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BLOCK_SIZE;
    use crate::device::BUTTON_A;

    fn connected_block(buttons: u8) -> Block {
        let mut block = [0u8; BLOCK_SIZE];
        block[1] = 1;
        block[2] = buttons;
        block
    }

    #[test]
    fn test_check_index() {
        assert_eq!(Registry::check_index(3).unwrap(), 3);
        assert!(matches!(
            Registry::check_index(4),
            Err(NetPadError::InvalidSlot(4))
        ));
    }

    #[test]
    fn test_connect_populates_and_decodes() {
        let registry = Registry::new();
        assert_eq!(registry.apply_block(1, &connected_block(0x01)), SlotChange::Connected);

        let slot = registry.lock_slot(1);
        assert!(slot.connected);
        assert!(slot.enabled);
        assert_eq!(slot.capabilities, Capabilities::remote_gamepad());
        assert_eq!(slot.state.packet_number, 1);
        assert_eq!(slot.state.gamepad.buttons, BUTTON_A);
    }

    #[test]
    fn test_repeated_block_only_bumps_packet_number() {
        let registry = Registry::new();
        let block = connected_block(0x01);
        registry.apply_block(0, &block);
        let before = {
            let slot = registry.lock_slot(0);
            (slot.capabilities, slot.state)
        };

        assert_eq!(registry.apply_block(0, &block), SlotChange::Updated);
        assert_eq!(registry.apply_block(0, &block), SlotChange::Updated);

        let slot = registry.lock_slot(0);
        assert_eq!(slot.capabilities, before.0);
        assert_eq!(slot.state.gamepad, before.1.gamepad);
        assert_eq!(slot.state.packet_number, before.1.packet_number + 2);
    }

    #[test]
    fn test_reconnect_resets_packet_number() {
        let registry = Registry::new();
        registry.apply_block(0, &connected_block(0));
        registry.apply_block(0, &connected_block(0));
        assert_eq!(registry.apply_block(0, &[0u8; BLOCK_SIZE]), SlotChange::Disconnected);
        assert_eq!(registry.apply_block(0, &[0u8; BLOCK_SIZE]), SlotChange::Idle);
        {
            let slot = registry.lock_slot(0);
            assert!(!slot.connected);
            assert!(!slot.enabled);
            assert_eq!(slot.capabilities, Capabilities::default());
        }
        registry.apply_block(0, &connected_block(0));
        assert_eq!(registry.lock_slot(0).state.packet_number, 1);
    }

    #[test]
    fn test_disconnect_all() {
        let registry = Registry::new();
        registry.apply_block(0, &connected_block(0));
        registry.apply_block(2, &connected_block(0));
        assert_eq!(registry.disconnect_all(), 2);
        assert_eq!(registry.disconnect_all(), 0);
        assert!(!registry.status(2).connected);
    }

    #[test]
    fn test_vibration_and_enable() {
        let registry = Registry::new();
        let vibration = Vibration {
            left_motor: 1,
            right_motor: 2,
        };
        registry.set_vibration(3, vibration);
        registry.set_enabled_all(true);
        assert_eq!(registry.vibrations()[3], vibration);
        assert!(registry.status(0).enabled);
        registry.set_enabled_all(false);
        assert!(!registry.status(3).enabled);
    }
}
