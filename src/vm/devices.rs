//! Device dispatch for the `snd` instruction.
//!
//! A device is addressed by an integer id and handles
//! `(id, command, argument) -> result` synchronously. The registry is
//! owned by the host and lent to the VM as its device-access callback;
//! accesses to unregistered ids return 0.

use std::collections::HashMap;

use crate::Word;

/// Conventional device id assignments.
pub mod device_ids {
    use crate::Word;

    pub const CONSOLE: Word = 0;
    pub const TIMER: Word = 1;
    pub const INPUT: Word = 2;
    pub const STORAGE: Word = 3;
}

/// A synchronous device handler.
pub trait Device {
    /// Handle one command; the return value lands in the sending
    /// program's argument register.
    fn handle_command(&mut self, device_id: Word, command: Word, argument: Word) -> Word;

    /// Device name for diagnostics.
    fn name(&self) -> &str;

    /// Reset to initial state.
    fn reset(&mut self) {}
}

/// Text console (device id 0).
///
/// Commands: 0 = append low byte of the argument to the output buffer
/// (returns 1), 2 = clear the buffer (returns 1). Command 1 (write a
/// whole string) is reserved and returns 0, as does every unknown
/// command.
#[derive(Debug, Default)]
pub struct ConsoleDevice {
    output: String,
}

impl ConsoleDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulated output text.
    pub fn output(&self) -> &str {
        &self.output
    }
}

impl Device for ConsoleDevice {
    fn handle_command(&mut self, _device_id: Word, command: Word, argument: Word) -> Word {
        match command {
            0 => {
                self.output.push((argument & 0xFF) as u8 as char);
                1
            }
            1 => 0, // puts: not implemented
            2 => {
                self.output.clear();
                1
            }
            _ => 0,
        }
    }

    fn name(&self) -> &str {
        "console"
    }

    fn reset(&mut self) {
        self.output.clear();
    }
}

/// A device that ignores every command.
#[derive(Debug, Default)]
pub struct NullDevice;

impl Device for NullDevice {
    fn handle_command(&mut self, _device_id: Word, _command: Word, _argument: Word) -> Word {
        0
    }

    fn name(&self) -> &str {
        "null"
    }
}

/// Host-owned table of devices by id.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: HashMap<Word, Box<dyn Device>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a device under an id.
    pub fn register_device(&mut self, device_id: Word, device: Box<dyn Device>) {
        log::debug!("registered device {} as id {}", device.name(), device_id);
        self.devices.insert(device_id, device);
    }

    /// Dispatch one access. Unknown device ids return 0.
    pub fn access(&mut self, device_id: Word, command: Word, argument: Word) -> Word {
        match self.devices.get_mut(&device_id) {
            Some(device) => device.handle_command(device_id, command, argument),
            None => {
                log::warn!("access to unregistered device id {}", device_id);
                0
            }
        }
    }

    pub fn has_device(&self, device_id: Word) -> bool {
        self.devices.contains_key(&device_id)
    }

    /// Borrow a device for inspection (tests, debugging).
    pub fn device_mut<'a>(&'a mut self, device_id: Word) -> Option<&'a mut (dyn Device + 'a)> {
        match self.devices.get_mut(&device_id) {
            Some(d) => Some(&mut **d),
            None => None,
        }
    }

    /// Reset every registered device.
    pub fn reset_all(&mut self) {
        for device in self.devices.values_mut() {
            device.reset();
        }
    }

    /// Drop all devices.
    pub fn clear(&mut self) {
        self.devices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_putchar_and_clear() {
        let mut console = ConsoleDevice::new();
        assert_eq!(console.handle_command(0, 0, b'h' as Word), 1);
        assert_eq!(console.handle_command(0, 0, b'i' as Word), 1);
        assert_eq!(console.output(), "hi");

        // only the low byte is appended
        assert_eq!(console.handle_command(0, 0, 0x1234_0021), 1);
        assert_eq!(console.output(), "hi!");

        assert_eq!(console.handle_command(0, 2, 0), 1);
        assert_eq!(console.output(), "");
    }

    #[test]
    fn test_console_unknown_commands() {
        let mut console = ConsoleDevice::new();
        assert_eq!(console.handle_command(0, 1, 0), 0);
        assert_eq!(console.handle_command(0, 99, 0), 0);
        assert_eq!(console.output(), "");
    }

    #[test]
    fn test_registry_dispatch() {
        let mut registry = DeviceRegistry::new();
        registry.register_device(device_ids::CONSOLE, Box::new(ConsoleDevice::new()));

        assert!(registry.has_device(0));
        assert!(!registry.has_device(7));
        assert_eq!(registry.access(0, 0, b'x' as Word), 1);
        assert_eq!(registry.access(7, 0, 0), 0); // unknown id
    }

    #[test]
    fn test_registry_reset_all() {
        let mut registry = DeviceRegistry::new();
        registry.register_device(0, Box::new(ConsoleDevice::new()));
        registry.access(0, 0, b'a' as Word);
        registry.reset_all();
        // the console buffer was cleared by reset
        assert_eq!(registry.access(0, 0, b'b' as Word), 1);
    }

    #[test]
    fn test_null_device() {
        let mut null = NullDevice;
        assert_eq!(null.handle_command(3, 0, 42), 0);
        assert_eq!(null.name(), "null");
    }
}
