// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pointer device access.

use crate::proto::apple_event::PointerSource;
use crate::{unsafe_protocol, Result, Status, StatusExt};
use apple_raw::protocol::console::{SimplePointerMode, SimplePointerProtocol, SimplePointerState};

/// Provides information about a pointer device.
#[derive(Debug)]
#[repr(transparent)]
pub struct Pointer(SimplePointerProtocol);

unsafe_protocol!(Pointer, SimplePointerProtocol::GUID);

impl Pointer {
    /// Resets the pointer device hardware.
    ///
    /// The `extended_verification` parameter is used to request that UEFI
    /// performs an extended check and reset of the input device.
    ///
    /// # Errors
    ///
    /// - `DeviceError` if the device is malfunctioning and cannot be reset.
    pub fn reset(&mut self, extended_verification: bool) -> Result {
        unsafe { (self.0.reset)(&mut self.0, extended_verification.into()) }.to_result()
    }

    /// Retrieves the pointer device's current state, if a state change occurred
    /// since the last time this function was called.
    ///
    /// # Errors
    /// - `DeviceError` if there was an issue with the pointer device.
    pub fn read_state(&mut self) -> Result<Option<PointerState>> {
        let mut pointer_state = SimplePointerState::default();

        match unsafe { (self.0.get_state)(&mut self.0, &mut pointer_state) } {
            Status::NOT_READY => Ok(None),
            other => other.to_result_with_val(|| Some(pointer_state.into())),
        }
    }

    /// Returns a reference to the pointer device information.
    #[must_use]
    pub fn mode(&self) -> PointerMode {
        // SAFETY: firmware keeps the mode valid for the lifetime of the
        // protocol.
        unsafe { self.0.mode.as_ref() }
            .copied()
            .map(PointerMode::from)
            .unwrap_or_default()
    }
}

impl PointerSource for Pointer {
    fn read_state(&mut self) -> Result<Option<PointerState>> {
        Self::read_state(self)
    }
}

/// Information about this pointer device.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct PointerMode {
    /// The pointer device's resolution on the X/Y/Z axis in counts/mm.
    /// If a value is 0, then the device does _not_ support that axis.
    pub resolution: [u64; 3],
    /// Whether the devices has a left button / right button.
    pub has_button: [bool; 2],
}

impl From<SimplePointerMode> for PointerMode {
    fn from(mode: SimplePointerMode) -> Self {
        Self {
            resolution: [mode.resolution_x, mode.resolution_y, mode.resolution_z],
            has_button: [mode.left_button.into(), mode.right_button.into()],
        }
    }
}

/// The relative change in the pointer's state.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct PointerState {
    /// The relative movement on the X/Y/Z axis.
    ///
    /// If `PointerMode` indicates an axis is not supported, it must be ignored.
    pub relative_movement: [i32; 3],
    /// Whether the left / right mouse button is currently pressed.
    ///
    /// If `PointerMode` indicates a button is not supported, it must be ignored.
    pub button: [bool; 2],
}

impl From<SimplePointerState> for PointerState {
    fn from(state: SimplePointerState) -> Self {
        Self {
            relative_movement: [
                state.relative_movement_x,
                state.relative_movement_y,
                state.relative_movement_z,
            ],
            button: [state.left_button.into(), state.right_button.into()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apple_raw::Boolean;

    #[test]
    fn test_state_from_raw() {
        let raw = SimplePointerState {
            relative_movement_x: -3,
            relative_movement_y: 7,
            relative_movement_z: 0,
            left_button: Boolean::TRUE,
            right_button: Boolean::FALSE,
        };
        assert_eq!(
            PointerState::from(raw),
            PointerState {
                relative_movement: [-3, 7, 0],
                button: [true, false],
            }
        );
    }
}
