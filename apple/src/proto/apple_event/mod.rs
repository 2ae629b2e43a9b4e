// SPDX-License-Identifier: MIT OR Apache-2.0

//! Apple Event handler registry and dispatch.
//!
//! Consumers register handlers for classes of keyboard and pointer events.
//! While at least one handler is registered, the driver samples the key map
//! aggregator and the pointer device on recurring timers, turns changes into
//! queries and hands every query to the matching handlers in registration
//! order.
//!
//! Unregistering a handler only marks it. Marked handlers stop firing at
//! once but are removed from the registry by the sweep that runs at the
//! start of the next registration.

mod driver;
mod input;
mod protocol;
mod registry;

pub use driver::{AppleEvent, AppleEventService};
pub use input::PointerSource;
pub use protocol::AppleEventClient;
pub use registry::{EventHandle, HandlerRegistry, NotifyFn};

pub use apple_raw::protocol::apple_event::{
    AppleEventType, AppleKeyEventData, APPLE_EVENT_HANDLE_ALL,
};
pub use apple_raw::Dimension;

use crate::boot::TIMER_PERIOD_MILLISECONDS;
use crate::proto::key_map::{AppleKeyCode, AppleModifierMap};
use apple_raw::protocol::apple_event::{AppleEventData, AppleEventInformation};
use core::ptr;

/// Polling periods and click timing of the Apple Event driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollConfig {
    /// Key strokes timer period, in 100 ns units.
    pub key_poll_period: u64,
    /// Pointer timer period, in 100 ns units.
    pub pointer_poll_period: u64,
    /// Caps lock timer period, in 100 ns units.
    pub caps_lock_poll_period: u64,
    /// Maximum number of pointer ticks between button down and button up
    /// for the pair to count as a click.
    pub click_ticks: u64,
    /// Maximum number of pointer ticks between two clicks for the second one
    /// to count as a double click.
    pub double_click_ticks: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            key_poll_period: 10 * TIMER_PERIOD_MILLISECONDS,
            pointer_poll_period: 2 * TIMER_PERIOD_MILLISECONDS,
            caps_lock_poll_period: 10 * TIMER_PERIOD_MILLISECONDS,
            click_ticks: 50,
            double_click_ticks: 250,
        }
    }
}

/// Event-specific payload of an [`AppleEventQuery`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppleEventQueryData {
    /// A key or modifier changed.
    Key(AppleKeyEventData),
    /// A pointer event. Repeats the query's event type.
    Pointer(AppleEventType),
}

/// One input change, handed to every handler whose event type intersects
/// `event_type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppleEventQuery {
    /// What happened.
    pub event_type: AppleEventType,
    /// Key or pointer details.
    pub data: AppleEventQueryData,
    /// Cursor position when the query was created.
    pub pointer_position: Dimension,
    /// Poll tick at which the query was created.
    pub creation_timestamp: u64,
    /// Modifiers held when the query was created.
    pub modifiers: AppleModifierMap,
}

impl AppleEventQuery {
    pub(crate) fn key(
        event_type: AppleEventType,
        key: AppleKeyCode,
        modifiers: AppleModifierMap,
        pointer_position: Dimension,
        creation_timestamp: u64,
    ) -> Self {
        Self {
            event_type,
            data: AppleEventQueryData::Key(AppleKeyEventData {
                number_of_key_pairs: 1,
                apple_key: key,
                modifiers,
            }),
            pointer_position,
            creation_timestamp,
            modifiers,
        }
    }

    pub(crate) fn pointer(
        event_type: AppleEventType,
        modifiers: AppleModifierMap,
        pointer_position: Dimension,
        creation_timestamp: u64,
    ) -> Self {
        Self {
            event_type,
            data: AppleEventQueryData::Pointer(event_type),
            pointer_position,
            creation_timestamp,
            modifiers,
        }
    }

    /// Builds the firmware representation of this query. For key events
    /// the payload is stored in `key_data`, which must outlive the result.
    pub fn to_raw(&self, key_data: &mut AppleKeyEventData) -> AppleEventInformation {
        let (event_data, number_of_key_pairs) = match self.data {
            AppleEventQueryData::Key(data) => {
                *key_data = data;
                (
                    AppleEventData {
                        key_data: ptr::from_mut(key_data),
                    },
                    data.number_of_key_pairs,
                )
            }
            AppleEventQueryData::Pointer(event_type) => {
                // Keep the bytes past the event type initialized.
                let mut event_data = AppleEventData {
                    raw: ptr::null_mut(),
                };
                event_data.pointer_event_type = event_type;
                (event_data, 0)
            }
        };

        AppleEventInformation {
            event_type: self.event_type,
            event_data,
            number_of_key_pairs,
            pointer_position: self.pointer_position,
            creation_timestamp: self.creation_timestamp,
            modifiers: self.modifiers,
        }
    }
}
