// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turning sampled input into event queries.

use super::{AppleEventQuery, AppleEventType, Dimension, PollConfig};
use crate::proto::console::pointer::PointerState;
use crate::proto::key_map::{AppleModifierMap, KeyStrokes, APPLE_KEY_CAPS_LOCK};
use crate::Result;
use alloc::vec::Vec;

/// Source of pointer samples, read by the Apple Event driver.
pub trait PointerSource {
    /// Returns the movement and buttons since the previous call, or `None`
    /// if nothing changed.
    ///
    /// # Errors
    ///
    /// Any error reported by the pointer device.
    fn read_state(&mut self) -> Result<Option<PointerState>>;
}

/// Key strokes seen at the previous keyboard tick.
#[derive(Debug, Default)]
pub(crate) struct KeyboardTracker {
    held: KeyStrokes,
}

impl KeyboardTracker {
    pub(crate) const fn modifiers(&self) -> AppleModifierMap {
        self.held.modifiers
    }

    /// Compares `now` with the previous sample and returns the resulting
    /// queries: modifier changes first, then released keys, then newly
    /// pressed keys.
    pub(crate) fn update(
        &mut self,
        now: KeyStrokes,
        position: Dimension,
        timestamp: u64,
    ) -> Vec<AppleEventQuery> {
        let mut queries = Vec::new();
        let before = self.held.modifiers;
        let after = now.modifiers;

        if after.difference(before) != AppleModifierMap::empty() {
            queries.push(AppleEventQuery::key(
                AppleEventType::MODIFIER_DOWN,
                0,
                after,
                position,
                timestamp,
            ));
        }
        if before.difference(after) != AppleModifierMap::empty() {
            queries.push(AppleEventQuery::key(
                AppleEventType::MODIFIER_UP,
                0,
                after,
                position,
                timestamp,
            ));
        }

        for &key in self.held.keys.iter().filter(|&&key| !now.contains(key)) {
            queries.push(AppleEventQuery::key(
                AppleEventType::KEY_UP,
                key,
                after,
                position,
                timestamp,
            ));
        }
        for &key in now.keys.iter().filter(|&&key| !self.held.contains(key)) {
            queries.push(AppleEventQuery::key(
                AppleEventType::KEY_DOWN,
                key,
                after,
                position,
                timestamp,
            ));
        }

        self.held = now;
        queries
    }
}

/// Caps lock state, toggled on every press of the caps lock key.
#[derive(Debug, Default)]
pub(crate) struct CapsLockTracker {
    pressed: bool,
    active: bool,
}

impl CapsLockTracker {
    pub(crate) const fn is_active(&self) -> bool {
        self.active
    }

    /// Returns true if the caps lock state changed.
    pub(crate) fn update(&mut self, now: &KeyStrokes) -> bool {
        let pressed = now.contains(APPLE_KEY_CAPS_LOCK);
        let toggled = pressed && !self.pressed;
        if toggled {
            self.active = !self.active;
        }
        self.pressed = pressed;
        toggled
    }
}

const BUTTONS: [AppleEventType; 2] = [AppleEventType::LEFT_BUTTON, AppleEventType::RIGHT_BUTTON];

/// Cursor position and button timing.
#[derive(Debug)]
pub(crate) struct PointerTracker {
    position: Dimension,
    resolution: Option<Dimension>,
    ticks: u64,
    pressed: [bool; 2],
    pressed_at: [u64; 2],
    clicked_at: [Option<u64>; 2],
}

impl Default for PointerTracker {
    fn default() -> Self {
        Self {
            position: Dimension::default(),
            resolution: None,
            ticks: 0,
            pressed: [false; 2],
            pressed_at: [0; 2],
            clicked_at: [None; 2],
        }
    }
}

impl PointerTracker {
    pub(crate) const fn position(&self) -> Dimension {
        self.position
    }

    /// Moves the cursor, keeping it on screen.
    pub(crate) fn set_position(&mut self, position: Dimension) {
        self.position = self.clamp(position);
    }

    /// Sets the screen size the cursor is confined to.
    pub(crate) fn set_resolution(&mut self, resolution: Dimension) {
        self.resolution = Some(resolution);
        self.position = self.clamp(self.position);
    }

    fn clamp(&self, position: Dimension) -> Dimension {
        let clamp_axis = |value: i32, limit: Option<i32>| {
            let value = value.max(0);
            match limit {
                Some(limit) => value.min(limit.saturating_sub(1).max(0)),
                None => value,
            }
        };
        Dimension::new(
            clamp_axis(position.horizontal, self.resolution.map(|r| r.horizontal)),
            clamp_axis(position.vertical, self.resolution.map(|r| r.vertical)),
        )
    }

    /// Counts one pointer tick and turns `state` into queries.
    pub(crate) fn update(
        &mut self,
        state: Option<PointerState>,
        config: &PollConfig,
        modifiers: AppleModifierMap,
        timestamp: u64,
    ) -> Vec<AppleEventQuery> {
        self.ticks += 1;
        let mut queries = Vec::new();
        let Some(state) = state else {
            return queries;
        };

        let [dx, dy, _] = state.relative_movement;
        if dx != 0 || dy != 0 {
            self.set_position(Dimension::new(
                self.position.horizontal.saturating_add(dx),
                self.position.vertical.saturating_add(dy),
            ));
            queries.push(AppleEventQuery::pointer(
                AppleEventType::MOUSE_MOVED,
                modifiers,
                self.position,
                timestamp,
            ));
        }

        for (button, &button_type) in BUTTONS.iter().enumerate() {
            let pressed = state.button[button];
            if pressed == self.pressed[button] {
                continue;
            }
            self.pressed[button] = pressed;

            let mut event = |event_type: AppleEventType| {
                queries.push(AppleEventQuery::pointer(
                    event_type | button_type,
                    modifiers,
                    self.position,
                    timestamp,
                ));
            };

            if pressed {
                self.pressed_at[button] = self.ticks;
                event(AppleEventType::MOUSE_DOWN);
                continue;
            }

            event(AppleEventType::MOUSE_UP);
            if self.ticks - self.pressed_at[button] > config.click_ticks {
                self.clicked_at[button] = None;
                continue;
            }

            match self.clicked_at[button] {
                Some(at) if self.ticks - at <= config.double_click_ticks => {
                    event(AppleEventType::MOUSE_DOUBLE_CLICK);
                    self.clicked_at[button] = None;
                }
                _ => {
                    event(AppleEventType::MOUSE_CLICK);
                    self.clicked_at[button] = Some(self.ticks);
                }
            }
        }

        queries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::key_map::apple_keyboard_key;
    use alloc::vec;

    const KEY_A: u16 = apple_keyboard_key(0x04);
    const KEY_B: u16 = apple_keyboard_key(0x05);

    fn strokes(modifiers: AppleModifierMap, keys: &[u16]) -> KeyStrokes {
        KeyStrokes {
            modifiers,
            keys: keys.to_vec(),
        }
    }

    fn event_types(queries: &[AppleEventQuery]) -> Vec<AppleEventType> {
        queries.iter().map(|query| query.event_type).collect()
    }

    fn moved(dx: i32, dy: i32) -> Option<PointerState> {
        Some(PointerState {
            relative_movement: [dx, dy, 0],
            button: [false, false],
        })
    }

    fn buttons(left: bool, right: bool) -> Option<PointerState> {
        Some(PointerState {
            relative_movement: [0, 0, 0],
            button: [left, right],
        })
    }

    #[test]
    fn test_key_transitions() {
        let mut keyboard = KeyboardTracker::default();
        let origin = Dimension::default();

        let queries = keyboard.update(strokes(AppleModifierMap::LEFT_SHIFT, &[KEY_A]), origin, 1);
        assert_eq!(
            event_types(&queries),
            vec![AppleEventType::MODIFIER_DOWN, AppleEventType::KEY_DOWN]
        );

        let queries = keyboard.update(strokes(AppleModifierMap::LEFT_SHIFT, &[KEY_A]), origin, 2);
        assert!(queries.is_empty());

        let queries = keyboard.update(strokes(AppleModifierMap::empty(), &[KEY_B]), origin, 3);
        assert_eq!(
            event_types(&queries),
            vec![
                AppleEventType::MODIFIER_UP,
                AppleEventType::KEY_UP,
                AppleEventType::KEY_DOWN
            ]
        );
        assert_eq!(queries[2].creation_timestamp, 3);
        assert_eq!(keyboard.modifiers(), AppleModifierMap::empty());
    }

    #[test]
    fn test_caps_lock_toggles_on_press() {
        let mut caps_lock = CapsLockTracker::default();
        let down = strokes(AppleModifierMap::empty(), &[APPLE_KEY_CAPS_LOCK]);
        let up = strokes(AppleModifierMap::empty(), &[]);

        assert!(caps_lock.update(&down));
        assert!(caps_lock.is_active());
        assert!(!caps_lock.update(&down));
        assert!(!caps_lock.update(&up));
        assert!(caps_lock.is_active());
        assert!(caps_lock.update(&down));
        assert!(!caps_lock.is_active());
    }

    #[test]
    fn test_cursor_clamped() {
        let mut pointer = PointerTracker::default();
        let config = PollConfig::default();
        let none = AppleModifierMap::empty();

        pointer.update(moved(-5, 12), &config, none, 0);
        assert_eq!(pointer.position(), Dimension::new(0, 12));

        pointer.set_resolution(Dimension::new(800, 10));
        assert_eq!(pointer.position(), Dimension::new(0, 9));

        let queries = pointer.update(moved(1000, 0), &config, none, 0);
        assert_eq!(event_types(&queries), vec![AppleEventType::MOUSE_MOVED]);
        assert_eq!(queries[0].pointer_position, Dimension::new(799, 9));
    }

    #[test]
    fn test_degenerate_resolution_pins_cursor_to_origin() {
        let mut pointer = PointerTracker::default();
        pointer.set_position(Dimension::new(40, 30));

        pointer.set_resolution(Dimension::new(i32::MIN, 0));
        assert_eq!(pointer.position(), Dimension::new(0, 0));

        pointer.set_position(Dimension::new(i32::MAX, i32::MAX));
        assert_eq!(pointer.position(), Dimension::new(0, 0));
    }

    #[test]
    fn test_click_and_double_click() {
        let mut pointer = PointerTracker::default();
        let config = PollConfig::default();
        let none = AppleModifierMap::empty();
        let left = |event_type: AppleEventType| event_type | AppleEventType::LEFT_BUTTON;

        let queries = pointer.update(buttons(true, false), &config, none, 0);
        assert_eq!(event_types(&queries), vec![left(AppleEventType::MOUSE_DOWN)]);

        let queries = pointer.update(buttons(false, false), &config, none, 0);
        assert_eq!(
            event_types(&queries),
            vec![left(AppleEventType::MOUSE_UP), left(AppleEventType::MOUSE_CLICK)]
        );

        pointer.update(buttons(true, false), &config, none, 0);
        let queries = pointer.update(buttons(false, false), &config, none, 0);
        assert_eq!(
            event_types(&queries),
            vec![
                left(AppleEventType::MOUSE_UP),
                left(AppleEventType::MOUSE_DOUBLE_CLICK)
            ]
        );
    }

    #[test]
    fn test_long_press_is_not_a_click() {
        let mut pointer = PointerTracker::default();
        let config = PollConfig {
            click_ticks: 2,
            ..PollConfig::default()
        };
        let none = AppleModifierMap::empty();

        pointer.update(buttons(false, true), &config, none, 0);
        for _ in 0..3 {
            assert!(pointer.update(None, &config, none, 0).is_empty());
        }
        let queries = pointer.update(buttons(false, false), &config, none, 0);
        assert_eq!(
            event_types(&queries),
            vec![AppleEventType::MOUSE_UP | AppleEventType::RIGHT_BUTTON]
        );
    }
}
