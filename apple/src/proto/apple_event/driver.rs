// SPDX-License-Identifier: MIT OR Apache-2.0

use super::input::{CapsLockTracker, KeyboardTracker, PointerSource, PointerTracker};
use super::registry::{EventHandle, HandlerRegistry, NotifyFn};
use super::{AppleEventQuery, AppleEventType, Dimension, PollConfig};
use crate::boot::{PollSource, TimerService};
use crate::proto::key_map::KeyStrokeSource;
use crate::{Result, Status};
use core::cell::{Cell, Ref, RefCell};
use core::fmt::{self, Debug, Formatter};
use log::{debug, warn};

/// The operations published through the Apple Event protocol.
pub trait AppleEventService {
    /// Registers `notify` for queries intersecting `event_type`.
    ///
    /// # Errors
    ///
    /// * `Status::INVALID_PARAMETER` `event_type` is empty.
    /// * `Status::OUT_OF_RESOURCES` The handler could not be allocated.
    /// * Any error reported while creating the poll timers for the first
    ///   handler. No handler is registered then.
    fn register_handler(
        &self,
        event_type: AppleEventType,
        notify: NotifyFn,
    ) -> Result<EventHandle>;

    /// Stops notifying `handle`.
    ///
    /// # Errors
    ///
    /// * `Status::NOT_FOUND` `handle` is not registered.
    fn unregister_handler(&self, handle: EventHandle) -> Result;

    /// Stops notifying every registered handler.
    ///
    /// # Errors
    ///
    /// * `Status::NOT_FOUND` No handler was registered.
    fn unregister_all_handlers(&self) -> Result;

    /// Moves the cursor. The position is kept on screen.
    ///
    /// # Errors
    ///
    /// * `Status::ACCESS_DENIED` Called from within a poll routine.
    fn set_cursor_position(&self, position: Dimension) -> Result;

    /// Replaces the name of `handle`.
    ///
    /// # Errors
    ///
    /// * `Status::NOT_FOUND` `handle` is not registered.
    /// * `Status::OUT_OF_RESOURCES` The name could not be allocated.
    fn set_event_name(&self, handle: EventHandle, name: &str) -> Result;

    /// Returns true if caps lock is engaged.
    fn is_caps_lock_active(&self) -> bool;
}

struct RunningTimers<Timer> {
    key_strokes: Timer,
    pointer: Timer,
    caps_lock: Timer,
}

struct PollTimers<T: TimerService> {
    service: T,
    running: Option<RunningTimers<T::Timer>>,
}

#[derive(Debug, Default)]
struct InputState {
    keyboard: KeyboardTracker,
    caps_lock: CapsLockTracker,
    pointer: PointerTracker,
}

/// The Apple Event driver.
///
/// Handlers are notified from the poll routines [`on_key_poll`],
/// [`on_pointer_poll`] and [`on_caps_lock_poll`], which the host calls when
/// the matching timer created through `T` fires. No internal borrow is held
/// while a handler runs, so handlers may call back into the driver.
///
/// [`on_key_poll`]: Self::on_key_poll
/// [`on_pointer_poll`]: Self::on_pointer_poll
/// [`on_caps_lock_poll`]: Self::on_caps_lock_poll
pub struct AppleEvent<T: TimerService, K, P> {
    config: PollConfig,
    handlers: RefCell<HandlerRegistry>,
    timers: RefCell<PollTimers<T>>,
    keyboard: RefCell<K>,
    pointer: RefCell<P>,
    input: RefCell<InputState>,
    clock: Cell<u64>,
}

impl<T, K, P> AppleEvent<T, K, P>
where
    T: TimerService,
    K: KeyStrokeSource,
    P: PointerSource,
{
    /// Creates a driver with no handler registered. Timers are only created
    /// once the first handler registers.
    pub fn new(timers: T, keyboard: K, pointer: P, config: PollConfig) -> Self {
        Self {
            config,
            handlers: RefCell::new(HandlerRegistry::new()),
            timers: RefCell::new(PollTimers {
                service: timers,
                running: None,
            }),
            keyboard: RefCell::new(keyboard),
            pointer: RefCell::new(pointer),
            input: RefCell::new(InputState::default()),
            clock: Cell::new(0),
        }
    }

    /// The handler registry.
    ///
    /// # Panics
    ///
    /// Panics if called while the registry is being modified.
    pub fn handlers(&self) -> Ref<'_, HandlerRegistry> {
        self.handlers.borrow()
    }

    /// Returns true while the poll timers exist.
    pub fn timers_running(&self) -> bool {
        self.timers
            .try_borrow()
            .is_ok_and(|timers| timers.running.is_some())
    }

    /// Current cursor position.
    pub fn cursor_position(&self) -> Dimension {
        self.input.borrow().pointer.position()
    }

    /// Confines the cursor to a screen of `resolution` pixels.
    pub fn set_screen_resolution(&self, resolution: Dimension) -> Result {
        let mut input = self
            .input
            .try_borrow_mut()
            .map_err(|_| Status::ACCESS_DENIED)?;
        input.pointer.set_resolution(resolution);
        Ok(())
    }

    /// Registers `notify` for queries intersecting `event_type`.
    ///
    /// Handlers unregistered since the previous registration are reclaimed
    /// first. The first active handler creates the poll timers.
    ///
    /// # Errors
    ///
    /// See [`AppleEventService::register_handler`].
    pub fn register_handler(
        &self,
        event_type: AppleEventType,
        notify: NotifyFn,
    ) -> Result<EventHandle> {
        let mut handlers = self
            .handlers
            .try_borrow_mut()
            .map_err(|_| Status::ACCESS_DENIED)?;
        handlers.sweep();

        if event_type.is_empty() {
            return Err(Status::INVALID_PARAMETER.into());
        }

        let first = handlers.active() == 0;
        if first {
            self.start_timers()?;
        }

        handlers.insert(event_type, notify).inspect_err(|_| {
            if first {
                self.stop_timers();
            }
        })
    }

    /// Stops notifying `handle`. The handler is reclaimed at the next
    /// registration. The last active handler closes the poll timers.
    ///
    /// # Errors
    ///
    /// See [`AppleEventService::unregister_handler`].
    pub fn unregister_handler(&self, handle: EventHandle) -> Result {
        let mut handlers = self
            .handlers
            .try_borrow_mut()
            .map_err(|_| Status::ACCESS_DENIED)?;
        handlers.unregister_one(handle)?;
        if handlers.active() == 0 {
            self.stop_timers();
        }
        Ok(())
    }

    /// Stops notifying every handler and closes the poll timers.
    ///
    /// # Errors
    ///
    /// See [`AppleEventService::unregister_all_handlers`].
    pub fn unregister_all_handlers(&self) -> Result {
        let mut handlers = self
            .handlers
            .try_borrow_mut()
            .map_err(|_| Status::ACCESS_DENIED)?;
        let result = handlers.unregister_all();
        self.stop_timers();
        result
    }

    /// Moves the cursor. The position is kept on screen.
    ///
    /// # Errors
    ///
    /// See [`AppleEventService::set_cursor_position`].
    pub fn set_cursor_position(&self, position: Dimension) -> Result {
        let mut input = self
            .input
            .try_borrow_mut()
            .map_err(|_| Status::ACCESS_DENIED)?;
        input.pointer.set_position(position);
        Ok(())
    }

    /// Replaces the name of `handle`.
    ///
    /// # Errors
    ///
    /// See [`AppleEventService::set_event_name`].
    pub fn set_event_name(&self, handle: EventHandle, name: &str) -> Result {
        self.handlers
            .try_borrow_mut()
            .map_err(|_| Status::ACCESS_DENIED)?
            .set_name(handle, name)
    }

    /// Returns true if caps lock is engaged.
    pub fn is_caps_lock_active(&self) -> bool {
        self.input
            .try_borrow()
            .is_ok_and(|input| input.caps_lock.is_active())
    }

    /// Samples the keyboard and notifies handlers of key and modifier
    /// changes.
    pub fn on_key_poll(&self) {
        let timestamp = self.tick();
        let Some(held) = self.sample_keyboard() else {
            return;
        };

        let queries = {
            let Ok(mut input) = self.input.try_borrow_mut() else {
                return;
            };
            let position = input.pointer.position();
            input.keyboard.update(held, position, timestamp)
        };
        for query in &queries {
            self.dispatch(query);
        }
    }

    /// Samples the pointer and notifies handlers of movement, button and
    /// click events.
    pub fn on_pointer_poll(&self) {
        let timestamp = self.tick();
        let state = match self.pointer.try_borrow_mut() {
            Ok(mut pointer) => pointer.read_state().unwrap_or_else(|err| {
                debug!("pointer sample failed: {}", err.status());
                None
            }),
            Err(_) => return,
        };

        let queries = {
            let Ok(mut input) = self.input.try_borrow_mut() else {
                return;
            };
            let modifiers = input.keyboard.modifiers();
            input
                .pointer
                .update(state, &self.config, modifiers, timestamp)
        };
        for query in &queries {
            self.dispatch(query);
        }
    }

    /// Samples the caps lock key and toggles the caps lock state on press.
    pub fn on_caps_lock_poll(&self) {
        self.tick();
        let Some(held) = self.sample_keyboard() else {
            return;
        };
        if let Ok(mut input) = self.input.try_borrow_mut() {
            if input.caps_lock.update(&held) {
                debug!("caps lock {}", if input.caps_lock.is_active() { "on" } else { "off" });
            }
        }
    }

    /// Hands `query` to every registered, idle handler interested in it, in
    /// registration order.
    pub fn dispatch(&self, query: &AppleEventQuery) {
        let mut after = None;
        loop {
            let Ok(mut handlers) = self.handlers.try_borrow_mut() else {
                return;
            };
            let Some((handle, mut notify)) = handlers.begin_notify(after, query.event_type) else {
                return;
            };
            drop(handlers);

            notify(query);

            // A handler may have unregistered itself and registered another,
            // sweeping its own record: `finish_notify` then drops `notify`.
            match self.handlers.try_borrow_mut() {
                Ok(mut handlers) => handlers.finish_notify(handle, notify),
                Err(_) => return,
            }
            after = Some(handle);
        }
    }

    fn tick(&self) -> u64 {
        let now = self.clock.get() + 1;
        self.clock.set(now);
        now
    }

    fn sample_keyboard(&self) -> Option<crate::proto::key_map::KeyStrokes> {
        let mut keyboard = self.keyboard.try_borrow_mut().ok()?;
        keyboard
            .key_strokes()
            .inspect_err(|err| debug!("key strokes sample failed: {}", err.status()))
            .ok()
    }

    fn start_timers(&self) -> Result {
        let mut timers = self
            .timers
            .try_borrow_mut()
            .map_err(|_| Status::ACCESS_DENIED)?;
        if timers.running.is_some() {
            return Ok(());
        }

        let service = &mut timers.service;
        let key_strokes =
            service.create_timer(PollSource::KeyStrokes, self.config.key_poll_period)?;
        let pointer =
            match service.create_timer(PollSource::Pointer, self.config.pointer_poll_period) {
                Ok(timer) => timer,
                Err(err) => {
                    close_timer(service, key_strokes);
                    return Err(err);
                }
            };
        let caps_lock =
            match service.create_timer(PollSource::CapsLock, self.config.caps_lock_poll_period) {
                Ok(timer) => timer,
                Err(err) => {
                    close_timer(service, pointer);
                    close_timer(service, key_strokes);
                    return Err(err);
                }
            };

        timers.running = Some(RunningTimers {
            key_strokes,
            pointer,
            caps_lock,
        });
        debug!("apple event poll timers started");
        Ok(())
    }

    fn stop_timers(&self) {
        let Ok(mut timers) = self.timers.try_borrow_mut() else {
            return;
        };
        let Some(running) = timers.running.take() else {
            return;
        };

        close_timer(&mut timers.service, running.key_strokes);
        close_timer(&mut timers.service, running.pointer);
        close_timer(&mut timers.service, running.caps_lock);
        debug!("apple event poll timers stopped");
    }
}

fn close_timer<T: TimerService>(service: &mut T, timer: T::Timer) {
    if let Err(err) = service.close_timer(timer) {
        warn!("failed to close poll timer: {}", err.status());
    }
}

impl<T, K, P> AppleEventService for AppleEvent<T, K, P>
where
    T: TimerService,
    K: KeyStrokeSource,
    P: PointerSource,
{
    fn register_handler(
        &self,
        event_type: AppleEventType,
        notify: NotifyFn,
    ) -> Result<EventHandle> {
        Self::register_handler(self, event_type, notify)
    }

    fn unregister_handler(&self, handle: EventHandle) -> Result {
        Self::unregister_handler(self, handle)
    }

    fn unregister_all_handlers(&self) -> Result {
        Self::unregister_all_handlers(self)
    }

    fn set_cursor_position(&self, position: Dimension) -> Result {
        Self::set_cursor_position(self, position)
    }

    fn set_event_name(&self, handle: EventHandle, name: &str) -> Result {
        Self::set_event_name(self, handle, name)
    }

    fn is_caps_lock_active(&self) -> bool {
        Self::is_caps_lock_active(self)
    }
}

impl<T: TimerService, K, P> Debug for AppleEvent<T, K, P> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppleEvent")
            .field("config", &self.config)
            .field("handlers", &self.handlers)
            .field("input", &self.input)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::console::pointer::PointerState;
    use crate::proto::key_map::{
        apple_keyboard_key, AppleModifierMap, KeyStrokes, APPLE_KEY_CAPS_LOCK,
    };
    use alloc::boxed::Box;
    use alloc::rc::Rc;
    use alloc::vec;
    use alloc::vec::Vec;

    const KEY_A: u16 = apple_keyboard_key(0x04);

    #[derive(Default)]
    struct Timers {
        log: Rc<RefCell<Vec<(PollSource, bool)>>>,
        fail_on: Option<PollSource>,
    }

    impl TimerService for Timers {
        type Timer = PollSource;

        fn create_timer(&mut self, source: PollSource, _period: u64) -> Result<PollSource> {
            if self.fail_on == Some(source) {
                return Err(Status::OUT_OF_RESOURCES.into());
            }
            self.log.borrow_mut().push((source, true));
            Ok(source)
        }

        fn close_timer(&mut self, timer: PollSource) -> Result {
            self.log.borrow_mut().push((timer, false));
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct Keyboard(Rc<RefCell<KeyStrokes>>);

    impl KeyStrokeSource for Keyboard {
        fn key_strokes(&mut self) -> Result<KeyStrokes> {
            Ok(self.0.borrow().clone())
        }
    }

    #[derive(Clone, Default)]
    struct Mouse(Rc<RefCell<Option<PointerState>>>);

    impl PointerSource for Mouse {
        fn read_state(&mut self) -> Result<Option<PointerState>> {
            Ok(self.0.borrow_mut().take())
        }
    }

    type Driver = AppleEvent<Timers, Keyboard, Mouse>;

    fn driver() -> (Driver, Keyboard, Mouse) {
        let keyboard = Keyboard::default();
        let mouse = Mouse::default();
        let driver = AppleEvent::new(
            Timers::default(),
            keyboard.clone(),
            mouse.clone(),
            PollConfig::default(),
        );
        (driver, keyboard, mouse)
    }

    fn press(keyboard: &Keyboard, keys: &[u16]) {
        *keyboard.0.borrow_mut() = KeyStrokes {
            modifiers: AppleModifierMap::empty(),
            keys: keys.to_vec(),
        };
    }

    fn recorder(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> NotifyFn {
        let log = log.clone();
        Box::new(move |_| log.borrow_mut().push(name))
    }

    #[test]
    fn test_timers_follow_active_handlers() {
        let (driver, _, _) = driver();
        let log = driver.timers.borrow().service.log.clone();
        assert!(!driver.timers_running());

        let first = driver
            .register_handler(AppleEventType::KEY_DOWN, Box::new(|_| {}))
            .unwrap();
        let second = driver
            .register_handler(AppleEventType::KEY_UP, Box::new(|_| {}))
            .unwrap();
        assert!(driver.timers_running());
        assert_eq!(log.borrow().len(), 3);

        driver.unregister_handler(first).unwrap();
        assert!(driver.timers_running());
        driver.unregister_handler(second).unwrap();
        assert!(!driver.timers_running());
        assert_eq!(
            *log.borrow(),
            vec![
                (PollSource::KeyStrokes, true),
                (PollSource::Pointer, true),
                (PollSource::CapsLock, true),
                (PollSource::KeyStrokes, false),
                (PollSource::Pointer, false),
                (PollSource::CapsLock, false),
            ]
        );

        // Registering again recreates the timers.
        driver
            .register_handler(AppleEventType::KEY_DOWN, Box::new(|_| {}))
            .unwrap();
        assert!(driver.timers_running());
        assert_eq!(log.borrow().len(), 9);
    }

    #[test]
    fn test_timer_failure_registers_nothing() {
        let (driver, _, _) = driver();
        driver.timers.borrow_mut().service.fail_on = Some(PollSource::CapsLock);
        let log = driver.timers.borrow().service.log.clone();

        let err = driver
            .register_handler(AppleEventType::KEY_DOWN, Box::new(|_| {}))
            .unwrap_err();
        assert_eq!(err.status(), Status::OUT_OF_RESOURCES);
        assert!(driver.handlers().is_empty());
        assert!(!driver.timers_running());
        assert_eq!(
            *log.borrow(),
            vec![
                (PollSource::KeyStrokes, true),
                (PollSource::Pointer, true),
                (PollSource::Pointer, false),
                (PollSource::KeyStrokes, false),
            ]
        );
    }

    #[test]
    fn test_invalid_event_type() {
        let (driver, _, _) = driver();
        let err = driver
            .register_handler(AppleEventType::empty(), Box::new(|_| {}))
            .unwrap_err();
        assert_eq!(err.status(), Status::INVALID_PARAMETER);
        assert!(!driver.timers_running());
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let (driver, keyboard, _) = driver();
        let log = Rc::new(RefCell::new(Vec::new()));
        driver
            .register_handler(AppleEventType::KEY_DOWN, recorder(&log, "first"))
            .unwrap();
        driver
            .register_handler(AppleEventType::KEY_UP, recorder(&log, "up"))
            .unwrap();
        driver
            .register_handler(AppleEventType::ALL_KEYBOARD_EVENTS, recorder(&log, "second"))
            .unwrap();

        press(&keyboard, &[KEY_A]);
        driver.on_key_poll();
        assert_eq!(*log.borrow(), vec!["first", "second"]);

        log.borrow_mut().clear();
        press(&keyboard, &[]);
        driver.on_key_poll();
        assert_eq!(*log.borrow(), vec!["up", "second"]);
    }

    #[test]
    fn test_unregistered_during_tick_stops_firing() {
        let (driver, keyboard, _) = driver();
        let driver = Rc::new(driver);
        let log = Rc::new(RefCell::new(Vec::new()));

        let first = driver
            .register_handler(AppleEventType::KEY_DOWN, recorder(&log, "first"))
            .unwrap();
        let unregister = {
            let log = log.clone();
            let weak = Rc::downgrade(&driver);
            Box::new(move |_: &AppleEventQuery| {
                log.borrow_mut().push("second");
                if let Some(driver) = weak.upgrade() {
                    let _ = driver.unregister_handler(first);
                }
            })
        };
        driver
            .register_handler(AppleEventType::KEY_DOWN, unregister)
            .unwrap();

        press(&keyboard, &[KEY_A]);
        driver.on_key_poll();
        assert_eq!(*log.borrow(), vec!["first", "second"]);
        assert!(!driver.handlers().is_registered(first));
        assert_eq!(driver.handlers().len(), 2);

        press(&keyboard, &[]);
        driver.on_key_poll();
        press(&keyboard, &[KEY_A]);
        driver.on_key_poll();
        assert_eq!(*log.borrow(), vec!["first", "second", "second"]);

        // The next registration reclaims the unregistered handler.
        driver
            .register_handler(AppleEventType::MOUSE_MOVED, Box::new(|_| {}))
            .unwrap();
        assert_eq!(driver.handlers().len(), 2);
    }

    #[test]
    fn test_handler_is_not_reentered() {
        let (driver, keyboard, _) = driver();
        let driver = Rc::new(driver);
        let count = Rc::new(Cell::new(0));

        let nested = {
            let count = count.clone();
            let weak = Rc::downgrade(&driver);
            Box::new(move |query: &AppleEventQuery| {
                count.set(count.get() + 1);
                if let Some(driver) = weak.upgrade() {
                    driver.dispatch(query);
                }
            })
        };
        driver
            .register_handler(AppleEventType::KEY_DOWN, nested)
            .unwrap();

        press(&keyboard, &[KEY_A]);
        driver.on_key_poll();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_pointer_events_and_cursor() {
        let (driver, _, mouse) = driver();
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = seen.clone();
            driver
                .register_handler(
                    AppleEventType::ALL_MOUSE_EVENTS,
                    Box::new(move |query| seen.borrow_mut().push(*query)),
                )
                .unwrap();
        }
        driver.set_screen_resolution(Dimension::new(640, 480)).unwrap();
        driver.set_cursor_position(Dimension::new(100, 100)).unwrap();

        *mouse.0.borrow_mut() = Some(PointerState {
            relative_movement: [5, -200, 0],
            button: [true, false],
        });
        driver.on_pointer_poll();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].event_type, AppleEventType::MOUSE_MOVED);
        assert_eq!(seen[0].pointer_position, Dimension::new(105, 0));
        assert_eq!(
            seen[1].event_type,
            AppleEventType::MOUSE_DOWN | AppleEventType::LEFT_BUTTON
        );
        assert_eq!(seen[1].creation_timestamp, 1);
        assert_eq!(driver.cursor_position(), Dimension::new(105, 0));
    }

    #[test]
    fn test_caps_lock() {
        let (driver, keyboard, _) = driver();
        assert!(!driver.is_caps_lock_active());

        press(&keyboard, &[APPLE_KEY_CAPS_LOCK]);
        driver.on_caps_lock_poll();
        driver.on_caps_lock_poll();
        assert!(driver.is_caps_lock_active());

        press(&keyboard, &[]);
        driver.on_caps_lock_poll();
        press(&keyboard, &[APPLE_KEY_CAPS_LOCK]);
        driver.on_caps_lock_poll();
        assert!(!driver.is_caps_lock_active());
    }

    #[test]
    fn test_set_event_name() {
        let (driver, _, _) = driver();
        let handle = driver
            .register_handler(AppleEventType::KEY_DOWN, Box::new(|_| {}))
            .unwrap();
        driver.set_event_name(handle, "picker").unwrap();
        assert_eq!(driver.handlers().name(handle), Some("picker"));
    }
}
