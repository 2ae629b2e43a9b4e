// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{AppleEventQuery, AppleEventType};
use crate::{Result, Status};
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use apple_raw::protocol::apple_event::{AppleEventHandle, APPLE_EVENT_HANDLE_ALL};
use core::fmt::{self, Debug, Formatter};
use core::num::NonZeroUsize;
use log::{debug, trace};

/// Handler notification function.
pub type NotifyFn = Box<dyn FnMut(&AppleEventQuery)>;

/// Identifies a registered handler.
///
/// Handles are assigned in increasing order and never reused, so comparing
/// two handles tells which handler was registered first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EventHandle(NonZeroUsize);

impl EventHandle {
    /// Converts a handle received from firmware. Returns `None` for null and
    /// for [`APPLE_EVENT_HANDLE_ALL`].
    #[must_use]
    pub fn from_raw(handle: AppleEventHandle) -> Option<Self> {
        if handle == APPLE_EVENT_HANDLE_ALL {
            return None;
        }
        NonZeroUsize::new(handle.addr()).map(Self)
    }

    /// The value handed out to firmware callers.
    #[must_use]
    pub fn as_raw(self) -> AppleEventHandle {
        core::ptr::without_provenance_mut(self.0.get())
    }
}

struct HandlerRecord {
    handle: EventHandle,
    event_type: AppleEventType,
    /// `None` while the handler is running.
    notify: Option<NotifyFn>,
    registered: bool,
    ready: bool,
    name: Option<String>,
}

impl Debug for HandlerRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRecord")
            .field("handle", &self.handle)
            .field("event_type", &self.event_type)
            .field("registered", &self.registered)
            .field("ready", &self.ready)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Registered Apple Event handlers in registration order.
///
/// Handlers are never removed while they may be running: unregistering
/// marks a handler, and [`sweep`] reclaims marked handlers later.
///
/// [`sweep`]: Self::sweep
#[derive(Debug)]
pub struct HandlerRegistry {
    records: Vec<HandlerRecord>,
    next_handle: NonZeroUsize,
    active: usize,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
            next_handle: NonZeroUsize::MIN,
            active: 0,
        }
    }

    /// Number of registered handlers, not counting unregistered ones that
    /// have not been swept yet.
    #[must_use]
    pub const fn active(&self) -> usize {
        self.active
    }

    /// Number of records, including unregistered ones that have not been
    /// swept yet.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the registry holds no record at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns true if `handle` is registered.
    #[must_use]
    pub fn is_registered(&self, handle: EventHandle) -> bool {
        self.find(handle).is_some_and(|record| record.registered)
    }

    /// Name given to `handle` with [`set_name`].
    ///
    /// [`set_name`]: Self::set_name
    #[must_use]
    pub fn name(&self, handle: EventHandle) -> Option<&str> {
        self.find(handle)?.name.as_deref()
    }

    /// Removes all unregistered handlers and returns how many were removed.
    pub fn sweep(&mut self) -> usize {
        let before = self.records.len();
        self.records.retain(|record| record.registered);
        let removed = before - self.records.len();
        if removed != 0 {
            debug!("reclaimed {removed} unregistered event handlers");
        }
        removed
    }

    /// Appends a handler.
    ///
    /// # Errors
    ///
    /// * `Status::INVALID_PARAMETER` `event_type` is empty.
    /// * `Status::OUT_OF_RESOURCES` The record could not be allocated.
    pub fn insert(&mut self, event_type: AppleEventType, notify: NotifyFn) -> Result<EventHandle> {
        if event_type.is_empty() {
            return Err(Status::INVALID_PARAMETER.into());
        }
        let next_handle = self
            .next_handle
            .checked_add(1)
            .filter(|next| next.get() != usize::MAX)
            .ok_or(Status::OUT_OF_RESOURCES)?;
        self.records
            .try_reserve(1)
            .map_err(|_| Status::OUT_OF_RESOURCES)?;

        let handle = EventHandle(self.next_handle);
        self.next_handle = next_handle;
        self.records.push(HandlerRecord {
            handle,
            event_type,
            notify: Some(notify),
            registered: true,
            ready: true,
            name: None,
        });
        self.active += 1;

        debug!("registered event handler {handle:?} for {event_type:?}");
        Ok(handle)
    }

    /// Marks `handle` unregistered.
    ///
    /// # Errors
    ///
    /// * `Status::NOT_FOUND` `handle` is not registered.
    pub fn unregister_one(&mut self, handle: EventHandle) -> Result {
        let record = self
            .records
            .iter_mut()
            .find(|record| record.handle == handle && record.registered)
            .ok_or(Status::NOT_FOUND)?;
        record.registered = false;
        self.active -= 1;

        debug!("unregistered event handler {handle:?}");
        Ok(())
    }

    /// Marks every registered handler unregistered.
    ///
    /// # Errors
    ///
    /// * `Status::NOT_FOUND` No handler was registered.
    pub fn unregister_all(&mut self) -> Result {
        let mut count = 0usize;
        for record in self.records.iter_mut().filter(|record| record.registered) {
            record.registered = false;
            count += 1;
        }
        self.active = 0;

        if count == 0 {
            return Err(Status::NOT_FOUND.into());
        }
        debug!("unregistered all {count} event handlers");
        Ok(())
    }

    /// Replaces the name of `handle`.
    ///
    /// # Errors
    ///
    /// * `Status::NOT_FOUND` `handle` is not registered.
    /// * `Status::OUT_OF_RESOURCES` The name could not be allocated. The
    ///   previous name is kept.
    pub fn set_name(&mut self, handle: EventHandle, name: &str) -> Result {
        let record = self
            .records
            .iter_mut()
            .find(|record| record.handle == handle && record.registered)
            .ok_or(Status::NOT_FOUND)?;

        let mut owned = String::new();
        owned
            .try_reserve_exact(name.len())
            .map_err(|_| Status::OUT_OF_RESOURCES)?;
        owned.push_str(name);
        record.name = Some(owned);
        Ok(())
    }

    /// Finds the first handler registered after `after` that is registered,
    /// idle and interested in `event_type`, marks it busy and takes its
    /// notification function.
    ///
    /// The function must be handed back with [`finish_notify`].
    ///
    /// [`finish_notify`]: Self::finish_notify
    pub(crate) fn begin_notify(
        &mut self,
        after: Option<EventHandle>,
        event_type: AppleEventType,
    ) -> Option<(EventHandle, NotifyFn)> {
        let record = self.records.iter_mut().find(|record| {
            after.is_none_or(|after| record.handle > after)
                && record.registered
                && record.ready
                && record.event_type.intersects(event_type)
        })?;
        let notify = record.notify.take()?;
        record.ready = false;
        trace!("notifying {:?} of {event_type:?}", record.handle);
        Some((record.handle, notify))
    }

    /// Hands back a notification function taken by [`begin_notify`]. If the
    /// handler was swept in the meantime the function is dropped.
    ///
    /// [`begin_notify`]: Self::begin_notify
    pub(crate) fn finish_notify(&mut self, handle: EventHandle, notify: NotifyFn) {
        if let Some(record) = self.records.iter_mut().find(|record| record.handle == handle) {
            record.notify = Some(notify);
            record.ready = true;
        }
    }

    fn find(&self, handle: EventHandle) -> Option<&HandlerRecord> {
        self.records.iter().find(|record| record.handle == handle)
    }
}
