// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Apple Event protocol table.
//!
//! The table's functions carry no `This` pointer, so the installed driver is
//! kept in a single global slot.

use super::driver::{AppleEvent, AppleEventService};
use super::input::PointerSource;
use super::registry::{EventHandle, NotifyFn};
use super::{AppleEventQuery, AppleEventType, AppleKeyEventData, Dimension};
use crate::boot::{self, ProtocolDatabase, TimerService};
use crate::data_types::Handle;
use crate::proto::key_map::KeyStrokeSource;
use crate::{unsafe_protocol, Result, ResultExt, Status, StatusExt};
use alloc::boxed::Box;
use apple_raw::protocol::apple_event::{
    AppleEventHandle, AppleEventNotifyFunction, AppleEventProtocol, APPLE_EVENT_HANDLE_ALL,
};
use apple_raw::{Boolean, Char8};
use core::ffi::{c_void, CStr};
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};
use log::info;

type Service = &'static dyn AppleEventService;

/// The installed driver.
static SERVICE: AtomicPtr<Service> = AtomicPtr::new(ptr::null_mut());

static PROTOCOL: AppleEventProtocol = AppleEventProtocol {
    revision: AppleEventProtocol::REVISION,
    register_handler,
    unregister_handler,
    set_cursor_position,
    set_event_name,
    is_caps_lock_active,
};

fn service() -> Option<Service> {
    // SAFETY: the slot is either null or set once by `install` to a leaked
    // allocation.
    unsafe { SERVICE.load(Ordering::Acquire).as_ref() }.copied()
}

impl<T, K, P> AppleEvent<T, K, P>
where
    T: TimerService + 'static,
    K: KeyStrokeSource + 'static,
    P: PointerSource + 'static,
{
    /// Keeps the driver for the rest of the boot session and installs the
    /// Apple Event protocol for it.
    ///
    /// The returned reference is what the host's timers call the poll
    /// routines on.
    ///
    /// # Errors
    ///
    /// * `Status::ALREADY_STARTED` An Apple Event protocol is already
    ///   installed. Nothing is modified and the driver is dropped.
    /// * Any error reported by the protocol database.
    pub fn install<D>(self, database: &mut D) -> Result<(Handle, &'static Self)>
    where
        D: ProtocolDatabase + ?Sized,
    {
        let driver = Box::into_raw(Box::new(self));
        // SAFETY: `driver` is only freed by `withdraw`, before anything
        // could have reached it through the slot.
        let service: Service = unsafe { &*driver };
        let slot = Box::into_raw(Box::new(service));

        // SAFETY: `driver` and `slot` came from `Box::into_raw` and are not
        // published.
        let withdraw = || unsafe {
            drop(Box::from_raw(slot));
            drop(Box::from_raw(driver));
        };

        if SERVICE
            .compare_exchange(ptr::null_mut(), slot, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            withdraw();
            return Err(Status::ALREADY_STARTED.into());
        }

        // SAFETY: `PROTOCOL` is a static.
        let installed = unsafe {
            boot::install_protocol_once::<AppleEventClient, _>(
                database,
                None,
                (&raw const PROTOCOL).cast(),
            )
        };
        match installed {
            Ok(handle) => {
                info!("apple event protocol installed");
                // SAFETY: the driver is published and never freed from here on.
                Ok((handle, unsafe { &*driver }))
            }
            Err(err) => {
                SERVICE.store(ptr::null_mut(), Ordering::Release);
                withdraw();
                Err(err)
            }
        }
    }
}

unsafe extern "efiapi" fn register_handler(
    event_type: AppleEventType,
    notify_function: Option<AppleEventNotifyFunction>,
    handle: *mut AppleEventHandle,
    notify_context: *mut c_void,
) -> Status {
    let Some(notify_function) = notify_function else {
        return Status::INVALID_PARAMETER;
    };
    if handle.is_null() {
        return Status::INVALID_PARAMETER;
    }
    let Some(service) = service() else {
        return Status::NOT_STARTED;
    };

    let notify: NotifyFn = Box::new(move |query: &AppleEventQuery| {
        let mut key_data = AppleKeyEventData::default();
        let mut information = query.to_raw(&mut key_data);
        // SAFETY: the caller of `register_handler` keeps `notify_context`
        // valid until the handler is unregistered.
        unsafe { notify_function(&mut information, notify_context) };
    });

    match service.register_handler(event_type, notify) {
        Ok(registered) => {
            // SAFETY: `handle` was checked for null above.
            unsafe { handle.write(registered.as_raw()) };
            Status::SUCCESS
        }
        Err(err) => err.status(),
    }
}

unsafe extern "efiapi" fn unregister_handler(handle: AppleEventHandle) -> Status {
    let Some(service) = service() else {
        return Status::NOT_STARTED;
    };
    if handle == APPLE_EVENT_HANDLE_ALL {
        return service.unregister_all_handlers().status();
    }
    match EventHandle::from_raw(handle) {
        Some(handle) => service.unregister_handler(handle).status(),
        None => Status::INVALID_PARAMETER,
    }
}

unsafe extern "efiapi" fn set_cursor_position(position: *const Dimension) -> Status {
    // SAFETY: the caller passes null or a valid `Dimension`.
    let Some(position) = (unsafe { position.as_ref() }) else {
        return Status::INVALID_PARAMETER;
    };
    match service() {
        Some(service) => service.set_cursor_position(*position).status(),
        None => Status::NOT_STARTED,
    }
}

unsafe extern "efiapi" fn set_event_name(handle: AppleEventHandle, name: *const Char8) -> Status {
    let Some(handle) = EventHandle::from_raw(handle) else {
        return Status::INVALID_PARAMETER;
    };
    if name.is_null() {
        return Status::INVALID_PARAMETER;
    }
    // SAFETY: `name` is non-null and the caller passes a NUL-terminated string.
    let Ok(name) = unsafe { CStr::from_ptr(name.cast()) }.to_str() else {
        return Status::INVALID_PARAMETER;
    };
    match service() {
        Some(service) => service.set_event_name(handle, name).status(),
        None => Status::NOT_STARTED,
    }
}

unsafe extern "efiapi" fn is_caps_lock_active(active: *mut Boolean) -> Status {
    if active.is_null() {
        return Status::INVALID_PARAMETER;
    }
    let Some(service) = service() else {
        return Status::NOT_STARTED;
    };
    // SAFETY: `active` was checked for null above.
    unsafe { active.write(service.is_caps_lock_active().into()) };
    Status::SUCCESS
}

/// Apple Event [`Protocol`], as seen by consumers.
///
/// [`Protocol`]: crate::proto::Protocol
#[derive(Debug)]
#[repr(transparent)]
pub struct AppleEventClient(AppleEventProtocol);

unsafe_protocol!(AppleEventClient, AppleEventProtocol::GUID);

impl AppleEventClient {
    /// Registers `notify_function` for queries intersecting `event_type`.
    ///
    /// # Safety
    ///
    /// `notify_function` is called with `notify_context` until the handler is
    /// unregistered; the context must stay valid that long.
    ///
    /// # Errors
    ///
    /// * `Status::INVALID_PARAMETER` `event_type` is empty.
    /// * `Status::OUT_OF_RESOURCES` The handler could not be allocated.
    pub unsafe fn register_handler(
        &self,
        event_type: AppleEventType,
        notify_function: AppleEventNotifyFunction,
        notify_context: *mut c_void,
    ) -> Result<AppleEventHandle> {
        let mut handle = ptr::null_mut();
        unsafe {
            (self.0.register_handler)(
                event_type,
                Some(notify_function),
                &mut handle,
                notify_context,
            )
        }
        .to_result_with_val(|| handle)
    }

    /// Unregisters one handler.
    ///
    /// # Errors
    ///
    /// * `Status::NOT_FOUND` `handle` is not registered.
    pub fn unregister_handler(&self, handle: AppleEventHandle) -> Result {
        unsafe { (self.0.unregister_handler)(handle) }.to_result()
    }

    /// Unregisters every handler.
    ///
    /// # Errors
    ///
    /// * `Status::NOT_FOUND` No handler was registered.
    pub fn unregister_all_handlers(&self) -> Result {
        unsafe { (self.0.unregister_handler)(APPLE_EVENT_HANDLE_ALL) }.to_result()
    }

    /// Moves the cursor.
    ///
    /// # Errors
    ///
    /// Any error reported by the driver.
    pub fn set_cursor_position(&self, position: Dimension) -> Result {
        unsafe { (self.0.set_cursor_position)(&position) }.to_result()
    }

    /// Names a handler.
    ///
    /// # Errors
    ///
    /// * `Status::NOT_FOUND` `handle` is not registered.
    /// * `Status::INVALID_PARAMETER` `name` is not valid UTF-8.
    pub fn set_event_name(&self, handle: AppleEventHandle, name: &CStr) -> Result {
        unsafe { (self.0.set_event_name)(handle, name.as_ptr().cast()) }.to_result()
    }

    /// Returns true if caps lock is engaged.
    ///
    /// # Errors
    ///
    /// Any error reported by the driver.
    pub fn is_caps_lock_active(&self) -> Result<bool> {
        let mut active = Boolean::FALSE;
        unsafe { (self.0.is_caps_lock_active)(&mut active) }.to_result_with_val(|| active.into())
    }
}

