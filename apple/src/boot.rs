// SPDX-License-Identifier: MIT OR Apache-2.0

//! Boot services used by the drivers.
//!
//! The drivers never reach for a global boot services table. Everything they
//! need from the firmware is expressed as a trait implemented by the host:
//! the protocol database through [`ProtocolDatabase`] and recurring timers
//! through [`TimerService`].

use crate::data_types::Handle;
use crate::proto::Protocol;
use crate::{Guid, Result, Status};
use core::ffi::c_void;
use core::ptr::NonNull;
use log::{debug, info};

/// Timer periods are expressed in units of 100 nanoseconds.
pub const TIMER_PERIOD_MILLISECONDS: u64 = 10_000;

/// The firmware's global protocol database.
pub trait ProtocolDatabase {
    /// Returns the first interface installed for `protocol`.
    ///
    /// # Errors
    ///
    /// * [`Status::NOT_FOUND`]: no handle supports `protocol`.
    fn locate_protocol(&self, protocol: &Guid) -> Result<NonNull<c_void>>;

    /// Installs `interface` for `protocol` on `handle`, or on a new handle if
    /// `handle` is `None`.
    ///
    /// # Safety
    ///
    /// `interface` must point to a table matching `protocol` that outlives
    /// every consumer of the database.
    ///
    /// # Errors
    ///
    /// * [`Status::OUT_OF_RESOURCES`]: failed to allocate a new handle.
    /// * [`Status::INVALID_PARAMETER`]: this protocol is already installed on the handle.
    unsafe fn install_protocol(
        &mut self,
        handle: Option<Handle>,
        protocol: &Guid,
        interface: *const c_void,
    ) -> Result<Handle>;

    /// Removes `interface` for `protocol` from `handle`.
    ///
    /// # Safety
    ///
    /// No consumer may still hold the interface.
    ///
    /// # Errors
    ///
    /// * [`Status::NOT_FOUND`]: the interface is not installed on the handle.
    /// * [`Status::ACCESS_DENIED`]: the interface is still in use.
    unsafe fn uninstall_protocol(
        &mut self,
        handle: Handle,
        protocol: &Guid,
        interface: *const c_void,
    ) -> Result;
}

/// Fails with [`Status::ALREADY_STARTED`] if some handle carries protocol `P`.
///
/// # Errors
///
/// * [`Status::ALREADY_STARTED`]: `P` is already installed.
/// * Any error reported by [`ProtocolDatabase::locate_protocol`] other than
///   [`Status::NOT_FOUND`].
pub fn ensure_not_installed<P, D>(database: &D) -> Result
where
    P: Protocol,
    D: ProtocolDatabase + ?Sized,
{
    match database.locate_protocol(&P::GUID) {
        Ok(_) => {
            debug!("protocol {} is already installed", P::GUID);
            Err(Status::ALREADY_STARTED.into())
        }
        Err(err) if err.status() == Status::NOT_FOUND => Ok(()),
        Err(err) => Err(err),
    }
}

/// Installs `interface` unless some handle already carries protocol `P`.
///
/// Drivers call this from their entry point; a second load of the same
/// driver leaves the first instance in place.
///
/// # Safety
///
/// `interface` must outlive every consumer of the database.
///
/// # Errors
///
/// * [`Status::ALREADY_STARTED`]: `P` is already installed. The database is
///   not modified.
/// * Any error reported by [`ProtocolDatabase::locate_protocol`] other than
///   [`Status::NOT_FOUND`], or by [`ProtocolDatabase::install_protocol`].
pub unsafe fn install_protocol_once<P, D>(
    database: &mut D,
    handle: Option<Handle>,
    interface: *const P,
) -> Result<Handle>
where
    P: Protocol,
    D: ProtocolDatabase + ?Sized,
{
    ensure_not_installed::<P, _>(database)?;

    let handle = unsafe { database.install_protocol(handle, &P::GUID, interface.cast()) }?;
    info!("installed protocol {}", P::GUID);
    Ok(handle)
}

/// The input sampled by a recurring timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PollSource {
    /// Key strokes and modifiers.
    KeyStrokes,
    /// Pointer movement and buttons.
    Pointer,
    /// The caps lock key.
    CapsLock,
}

/// Recurring timers driving input sampling.
///
/// When a timer created for a [`PollSource`] fires, the host calls the
/// matching poll routine of the driver that created it, for example
/// [`AppleEvent::on_key_poll`].
///
/// [`AppleEvent::on_key_poll`]: crate::proto::apple_event::AppleEvent::on_key_poll
pub trait TimerService {
    /// Firmware event backing a timer.
    type Timer;

    /// Creates a timer firing every `period` (in 100 ns units) for `source`.
    ///
    /// # Errors
    ///
    /// * [`Status::OUT_OF_RESOURCES`]: the event could not be allocated.
    /// * [`Status::INVALID_PARAMETER`]: the period is not supported.
    fn create_timer(&mut self, source: PollSource, period: u64) -> Result<Self::Timer>;

    /// Cancels and closes a timer.
    ///
    /// # Errors
    ///
    /// Implementations may report any error of the underlying event service.
    fn close_timer(&mut self, timer: Self::Timer) -> Result;
}
