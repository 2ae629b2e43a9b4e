// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(dead_code)]

use apple_efi::boot::ProtocolDatabase;
use apple_efi::{Guid, Handle, Result, Status};
use core::ffi::c_void;
use core::ptr::{self, NonNull};

/// Protocol database kept in memory, standing in for the firmware's.
#[derive(Debug, Default)]
pub struct MemProtocolDatabase {
    entries: Vec<(Handle, Guid, NonNull<c_void>)>,
    handles: usize,
    refuse: Option<Guid>,
}

impl MemProtocolDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// A database that fails every install of `protocol`.
    pub fn refusing(protocol: Guid) -> Self {
        Self {
            refuse: Some(protocol),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns the interface installed for `protocol`, cast to `T`.
    ///
    /// # Safety
    ///
    /// `T` must be the type behind `protocol`.
    pub unsafe fn open<T>(&self, protocol: &Guid) -> &'static mut T {
        let interface = self.locate_protocol(protocol).unwrap();
        unsafe { interface.cast::<T>().as_mut() }
    }

    /// The handle carrying `protocol`.
    pub fn handle_of(&self, protocol: &Guid) -> Option<Handle> {
        self.entries
            .iter()
            .find(|(_, guid, _)| guid == protocol)
            .map(|(handle, _, _)| *handle)
    }
}

impl ProtocolDatabase for MemProtocolDatabase {
    fn locate_protocol(&self, protocol: &Guid) -> Result<NonNull<c_void>> {
        self.entries
            .iter()
            .find(|(_, guid, _)| guid == protocol)
            .map(|(_, _, interface)| *interface)
            .ok_or_else(|| Status::NOT_FOUND.into())
    }

    unsafe fn install_protocol(
        &mut self,
        handle: Option<Handle>,
        protocol: &Guid,
        interface: *const c_void,
    ) -> Result<Handle> {
        if self.refuse.as_ref() == Some(protocol) {
            return Err(Status::OUT_OF_RESOURCES.into());
        }
        let interface = NonNull::new(interface.cast_mut()).ok_or(Status::INVALID_PARAMETER)?;
        let handle = match handle {
            Some(handle) => {
                if self
                    .entries
                    .iter()
                    .any(|(other, guid, _)| *other == handle && guid == protocol)
                {
                    return Err(Status::INVALID_PARAMETER.into());
                }
                handle
            }
            None => {
                self.handles += 1;
                unsafe { Handle::from_ptr(ptr::without_provenance_mut(self.handles * 8)) }
                    .ok_or(Status::OUT_OF_RESOURCES)?
            }
        };
        self.entries.push((handle, *protocol, interface));
        Ok(handle)
    }

    unsafe fn uninstall_protocol(
        &mut self,
        handle: Handle,
        protocol: &Guid,
        interface: *const c_void,
    ) -> Result {
        let index = self
            .entries
            .iter()
            .position(|(other, guid, installed)| {
                *other == handle && guid == protocol && ptr::eq(installed.as_ptr(), interface)
            })
            .ok_or(Status::NOT_FOUND)?;
        self.entries.remove(index);
        Ok(())
    }
}
