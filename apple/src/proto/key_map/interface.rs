// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{KeyMapAggregator, KeyMapDatabase, KeyStrokeRegistry};
use crate::boot::{self, ProtocolDatabase};
use crate::data_types::Handle;
use crate::{Identify, Result, Status};
use alloc::boxed::Box;
use apple_raw::protocol::key_map::{
    AppleKeyCode, AppleKeyMapAggregatorProtocol, AppleKeyMapDatabaseProtocol, AppleModifierMap,
};
use apple_raw::Boolean;
use core::cell::{RefCell, RefMut};
use core::mem::offset_of;
use core::slice;
use log::warn;

/// The key map database and aggregator protocols backed by one
/// [`KeyStrokeRegistry`].
///
/// Both protocol tables are embedded in this structure, so the registry is
/// recovered from the `This` pointer firmware passes to every call.
#[derive(Debug)]
#[repr(C)]
pub struct KeyMapInterface {
    database: AppleKeyMapDatabaseProtocol,
    aggregator: AppleKeyMapAggregatorProtocol,
    registry: RefCell<KeyStrokeRegistry>,
}

impl Default for KeyMapInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyMapInterface {
    /// Creates the protocol tables around an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            database: AppleKeyMapDatabaseProtocol {
                revision: AppleKeyMapDatabaseProtocol::REVISION,
                create_key_strokes_buffer,
                remove_key_strokes_buffer,
                set_key_strokes_buffer_keys,
            },
            aggregator: AppleKeyMapAggregatorProtocol {
                revision: AppleKeyMapAggregatorProtocol::REVISION,
                get_key_strokes,
                contains_key_strokes,
            },
            registry: RefCell::new(KeyStrokeRegistry::new()),
        }
    }

    /// The registry behind both protocols.
    pub fn registry(&self) -> RefMut<'_, KeyStrokeRegistry> {
        self.registry.borrow_mut()
    }

    /// The database protocol table, as installed in the protocol database.
    pub fn database(&mut self) -> &mut KeyMapDatabase {
        let database: *mut AppleKeyMapDatabaseProtocol = &mut self.database;
        // SAFETY: `KeyMapDatabase` is a transparent wrapper of the table.
        unsafe { &mut *database.cast::<KeyMapDatabase>() }
    }

    /// The aggregator protocol table, as installed in the protocol database.
    pub fn aggregator(&mut self) -> &mut KeyMapAggregator {
        let aggregator: *mut AppleKeyMapAggregatorProtocol = &mut self.aggregator;
        // SAFETY: `KeyMapAggregator` is a transparent wrapper of the table.
        unsafe { &mut *aggregator.cast::<KeyMapAggregator>() }
    }

    /// Moves the interface to the heap for the rest of the boot session and
    /// installs both protocols on one new handle.
    ///
    /// # Errors
    ///
    /// * `Status::ALREADY_STARTED` A key map database or aggregator is
    ///   already installed. Nothing is installed and the interface is dropped.
    /// * Any error reported by the protocol database.
    pub fn install<D>(self, database: &mut D) -> Result<Handle>
    where
        D: ProtocolDatabase + ?Sized,
    {
        boot::ensure_not_installed::<KeyMapAggregator, _>(database)?;
        let interface = Box::into_raw(Box::new(self));
        // SAFETY: `interface` is live until reclaimed below.
        let (database_table, aggregator_table) = unsafe {
            (
                (&raw const (*interface).database).cast::<KeyMapDatabase>(),
                (&raw const (*interface).aggregator).cast::<KeyMapAggregator>(),
            )
        };

        // SAFETY: the interface is never freed once installed.
        let installed = unsafe { boot::install_protocol_once(database, None, database_table) };
        let handle = match installed {
            Ok(handle) => handle,
            Err(err) => {
                // SAFETY: nothing refers to the interface yet.
                drop(unsafe { Box::from_raw(interface) });
                return Err(err);
            }
        };

        // SAFETY: as above.
        let installed =
            unsafe { boot::install_protocol_once(database, Some(handle), aggregator_table) };
        if let Err(err) = installed {
            // SAFETY: the database protocol was installed just above and no
            // consumer has located it since.
            let withdrawn = unsafe {
                database.uninstall_protocol(handle, &KeyMapDatabase::GUID, database_table.cast())
            };
            match withdrawn {
                // SAFETY: no table refers to the interface any more.
                Ok(()) => drop(unsafe { Box::from_raw(interface) }),
                Err(uninstall) => {
                    warn!("key map database left installed: {}", uninstall.status());
                }
            }
            return Err(err);
        }

        Ok(handle)
    }

    /// Recovers the interface from a database `This` pointer.
    ///
    /// # Safety
    ///
    /// `this` must be null or point into a live `KeyMapInterface`.
    unsafe fn from_database<'a>(this: *mut AppleKeyMapDatabaseProtocol) -> Option<&'a Self> {
        let this = this.cast::<u8>();
        if this.is_null() {
            return None;
        }
        unsafe { this.sub(offset_of!(Self, database)).cast::<Self>().as_ref() }
    }

    /// Recovers the interface from an aggregator `This` pointer.
    ///
    /// # Safety
    ///
    /// `this` must be null or point into a live `KeyMapInterface`.
    unsafe fn from_aggregator<'a>(this: *mut AppleKeyMapAggregatorProtocol) -> Option<&'a Self> {
        let this = this.cast::<u8>();
        if this.is_null() {
            return None;
        }
        unsafe { this.sub(offset_of!(Self, aggregator)).cast::<Self>().as_ref() }
    }

    fn with_registry<T>(&self, f: impl FnOnce(&mut KeyStrokeRegistry) -> T) -> Option<T> {
        let mut registry = self.registry.try_borrow_mut().ok()?;
        Some(f(&mut registry))
    }
}

/// Borrows `count` key codes from firmware memory.
///
/// # Safety
///
/// `keys` must be null or valid for reads of `count` elements.
unsafe fn keys_from_raw<'a>(keys: *const AppleKeyCode, count: usize) -> Option<&'a [AppleKeyCode]> {
    if count == 0 {
        Some(&[])
    } else if keys.is_null() {
        None
    } else {
        Some(unsafe { slice::from_raw_parts(keys, count) })
    }
}

fn status_of<T>(result: Option<Result<T>>) -> Status {
    match result {
        Some(Ok(_)) => Status::SUCCESS,
        Some(Err(err)) => err.status(),
        None => Status::ACCESS_DENIED,
    }
}

unsafe extern "efiapi" fn create_key_strokes_buffer(
    this: *mut AppleKeyMapDatabaseProtocol,
    key_buffer_size: usize,
    index: *mut usize,
) -> Status {
    let Some(interface) = (unsafe { KeyMapInterface::from_database(this) }) else {
        return Status::INVALID_PARAMETER;
    };
    if index.is_null() {
        return Status::INVALID_PARAMETER;
    }

    match interface.with_registry(|registry| registry.create_buffer(key_buffer_size)) {
        Some(Ok(created)) => {
            unsafe { index.write(created) };
            Status::SUCCESS
        }
        other => status_of(other),
    }
}

unsafe extern "efiapi" fn remove_key_strokes_buffer(
    this: *mut AppleKeyMapDatabaseProtocol,
    index: usize,
) -> Status {
    let Some(interface) = (unsafe { KeyMapInterface::from_database(this) }) else {
        return Status::INVALID_PARAMETER;
    };
    status_of(interface.with_registry(|registry| registry.remove_buffer(index)))
}

unsafe extern "efiapi" fn set_key_strokes_buffer_keys(
    this: *mut AppleKeyMapDatabaseProtocol,
    index: usize,
    modifiers: AppleModifierMap,
    number_of_keys: usize,
    keys: *const AppleKeyCode,
) -> Status {
    let Some(interface) = (unsafe { KeyMapInterface::from_database(this) }) else {
        return Status::INVALID_PARAMETER;
    };
    let Some(keys) = (unsafe { keys_from_raw(keys, number_of_keys) }) else {
        return Status::INVALID_PARAMETER;
    };
    status_of(interface.with_registry(|registry| registry.set_keys(index, modifiers, keys)))
}

unsafe extern "efiapi" fn get_key_strokes(
    this: *mut AppleKeyMapAggregatorProtocol,
    modifiers: *mut AppleModifierMap,
    number_of_key_codes: *mut usize,
    key_codes: *mut AppleKeyCode,
) -> Status {
    let Some(interface) = (unsafe { KeyMapInterface::from_aggregator(this) }) else {
        return Status::INVALID_PARAMETER;
    };
    if modifiers.is_null() || number_of_key_codes.is_null() {
        return Status::INVALID_PARAMETER;
    }

    let capacity = unsafe { number_of_key_codes.read() };
    let key_codes = if key_codes.is_null() || capacity == 0 {
        None
    } else {
        Some(unsafe { slice::from_raw_parts_mut(key_codes, capacity) })
    };

    let Some(result) = interface.with_registry(|registry| registry.get_key_strokes(key_codes))
    else {
        return Status::ACCESS_DENIED;
    };
    match result {
        Ok((held, count)) => {
            unsafe {
                modifiers.write(held);
                number_of_key_codes.write(count);
            }
            Status::SUCCESS
        }
        Err(err) => {
            if let Some(required) = *err.data() {
                unsafe { number_of_key_codes.write(required) };
            }
            err.status()
        }
    }
}

unsafe extern "efiapi" fn contains_key_strokes(
    this: *mut AppleKeyMapAggregatorProtocol,
    modifiers: AppleModifierMap,
    number_of_key_codes: usize,
    key_codes: *const AppleKeyCode,
    exact_match: Boolean,
) -> Status {
    let Some(interface) = (unsafe { KeyMapInterface::from_aggregator(this) }) else {
        return Status::INVALID_PARAMETER;
    };
    let Some(keys) = (unsafe { keys_from_raw(key_codes, number_of_key_codes) }) else {
        return Status::INVALID_PARAMETER;
    };
    status_of(interface.with_registry(|registry| {
        registry.contains_key_strokes(modifiers, keys, exact_match.into())
    }))
}
