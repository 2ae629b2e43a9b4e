// SPDX-License-Identifier: MIT OR Apache-2.0

//! Results of driver and protocol operations.

use core::fmt::Debug;

/// A status code plus optional additional data.
mod error;
pub use self::error::Error;

/// Status codes and their conversion into results.
mod status;
pub use self::status::{Status, StatusExt};

/// Return type of the drivers' fallible operations.
///
/// [`Status::SUCCESS`] maps to `Ok`, carrying the operation's output. Both
/// warnings and errors map to `Err`, optionally carrying `ErrData` such as
/// the element count a `BUFFER_TOO_SMALL` caller has to provide.
pub type Result<Output = (), ErrData = ()> = core::result::Result<Output, Error<ErrData>>;

/// Extension trait which provides some convenience methods for [`Result`].
pub trait ResultExt<Output, ErrData: Debug> {
    /// The status a protocol function reports for this result.
    fn status(&self) -> Status;

    /// Calls `op` if the result contains a warning, otherwise returns
    /// the result unchanged.
    ///
    /// # Example
    ///
    /// ```
    /// use apple_efi::{Result, ResultExt, Status};
    ///
    /// # fn x() -> apple_efi::Result {
    /// # let some_result: Result = Err(Status::WARN_UNKNOWN_GLYPH.into());
    /// // Accept text the console could not fully render.
    /// some_result.handle_warning(|err| {
    ///     if err.status() == Status::WARN_UNKNOWN_GLYPH {
    ///         Ok(())
    ///     } else {
    ///         Err(err)
    ///     }
    /// })?;
    /// # Ok(())
    /// # }
    /// ```
    fn handle_warning<O>(self, op: O) -> Result<Output, ErrData>
    where
        O: FnOnce(Error<ErrData>) -> Result<Output, ErrData>;
}

impl<Output, ErrData: Debug> ResultExt<Output, ErrData> for Result<Output, ErrData> {
    fn status(&self) -> Status {
        match self {
            Ok(_) => Status::SUCCESS,
            Err(e) => e.status(),
        }
    }

    fn handle_warning<O>(self, op: O) -> Result<Output, ErrData>
    where
        O: FnOnce(Error<ErrData>) -> Result<Output, ErrData>,
    {
        match self {
            Err(err) if err.status().is_warning() => op(err),
            other => other,
        }
    }
}
