// SPDX-License-Identifier: MIT OR Apache-2.0

use super::Status;
use core::fmt::{Debug, Display};

/// A failed operation: the [`Status`] it reports and an optional payload,
/// such as the key count a too-small buffer would have needed.
#[derive(Debug, PartialEq, Eq)]
pub struct Error<Data: Debug = ()> {
    status: Status,
    data: Data,
}

impl<Data: Debug> Error<Data> {
    /// Create an `Error`.
    ///
    /// # Panics
    ///
    /// Panics if `status` is [`Status::SUCCESS`].
    pub const fn new(status: Status, data: Data) -> Self {
        assert!(!matches!(status, Status::SUCCESS));
        Self { status, data }
    }

    /// Get error `Status`.
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Get error data.
    pub const fn data(&self) -> &Data {
        &self.data
    }

    /// The same error without its payload.
    pub const fn to_err_without_payload(&self) -> Error<()> {
        Error {
            status: self.status,
            data: (),
        }
    }
}

impl From<Status> for Error<()> {
    fn from(status: Status) -> Self {
        Self::new(status, ())
    }
}

impl<Data: Debug> Display for Error<Data> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {:?}", self.status, self.data)
    }
}

impl<Data: Debug> core::error::Error for Error<Data> {}
