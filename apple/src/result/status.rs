// SPDX-License-Identifier: MIT OR Apache-2.0

use super::Result;

pub use apple_raw::Status;

/// Converts the status returned by a protocol function into a [`Result`].
pub trait StatusExt {
    /// `Ok(())` on success, otherwise the status as an [`Error`].
    ///
    /// [`Error`]: crate::Error
    fn to_result(self) -> Result;

    /// Like [`to_result`], producing `val` only on success.
    ///
    /// [`to_result`]: Self::to_result
    fn to_result_with_val<T>(self, val: impl FnOnce() -> T) -> Result<T>;
}

impl StatusExt for Status {
    #[inline]
    fn to_result(self) -> Result {
        self.to_result_with_val(|| ())
    }

    #[inline]
    fn to_result_with_val<T>(self, val: impl FnOnce() -> T) -> Result<T> {
        if self.is_success() {
            Ok(val())
        } else {
            Err(self.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_to_result() {
        assert!(Status::SUCCESS.to_result().is_ok());
        assert!(Status::NOT_FOUND.to_result().is_err());
        assert!(Status::WARN_STALE_DATA.to_result().is_err());

        assert_eq!(Status::SUCCESS.to_result_with_val(|| 3000).unwrap(), 3000);
        assert_eq!(
            Status::OUT_OF_RESOURCES
                .to_result_with_val(|| 3000)
                .unwrap_err()
                .status(),
            Status::OUT_OF_RESOURCES
        );
    }
}
