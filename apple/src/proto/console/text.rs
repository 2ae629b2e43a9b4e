// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text output.

use crate::{unsafe_protocol, Result, ResultExt, Status, StatusExt};
use apple_raw::protocol::console::SimpleTextOutputProtocol;
use apple_raw::Char16;
use core::fmt;

/// Interface for text-based output devices.
///
/// It implements the fmt::Write trait, so you can use it to print text with
/// standard Rust constructs like the `write!()` and `writeln!()` macros.
#[derive(Debug)]
#[repr(transparent)]
pub struct Output(SimpleTextOutputProtocol);

unsafe_protocol!(Output, SimpleTextOutputProtocol::GUID);

impl Output {
    /// Resets and clears the text output device hardware.
    pub fn reset(&mut self, extended: bool) -> Result {
        unsafe { (self.0.reset)(&mut self.0, extended.into()) }.to_result()
    }

    /// Clears the output screen.
    ///
    /// The background is set to the current background color.
    /// The cursor is moved to (0, 0).
    pub fn clear(&mut self) -> Result {
        unsafe { (self.0.clear_screen)(&mut self.0) }.to_result()
    }

    /// Writes a NUL-terminated UCS-2 string to the output device. Characters
    /// that cannot be rendered are silently skipped.
    ///
    /// # Errors
    ///
    /// * `Status::INVALID_PARAMETER` `text` is not NUL-terminated.
    /// * `Status::DEVICE_ERROR` The device reported an error.
    pub fn output_ucs2(&mut self, text: &[Char16]) -> Result {
        if text.last() != Some(&0) {
            return Err(Status::INVALID_PARAMETER.into());
        }

        unsafe { (self.0.output_string)(&mut self.0, text.as_ptr()) }
            .to_result()
            .handle_warning(|err| {
                if err.status() == Status::WARN_UNKNOWN_GLYPH {
                    Ok(())
                } else {
                    Err(err)
                }
            })
    }
}

impl fmt::Write for Output {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // Allocate a small buffer on the stack.
        const BUF_SIZE: usize = 128;
        // Add 1 extra character for the null terminator.
        let mut buf = [0u16; BUF_SIZE + 1];

        let mut i = 0;

        // Writes the local buffer to the output and resets the buffer.
        let mut flush_buffer = |buf: &mut [u16], i: &mut usize| {
            buf[*i] = 0;
            let codes = &buf[..=*i];
            *i = 0;

            self.output_ucs2(codes).map_err(|_| fmt::Error)
        };

        // Converts a character to UCS-2 and adds it to the buffer, flushing
        // it as necessary.
        let mut add_char = |ch| {
            buf[i] = ch;
            i += 1;

            if i == BUF_SIZE {
                flush_buffer(&mut buf, &mut i).map_err(|_| ucs2::Error::BufferOverflow)
            } else {
                Ok(())
            }
        };

        // Firmware consoles expect CR LF line endings.
        let add_ch = |ch| {
            if ch == '\n' as u16 {
                add_char('\r' as u16)?;
            }
            add_char(ch)
        };

        ucs2::encode_with(s, add_ch).map_err(|_| fmt::Error)?;

        flush_buffer(&mut buf, &mut i)
    }
}
