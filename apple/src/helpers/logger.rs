// SPDX-License-Identifier: MIT OR Apache-2.0

//! A [`log`] implementation writing to a firmware text console.
//!
//! The drivers in this crate report what they parse and register through
//! the `log` facade. Loading this logger makes those messages visible on the
//! console handed to [`init`].
//!
//! Messages are converted from UTF-8 to UCS-2 on the fly; characters the
//! console cannot render are skipped.

use crate::proto::console::text::Output;
use crate::{Result, Status};
use core::fmt::{self, Write};
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

/// Global logger object
static LOGGER: Logger = Logger::new();

/// Routes the `log` facade to `output`.
///
/// # Safety
///
/// `output` must stay valid until [`disable`] is called, and [`disable`]
/// must be called before boot services are exited.
///
/// # Errors
///
/// * `Status::ALREADY_STARTED` Another logger is already installed.
pub unsafe fn init(output: *mut Output) -> Result {
    unsafe { LOGGER.set_output(output) };

    log::set_logger(&LOGGER).map_err(|_| Status::ALREADY_STARTED)?;
    log::set_max_level(log::STATIC_MAX_LEVEL);
    Ok(())
}

/// Stops writing to the console passed to [`init`].
pub fn disable() {
    LOGGER.disable();
}

/// Logging implementation which writes to a text output console.
///
/// If this logger is used as a global logger, you must disable it using the
/// `disable` method before exiting boot services in order to prevent
/// undefined behaviour from inadvertent logging.
#[derive(Debug)]
pub struct Logger {
    writer: AtomicPtr<Output>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger {
    /// Creates a new logger.
    ///
    /// The logger is initially disabled. Call [`set_output`] to enable it.
    ///
    /// [`set_output`]: Self::set_output
    #[must_use]
    pub const fn new() -> Self {
        Self {
            writer: AtomicPtr::new(ptr::null_mut()),
        }
    }

    fn output(&self) -> *mut Output {
        self.writer.load(Ordering::Acquire)
    }

    /// Set the [`Output`] to which the logger will write.
    ///
    /// If a null pointer is passed for `output`, this method is equivalent to
    /// calling [`disable`].
    ///
    /// # Safety
    ///
    /// The `output` pointer must either be null or point to a valid [`Output`]
    /// object. That object must remain valid until the logger is either
    /// disabled, or `set_output` is called with a different `output`.
    ///
    /// [`disable`]: Self::disable
    pub unsafe fn set_output(&self, output: *mut Output) {
        self.writer.store(output, Ordering::Release);
    }

    /// Disable the logger.
    pub fn disable(&self) {
        unsafe { self.set_output(ptr::null_mut()) }
    }
}

impl log::Log for Logger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if let Some(writer) = unsafe { self.output().as_mut() } {
            // Logging failures have nowhere to be reported.
            let _ = DecoratedLog::write(
                writer,
                record.level(),
                record.args(),
                record.file().unwrap_or("<unknown file>"),
                record.line().unwrap_or(0),
            );
        }
    }

    fn flush(&self) {}
}

// Boot services run on a single processor.
unsafe impl Sync for Logger {}
unsafe impl Send for Logger {}

/// Writer wrapper which prints a log level in front of every line of text.
///
/// `fmt::Arguments` can only be handed to a `fmt::Write` implementation, so
/// the decoration is injected there instead of formatting into a buffer.
struct DecoratedLog<'writer, 'a, W: fmt::Write> {
    writer: &'writer mut W,
    log_level: log::Level,
    at_line_start: bool,
    file: &'a str,
    line: u32,
}

impl<'writer, 'a, W: fmt::Write> DecoratedLog<'writer, 'a, W> {
    fn write(
        writer: &'writer mut W,
        log_level: log::Level,
        args: &fmt::Arguments,
        file: &'a str,
        line: u32,
    ) -> fmt::Result {
        let mut decorated_writer = Self {
            writer,
            log_level,
            at_line_start: true,
            file,
            line,
        };
        writeln!(decorated_writer, "{}", *args)
    }
}

impl<W: fmt::Write> fmt::Write for DecoratedLog<'_, '_, W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut lines = s.lines();

        // Only the start of a line of output gets the prefix.
        let first = lines.next().unwrap_or("");
        if self.at_line_start {
            write!(
                self.writer,
                "[{:>5}]: {:>12}@{:03}: ",
                self.log_level, self.file, self.line
            )?;
            self.at_line_start = false;
        }
        write!(self.writer, "{first}")?;

        for line in lines {
            let level = self.log_level;
            write!(self.writer, "\n{level}: {line}")?;
        }

        // `lines` swallows a trailing newline.
        if let Some('\n') = s.chars().next_back() {
            writeln!(self.writer)?;
            self.at_line_start = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;

    #[test]
    fn test_decorated_lines() {
        let mut out = String::new();
        DecoratedLog::write(
            &mut out,
            log::Level::Info,
            &format_args!("partition 2\nApple_HFS"),
            "apple.rs",
            7,
        )
        .unwrap();
        assert_eq!(
            out,
            "[ INFO]:     apple.rs@007: partition 2\nINFO: Apple_HFS\n"
        );
    }
}
