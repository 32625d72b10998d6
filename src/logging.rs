//! Runtime log-level gate in front of `defmt`.
//!
//! `defmt` filters at compile time (`DEFMT_LOG`); firmware often wants to silence
//! the per-frame traffic logs at runtime too. Every log statement of the crate goes
//! through the macros below, which first check the level set with [`set_log_level`].
//! Without the `defmt` feature the macros still type-check their arguments and
//! compile to nothing.
use core::sync::atomic::{AtomicU8, Ordering};

/// Verbosity levels, ordered from silent to most verbose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum LogLevel {
    None = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LogLevel::None,
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Set the maximum level emitted by the adapter.
pub fn set_log_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Current maximum level.
pub fn log_level() -> LogLevel {
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Returns `true` when messages at `level` are currently emitted.
#[inline]
pub fn enabled(level: LogLevel) -> bool {
    level != LogLevel::None && level <= log_level()
}

#[doc(hidden)]
#[inline(always)]
pub fn discard(_args: core::fmt::Arguments<'_>) {}

#[allow(unused_macros)]
macro_rules! log_at {
    ($level:ident, $defmt_macro:ident, $($arg:tt)+) => {
        if $crate::logging::enabled($crate::logging::LogLevel::$level) {
            #[cfg(feature = "defmt")]
            defmt::$defmt_macro!($($arg)+);
            #[cfg(not(feature = "defmt"))]
            $crate::logging::discard(core::format_args!($($arg)+));
        }
    };
}

#[allow(unused_macros)]
macro_rules! error {
    ($($arg:tt)+) => { log_at!(Error, error, $($arg)+) };
}

#[allow(unused_macros)]
macro_rules! warn {
    ($($arg:tt)+) => { log_at!(Warn, warn, $($arg)+) };
}

#[allow(unused_macros)]
macro_rules! info {
    ($($arg:tt)+) => { log_at!(Info, info, $($arg)+) };
}

#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)+) => { log_at!(Debug, debug, $($arg)+) };
}

#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)+) => { log_at!(Trace, trace, $($arg)+) };
}
