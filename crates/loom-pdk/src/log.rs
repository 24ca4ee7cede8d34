//! Logging through the host's `tracing` subscriber.
//!
//! Best effort: a failed host call drops the line.

use crate::sys;

fn emit(level: &str, message: &str) {
    let _ = unsafe { sys::loom_log(level.to_owned(), message.to_owned()) };
}

/// Log at debug level.
pub fn debug(message: impl AsRef<str>) {
    emit("debug", message.as_ref());
}

/// Log at info level.
pub fn info(message: impl AsRef<str>) {
    emit("info", message.as_ref());
}

/// Log at warn level.
pub fn warn(message: impl AsRef<str>) {
    emit("warn", message.as_ref());
}

/// Log at error level.
pub fn error(message: impl AsRef<str>) {
    emit("error", message.as_ref());
}
