//! Reserved process exit codes
//!
//! Every other exit code a subprocess produces is the engine's own, passed
//! through unchanged. These two are stable and chosen from `sysexits.h` so
//! they cannot be confused with Chromium result codes.

/// The launch was malformed (missing or unreadable switch); the engine never started
pub const CONFIGURATION_ERROR: i32 = 78;

/// The engine failed without reporting an exit code of its own
pub const ENGINE_FAILURE: i32 = 70;
