//! Verbosity-gated tracing for simulation runs.
//!
//! `SimulationConfig::verbosity` decides how much a run reports. Each macro
//! takes that verbosity as its first argument and only reaches `tracing` once
//! the threshold is met; the embedding application's subscriber decides where
//! the events end up.
//!
//! | verbosity | macro | tracing level | reports |
//! |---|---|---|---|
//! | 1 | `log_changes!` | INFO | run start and the root's final summary |
//! | 2 | `log_checks!` | DEBUG | missed deadlines that stop later siblings in a sequence |
//! | 3 | `log_debug!` | TRACE | every iteration's root value, parallel due date tightening |

pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_CHANGES: u8 = 1;
pub const VERBOSITY_CHECKS: u8 = 2;
pub const VERBOSITY_DEBUG: u8 = 3;

/// Whether a run at `verbosity` reports events of `threshold`.
#[inline]
pub fn enabled(verbosity: u8, threshold: u8) -> bool {
    threshold > VERBOSITY_SILENT && verbosity >= threshold
}

#[macro_export]
macro_rules! log_changes {
    ($verbosity:expr, $($arg:tt)*) => {
        if $crate::logging::enabled($verbosity, $crate::logging::VERBOSITY_CHANGES) {
            ::tracing::info!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_checks {
    ($verbosity:expr, $($arg:tt)*) => {
        if $crate::logging::enabled($verbosity, $crate::logging::VERBOSITY_CHECKS) {
            ::tracing::debug!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        if $crate::logging::enabled($verbosity, $crate::logging::VERBOSITY_DEBUG) {
            ::tracing::trace!($($arg)*);
        }
    };
}
