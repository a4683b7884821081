//! Debug assertion facility
//!
//! Kernel preconditions are programming errors, not runtime conditions.
//! With `debug-check` enabled a violated condition is logged and halts
//! (the release profile aborts on panic). Without it the check compiles
//! away and the caller owns the consequences.
//!
//! Author: Moroya Sakamoto

/// Halt if `cond` is false (feature `debug-check`)
#[cfg(feature = "debug-check")]
#[macro_export]
macro_rules! mss_check {
    ($cond:expr, $($arg:tt)+) => {
        if !($cond) {
            $crate::__log::error!("mss check failed: {}: {}", stringify!($cond), format_args!($($arg)+));
            panic!("mss check failed: {}", stringify!($cond));
        }
    };
}

/// Compiled out: type-checks the condition, never evaluates it
#[cfg(not(feature = "debug-check"))]
#[macro_export]
macro_rules! mss_check {
    ($cond:expr, $($arg:tt)+) => {
        if false {
            let _ = ($cond, ::core::format_args!($($arg)+));
        }
    };
}
