//! Trace output for block-device and filesystem code under test
//!
//! [`bd_trace!`](crate::bd_trace) emits `path:line:trace: message` records
//! at trace level under the [`TARGET`] target. Where they end up is decided
//! by whichever logger the caller installed, e.g. `RUST_LOG=bdtest::trace`.

/// Log target of trace records.
pub const TARGET: &str = "bdtest::trace";

/// Emit one trace record tagged with the caller's file and line.
///
/// ```
/// use bdtest_lib::bd_trace;
///
/// let block = 3;
/// bd_trace!("bd_erase({:#x})", block);
/// ```
#[macro_export]
macro_rules! bd_trace {
    ($($arg:tt)+) => {
        $crate::__log::trace!(
            target: $crate::trace::TARGET,
            "{}:{}:trace: {}",
            file!(),
            line!(),
            format_args!($($arg)+)
        )
    };
}
