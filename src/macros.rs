/// Time exactly one operation with a [`Timer`](crate::timer::Timer).
///
/// Expands to `(value, nanoseconds)`. Only the expression itself sits between
/// the start and stop reads; bookkeeping belongs outside the macro.
#[macro_export]
macro_rules! timed {
    ($timer:expr, $op:expr) => {{
        $timer.start();
        let value = $op;
        let ns = $timer.stop();
        (value, ns)
    }};
}
