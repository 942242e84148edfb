use lazy_static::lazy_static;
use std::time::Instant;

lazy_static! {
    /// Process start reference for the elapsed-time prefix of log lines.
    pub static ref LOG_EPOCH: Instant = Instant::now();
}

#[doc(hidden)]
#[macro_export]
macro_rules! log_line {
    ($lvl:expr, $($arg:tt)*) => {
        eprintln!(
            "[{:>10.4}][{}][{}:{}] {}",
            $crate::logger::LOG_EPOCH.elapsed().as_secs_f64(),
            $lvl,
            file!(),
            line!(),
            format_args!($($arg)*)
        )
    };
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "log_trace")]
        $crate::log_line!("TRACE", $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "log_debug")]
        $crate::log_line!("DEBUG", $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "log_info")]
        $crate::log_line!("INFO", $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "log_warn")]
        $crate::log_line!("WARN", $($arg)*);
    }};
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{
        #[cfg(feature = "log_error")]
        $crate::log_line!("ERROR", $($arg)*);
    }};
}
