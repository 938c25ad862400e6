#[cfg(feature = "tracing")]
#[inline(always)]
pub fn __trace_write(args: std::fmt::Arguments) {
    if let Ok(mut tracer) = crate::snes::tracer::TRACER.lock() {
        tracer.write(args.to_string());
    }
}

#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        {
            $crate::snes::tracer::macros::__trace_write(format_args!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! trace_dump {
    () => {
        #[cfg(feature = "tracing")]
        {
            if let Ok(tracer) = $crate::snes::tracer::TRACER.lock() {
                tracer.print();
            }
        }
    };
}

#[macro_export]
macro_rules! trace_obj {
    ($obj:expr) => {
        #[cfg(feature = "tracing")]
        {
            if let Ok(mut tracer) = $crate::snes::tracer::TRACER.lock() {
                tracer.log($obj);
            }
        }
    };
}

#[macro_export]
macro_rules! trace_cpu_event {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        {
            $crate::snes::tracer::macros::__trace_write(
                format_args!("[CPU EVENT] {}", format_args!($($arg)*))
            );
        }
    };
}

#[macro_export]
macro_rules! trace_replay_event {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        {
            $crate::snes::tracer::macros::__trace_write(
                format_args!("[REPLAY] {}", format_args!($($arg)*))
            );
        }
    };
}
