//! Logging shim for the library modules.
//!
//! With the `defmt` feature the macros forward to `defmt`. Host test
//! builds carry no logger; the arguments are still borrowed so bindings
//! that only feed a log line do not trip unused-variable lints.

#![allow(unused_macros)]

macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "defmt")]
            ::defmt::debug!($s $(, $x)*);
            #[cfg(not(feature = "defmt"))]
            { $( let _ = &$x; )* }
        }
    };
}

macro_rules! info {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "defmt")]
            ::defmt::info!($s $(, $x)*);
            #[cfg(not(feature = "defmt"))]
            { $( let _ = &$x; )* }
        }
    };
}

macro_rules! warn {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "defmt")]
            ::defmt::warn!($s $(, $x)*);
            #[cfg(not(feature = "defmt"))]
            { $( let _ = &$x; )* }
        }
    };
}

macro_rules! error {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "defmt")]
            ::defmt::error!($s $(, $x)*);
            #[cfg(not(feature = "defmt"))]
            { $( let _ = &$x; )* }
        }
    };
}

#[cfg(test)]
mod tests {
    #[test]
    #[deny(unused_variables)]
    fn log_arguments_count_as_used() {
        let bonded = true;
        let retries = 3u8;
        info!("pairing complete (bonded: {})", bonded);
        debug!("retry {}", retries,);
        error!("no arguments");
    }
}
