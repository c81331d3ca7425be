//! Runtime-adjustable logging.
//!
//! With diagnostics off only warnings and errors are printed; turning them on
//! lets debug and info through. `RUST_LOG`, when set, replaces the filter.

use lazy_static::lazy_static;
use log::LevelFilter;
use std::sync::atomic::{AtomicBool, Ordering};

lazy_static! {
    static ref DIAGNOSTICS_ENABLED: AtomicBool = AtomicBool::new(false);
}

/// Install the env_logger backend. Call once at startup.
pub fn init_logging(diagnostics: bool) {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(LevelFilter::Debug)
        .format_timestamp_millis()
        .format_module_path(false);

    let from_env = std::env::var("RUST_LOG").is_ok();
    if from_env {
        builder.parse_default_env();
    }

    if builder.try_init().is_err() {
        return;
    }

    if from_env {
        DIAGNOSTICS_ENABLED.store(diagnostics, Ordering::SeqCst);
    } else {
        set_diagnostics_enabled(diagnostics);
    }
}

/// Switch between debug output and warnings only
pub fn set_diagnostics_enabled(enabled: bool) {
    DIAGNOSTICS_ENABLED.store(enabled, Ordering::SeqCst);

    let level = if enabled {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    log::set_max_level(level);
    log::debug!("[DiagnosticLogger] Diagnostics enabled");
}

pub fn is_diagnostics_enabled() -> bool {
    DIAGNOSTICS_ENABLED.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle() {
        set_diagnostics_enabled(true);
        assert!(is_diagnostics_enabled());
        assert_eq!(log::max_level(), LevelFilter::Debug);
        set_diagnostics_enabled(false);
        assert!(!is_diagnostics_enabled());
        assert_eq!(log::max_level(), LevelFilter::Warn);
    }
}
