use tracing::Level;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Target prefix shared by every Spool crate (`spool_types`, `spool_store`, ...).
pub const LOG_TARGET_PREFIX: &str = "spool";

/// Install a stderr subscriber showing Spool's debug output.
///
/// Returns `false` if a global subscriber was already set; that subscriber
/// is left in place.
pub fn init_debug_logging() -> bool {
    let filter = Targets::new().with_target(LOG_TARGET_PREFIX, Level::DEBUG);
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_filter(filter))
        .try_init()
        .is_ok()
}
