#![forbid(unsafe_code)]

//! Logging macros and optional subscriber setup.
//!
//! vmbind logs through `tracing`. Library code only emits events; hosts pick
//! the subscriber. With the `tracing-json` feature, [`init_json`] installs a
//! JSON formatter filtered by the `VMBIND_LOG` environment variable
//! (falling back to `warn`).

pub use tracing::{debug, error, info, trace, warn};

/// Environment variable holding the `EnvFilter` directives for [`init_json`].
pub const LOG_ENV_VAR: &str = "VMBIND_LOG";

/// Install a global JSON subscriber.
///
/// Returns an error if a global subscriber is already set.
#[cfg(feature = "tracing-json")]
pub fn init_json() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init()
}
