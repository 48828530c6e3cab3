pub mod config;
pub mod pipeline;
pub mod pipeline_config;

use tracing_subscriber::EnvFilter;

pub use pipeline::extraction::{reconstruct, LayoutReconstructor, OcrDocument};
pub use pipeline::record::PayslipRecord;
pub use pipeline::structuring::{sanitize_and_parse, ParsingError};
pub use pipeline::validation::{validate, ValidationIssue, ValidationOutcome};

/// Install the global tracing subscriber.
///
/// Reads `RUST_LOG`, falling back to `config::default_log_filter()`. Logs go
/// to stderr so stdout stays free for results. A second call is a no-op.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .try_init();

    tracing::debug!("{} v{} logging initialised", config::APP_NAME, config::APP_VERSION);
}
