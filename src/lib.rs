pub mod config;
pub mod models;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

pub use config::{load_config, load_or_default, IngestConfig};
pub use models::{EdgeId, Grain, Part, SourceMethod};
pub use pipeline::processor::{ingest, IngestInput, IngestReport, Ingestor};

/// Install the fmt subscriber. `RUST_LOG` wins over the default filter.
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();

    tracing::debug!("{} v{} tracing ready", config::APP_NAME, config::APP_VERSION);
}
