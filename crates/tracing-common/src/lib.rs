use color_eyre::eyre::WrapErr;
use tracing_subscriber::{
    EnvFilter, Layer as _, Registry, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

/// The filter used when `RUST_LOG` is not set.
pub fn default_filter(crate_name: &str) -> String {
    let target = crate_name.replace('-', "_");
    format!("info,{target}=debug,notebox=debug,tower_http=debug")
}

/// Builds the subscriber used by the notebox binaries without installing it.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Log filter (defaults to [`default_filter`])
/// - `JSON_LOGS`: If set, outputs one JSON object per event instead of the
///   human readable format
pub fn build_subscriber(
    crate_name: &str,
) -> color_eyre::Result<impl tracing::Subscriber + Send + Sync + 'static> {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter(crate_name));

    let env_filter = EnvFilter::builder().parse(&rust_log).wrap_err_with(|| {
        color_eyre::eyre::eyre!("Couldn't create env filter from {}", rust_log)
    })?;

    let stdout_layer = if std::env::var("JSON_LOGS").is_ok() {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stdout)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    };

    Ok(Registry::default().with(stdout_layer).with(env_filter))
}

/// Builds the subscriber and installs it as the process-wide default.
///
/// Only binaries call this, once, before anything else logs.
pub fn setup_tracing(crate_name: &str) -> color_eyre::Result<()> {
    build_subscriber(crate_name)?
        .try_init()
        .wrap_err("Failed to install tracing subscriber")?;

    Ok(())
}
