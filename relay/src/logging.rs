use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber
///
/// Logs go to stderr so stdout carries only the model's answer. `RUST_LOG`
/// overrides the `info` default.
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if json {
        tracing_subscriber::registry().with(filter).with(fmt_layer.json()).init();
    } else {
        tracing_subscriber::registry().with(filter).with(fmt_layer).init();
    }
}
