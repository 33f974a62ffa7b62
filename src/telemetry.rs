use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins; otherwise `default_level` applies to this crate and
/// `tower_http`.
pub fn init(default_level: &str) {
    let fallback = format!("pond_relay={lvl},pond_trainer={lvl},tower_http={lvl}", lvl = default_level);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
