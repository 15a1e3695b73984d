//! Shared helpers for the workspace's tests.

pub use insta;
pub use tracing::Level;
use tracing::{
    level_filters::LevelFilter,
    subscriber::{set_default, DefaultGuard},
    Subscriber,
};
use tracing_subscriber::{fmt::TestWriter, layer::SubscriberExt, EnvFilter};
use tracing_tree::HierarchicalLayer;

/// Filter used by [`setup_resolver_tracing`] when `RUST_LOG` is not set.
pub const RESOLVER_FILTER: &str = "resolver=trace,memo=debug";

/// Installs a tree-shaped subscriber for the current thread, keeping events
/// at `level` and above. Logging stops when the guard is dropped.
pub fn setup_tracing(level: Level) -> DefaultGuard {
    set_default(test_subscriber().with(LevelFilter::from_level(level)))
}

pub fn setup_tracing_with_filter(filter: &str) -> DefaultGuard {
    set_default(test_subscriber().with(EnvFilter::new(filter)))
}

/// Resolver and memo events, or whatever `RUST_LOG` asks for.
pub fn setup_resolver_tracing() -> DefaultGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(RESOLVER_FILTER));
    set_default(test_subscriber().with(filter))
}

fn test_subscriber() -> impl Subscriber + Send + Sync {
    // `TestWriter` goes through the test harness, so output is only shown
    // for failing tests.
    tracing_subscriber::registry().with(
        HierarchicalLayer::new(2)
            .with_targets(true)
            .with_indent_lines(true)
            .with_bracketed_fields(true)
            .with_ansi(false)
            .with_writer(TestWriter::new()),
    )
}
