// logging.rs — tracing subscriber setup for the binary
//
// `RUST_LOG` selects the filter; the default is `info`. Output goes to stderr
// so a launched workload keeps stdout to itself.

use tracing_subscriber::EnvFilter;

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A second initialisation (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
