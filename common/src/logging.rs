//! Common logging initializer
//!

use eyre::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use tracing_tree::HierarchicalLayer;

/// Set up `tracing` for the whole program.
///
/// - `level` is the default filter, `RUST_LOG` wins when set,
/// - `use_tree` replaces the compact console output by the hierarchical one,
/// - `use_file` adds an hourly rolling file in that directory.
///
pub fn init_logging(
    name: &'static str,
    level: &str,
    use_tree: bool,
    use_file: Option<String>,
) -> Result<()> {
    // Load filters from environment
    //
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    // Do we want hierarchical output?
    //
    let (tree, compact) = if use_tree {
        let tree = HierarchicalLayer::new(2)
            .with_ansi(true)
            .with_span_retrace(true)
            .with_span_modes(true)
            .with_targets(true)
            .with_verbose_entry(true)
            .with_verbose_exit(true)
            .with_bracketed_fields(true)
            .with_writer(std::io::stderr);
        (Some(tree), None)
    } else {
        let compact = fmt::layer()
            .with_writer(std::io::stderr)
            .with_thread_names(true)
            .with_target(false)
            .compact();
        (None, Some(compact))
    };

    // Log to file?
    //
    let file = use_file.map(|dir| {
        // Basic append-only rolling file for all traces.
        //
        let file_appender = tracing_appender::rolling::hourly(dir, name);
        fmt::layer().with_ansi(false).with_writer(file_appender)
    });

    // Combine filters & exporters
    //
    tracing_subscriber::registry()
        .with(filter)
        .with(tree)
        .with(compact)
        .with(file)
        .try_init()?;

    Ok(())
}

/// Filter level from the `-D` and `-v` flags.
///
pub fn level_from(debug: bool, verbose: u8) -> &'static str {
    match (debug, verbose) {
        (_, v) if v >= 2 => "trace",
        (true, _) | (_, 1) => "debug",
        _ => "info",
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(false, 0, "info")]
    #[case(true, 0, "debug")]
    #[case(false, 1, "debug")]
    #[case(true, 2, "trace")]
    #[case(false, 3, "trace")]
    fn test_level_from(#[case] debug: bool, #[case] verbose: u8, #[case] want: &str) {
        assert_eq!(want, level_from(debug, verbose));
    }
}
