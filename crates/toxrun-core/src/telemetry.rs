//! Tracing initialisation for the toxrun binary.
//!
//! Logs always go to stderr so the JSON report can own stdout.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Crates whose events are shown at the chosen verbosity; everything else
/// is limited to warnings unless `RUST_LOG` says otherwise.
const TOXRUN_TARGETS: &[&str] = &["toxrun", "toxrun_core", "toxrun_jobs"];

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    /// Newline-delimited JSON, with the current run span attached.
    Json,
}

/// Filter directives used when `RUST_LOG` is unset.
fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    std::iter::once("warn".to_string())
        .chain(TOXRUN_TARGETS.iter().map(|target| format!("{target}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber. Returns false if one was already set.
pub fn init_tracing(format: LogFormat, verbose: bool) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    let base = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let output = match format {
        LogFormat::Text => base.compact().boxed(),
        LogFormat::Json => base.json().with_current_span(true).with_span_list(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_scope_toxrun_crates() {
        assert_eq!(
            default_directives(false),
            "warn,toxrun=info,toxrun_core=info,toxrun_jobs=info"
        );
        assert!(default_directives(true).contains("toxrun_jobs=debug"));
    }

    #[test]
    fn test_second_init_is_rejected() {
        let _ = init_tracing(LogFormat::Text, false);
        assert!(!init_tracing(LogFormat::Json, true));
        tracing::warn!("still logging");
    }
}
