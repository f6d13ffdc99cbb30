use crate::config::TelemetryConfig;
use std::fmt;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
pub enum TelemetryError {
    EnvFilter { value: String, source: ParseError },
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::EnvFilter { value, .. } => {
                write!(
                    f,
                    "invalid log level/filter '{}': unable to build EnvFilter",
                    value
                )
            }
            TelemetryError::Subscriber(err) => write!(f, "telemetry error: {err}"),
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::EnvFilter { source, .. } => Some(source),
            TelemetryError::Subscriber(err) => Some(&**err),
        }
    }
}

/// Directives used when `RUST_LOG` is absent: the configured level for the
/// workflow crates, with HTTP plumbing held at `warn` so approval,
/// issuance, and settlement events stay readable at the console.
fn default_directives(level: &str) -> String {
    format!("{level},permit_flow={level},hyper=warn,tower=warn,mio=warn")
}

/// Install the process-wide subscriber. `RUST_LOG`, when set, wins over
/// the configured level wholesale.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let directives = default_directives(&config.log_level);
            EnvFilter::try_new(&directives).map_err(|source| TelemetryError::EnvFilter {
                value: directives,
                source,
            })?
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_keep_workflow_events_and_quiet_http_plumbing() {
        let directives = default_directives("debug");
        assert!(directives.starts_with("debug,permit_flow=debug"));
        assert!(directives.contains("hyper=warn"));
        assert!(directives.contains("tower=warn"));
    }

    #[test]
    fn a_bad_level_surfaces_the_offending_directives() {
        let directives = default_directives("notalevel");
        let source = EnvFilter::try_new(&directives).expect_err("level must not parse");
        let err = TelemetryError::EnvFilter {
            value: directives.clone(),
            source,
        };
        assert!(err.to_string().contains(&directives));
    }
}
