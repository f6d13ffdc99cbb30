use std::collections::BTreeSet;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::workflows::permit::domain::Department;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub workflow: WorkflowConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let workflow = match env::var("APP_MANDATORY_DEPARTMENTS") {
            Ok(raw) => WorkflowConfig::from_codes(&raw)?,
            Err(_) => WorkflowConfig::default(),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            workflow,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Workflow policy knobs; today only the mandatory compliance roster.
///
/// Ledger completeness is "every department in this set holds a terminal
/// entry", never a count threshold, so a waived (`required = false`) entry
/// still closes its department.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    pub mandatory_departments: BTreeSet<Department>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            mandatory_departments: Department::ALL.iter().copied().collect(),
        }
    }
}

impl WorkflowConfig {
    /// Parse a comma-separated roster such as `"PZO,OLBO,BFP,TRSY"`.
    pub fn from_codes(raw: &str) -> Result<Self, ConfigError> {
        let mut mandatory_departments = BTreeSet::new();
        for code in raw.split(',') {
            let code = code.trim();
            if code.is_empty() {
                continue;
            }
            let department = Department::from_code(code)
                .ok_or_else(|| ConfigError::UnknownDepartment {
                    code: code.to_string(),
                })?;
            mandatory_departments.insert(department);
        }

        if mandatory_departments.is_empty() {
            return Err(ConfigError::EmptyMandatoryRoster);
        }

        Ok(Self {
            mandatory_departments,
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    UnknownDepartment { code: String },
    EmptyMandatoryRoster,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::UnknownDepartment { code } => {
                write!(f, "APP_MANDATORY_DEPARTMENTS contains unknown code '{code}'")
            }
            ConfigError::EmptyMandatoryRoster => {
                write!(f, "APP_MANDATORY_DEPARTMENTS must name at least one department")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
