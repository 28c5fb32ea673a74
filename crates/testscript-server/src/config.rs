use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, str::FromStr, time::Duration};
use testscript_core::FhirVersion;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub fhir: FhirSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Upstream FHIR validation server endpoints
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // FHIR version validation
        if FhirVersion::from_str(&self.fhir.version).is_err() {
            return Err("fhir.version must be one of R4, R5".into());
        }
        // Upstream validation
        if self.upstream.timeout_ms == 0 {
            return Err("upstream.timeout_ms must be > 0".into());
        }
        for (name, endpoint) in [
            ("upstream.r4_endpoint", &self.upstream.r4_endpoint),
            ("upstream.r5_endpoint", &self.upstream.r5_endpoint),
        ] {
            if let Some(ep) = endpoint {
                url::Url::parse(ep).map_err(|e| format!("{name} is not a valid URL: {e}"))?;
            }
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }

    /// Default FHIR version when a request carries no `X-FHIR-Version` header.
    pub fn fhir_version(&self) -> FhirVersion {
        self.fhir.version.parse().unwrap_or_default()
    }

    /// Returns the base URL for the server.
    /// If `base_url` is configured, returns that; otherwise computes from host:port.
    pub fn base_url(&self) -> String {
        self.server
            .base_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.server.host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base URL for the server, used in links and responses.
    /// If not set, defaults to http://{host}:{port}
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: None,
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FhirSettings {
    #[serde(default = "default_fhir_version")]
    pub version: String,
}

fn default_fhir_version() -> String {
    "R5".into()
}

impl Default for FhirSettings {
    fn default() -> Self {
        Self {
            version: default_fhir_version(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Upstream FHIR validation server configuration.
///
/// Endpoints are optional: an unset endpoint means no upstream call is made
/// for that FHIR version and the local structural outcome is returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default)]
    pub r4_endpoint: Option<String>,
    #[serde(default)]
    pub r5_endpoint: Option<String>,
    /// Total budget for the single upstream attempt; there are no retries.
    #[serde(default = "default_upstream_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_upstream_timeout_ms() -> u64 {
    10_000
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            r4_endpoint: None,
            r5_endpoint: None,
            timeout_ms: default_upstream_timeout_ms(),
        }
    }
}

impl UpstreamConfig {
    pub fn endpoint(&self, version: FhirVersion) -> Option<&str> {
        match version {
            FhirVersion::R4 => self.r4_endpoint.as_deref(),
            FhirVersion::R5 => self.r5_endpoint.as_deref(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                // Try default root-level file
                let default_path = PathBuf::from("testscript.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., TESTSCRIPT__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("TESTSCRIPT")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        // Validate
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.fhir_version(), FhirVersion::R5);
        assert_eq!(cfg.upstream.timeout_ms, 10_000);
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.server.port = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.logging.level = "verbose".into();
        assert!(cfg.validate().unwrap_err().contains("logging.level"));
    }

    #[test]
    fn unknown_fhir_version_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.fhir.version = "STU3".into();
        assert!(cfg.validate().unwrap_err().contains("fhir.version"));
    }

    #[test]
    fn invalid_upstream_endpoint_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.upstream.r5_endpoint = Some("not a url".into());
        assert!(cfg.validate().unwrap_err().contains("r5_endpoint"));
    }

    #[test]
    fn zero_upstream_timeout_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.upstream.timeout_ms = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn endpoint_selection_follows_fhir_version() {
        let cfg = UpstreamConfig {
            r4_endpoint: Some("http://r4.example/validate".into()),
            r5_endpoint: Some("http://r5.example/validate".into()),
            timeout_ms: 10_000,
        };
        assert_eq!(
            cfg.endpoint(FhirVersion::R4),
            Some("http://r4.example/validate")
        );
        assert_eq!(
            cfg.endpoint(FhirVersion::R5),
            Some("http://r5.example/validate")
        );
    }

    #[test]
    fn base_url_prefers_configured_value() {
        let mut cfg = AppConfig::default();
        assert_eq!(cfg.base_url(), "http://0.0.0.0:8080");
        cfg.server.base_url = Some("https://validator.example.org".into());
        assert_eq!(cfg.base_url(), "https://validator.example.org");
    }
}
