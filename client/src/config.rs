//! Client configuration as read from code or a TOML file.
//!
//! Every field is optional at this boundary. Defaults are applied by the accessor
//! methods and by [`crate::resolved::ResolvedConfig`].

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// URL scheme used to reach the configuration service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    #[default]
    Https,
}

impl Protocol {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(ConfigError::Invalid(format!(
                "unsupported protocol '{other}', expected http or https"
            ))),
        }
    }
}

/// Constructor options for [`crate::RcmClient`].
///
/// Maps to the top level of `~/.rcm/config.toml`. The camelCase spellings used by
/// older clients (`appId`, `appSecret`, `configName`) are accepted as aliases.
#[derive(Clone, Default, Deserialize)]
pub struct ClientConfig {
    /// Service host. Default: `config.remosi.net`.
    pub server: Option<String>,

    /// Default: https.
    pub protocol: Option<Protocol>,

    /// Explicit port. Omitted from the URL when unset.
    pub port: Option<u16>,

    /// Bearer token. Takes precedence over app credentials.
    pub token: Option<String>,

    #[serde(alias = "appId")]
    pub app_id: Option<String>,

    #[serde(alias = "appSecret")]
    pub app_secret: Option<String>,

    /// Decode `FORMAT: JSON`/`FORMAT: YAML` content. Default: true.
    pub decode: Option<bool>,

    /// Configuration loaded by [`crate::RcmClient::load_default`].
    #[serde(alias = "configName")]
    pub config_name: Option<String>,

    /// Whole-request timeout in seconds. Default: 30.
    pub timeout_seconds: Option<u32>,

    /// User-Agent header. Default: `rcm-client/<version>`.
    pub user_agent: Option<String>,
}

// Manual Debug impl to prevent leaking credentials in logs.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn mask(opt: Option<&String>) -> &'static str {
            if opt.is_some() { "[REDACTED]" } else { "None" }
        }
        f.debug_struct("ClientConfig")
            .field("server", &self.server)
            .field("protocol", &self.protocol)
            .field("port", &self.port)
            .field("token", &mask(self.token.as_ref()))
            .field("app_id", &self.app_id)
            .field("app_secret", &mask(self.app_secret.as_ref()))
            .field("decode", &self.decode)
            .field("config_name", &self.config_name)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl ClientConfig {
    pub const DEFAULT_SERVER: &'static str = "config.remosi.net";

    pub const DEFAULT_TIMEOUT_SECONDS: u32 = 30;

    #[must_use]
    pub fn server(&self) -> &str {
        self.server
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(Self::DEFAULT_SERVER)
    }

    #[must_use]
    pub fn protocol(&self) -> Protocol {
        self.protocol.unwrap_or_default()
    }

    #[must_use]
    pub fn decode(&self) -> bool {
        self.decode.unwrap_or(true)
    }

    #[must_use]
    pub fn timeout_seconds(&self) -> u32 {
        self.timeout_seconds
            .filter(|s| *s > 0)
            .unwrap_or(Self::DEFAULT_TIMEOUT_SECONDS)
    }

    /// Load `~/.rcm/config.toml`. Returns `Ok(None)` when no file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = Self::path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    /// Load a TOML config file, expanding `${VAR}` references in credential fields.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        let mut config: Self = match toml::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                return Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        for field in [&mut config.token, &mut config.app_id, &mut config.app_secret] {
            if let Some(value) = field.as_mut() {
                *value = expand_env_vars(value);
            }
        }

        Ok(config)
    }

    /// Default config file location, `~/.rcm/config.toml`.
    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".rcm").join("config.toml"))
}

/// Replace `${VAR}` with the value of environment variable `VAR` (empty if unset).
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&std::env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_when_unset() {
        let config = ClientConfig::default();
        assert_eq!(config.server(), "config.remosi.net");
        assert_eq!(config.protocol(), Protocol::Https);
        assert!(config.decode());
        assert_eq!(config.timeout_seconds(), 30);
    }

    #[test]
    fn default_path_is_under_home_dot_rcm() {
        if let Some(path) = ClientConfig::path() {
            assert!(path.ends_with(".rcm/config.toml"));
            assert_eq!(Some(path), config_path());
        }
    }

    #[test]
    fn blank_server_falls_back_to_default() {
        let config = ClientConfig {
            server: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(config.server(), ClientConfig::DEFAULT_SERVER);
    }

    #[test]
    fn protocol_parses_case_insensitively() {
        assert_eq!("HTTP".parse::<Protocol>().unwrap(), Protocol::Http);
        assert_eq!("https".parse::<Protocol>().unwrap(), Protocol::Https);
        assert!("ftp".parse::<Protocol>().is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = ClientConfig {
            token: Some("tok-123".to_string()),
            app_secret: Some("s3cret".to_string()),
            ..Default::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("tok-123"));
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn expand_env_vars_no_vars() {
        assert_eq!(expand_env_vars("plain"), "plain");
    }

    #[test]
    fn expand_env_vars_single_var() {
        unsafe {
            std::env::set_var("RCM_TEST_EXPAND_TOKEN", "abc");
        }
        assert_eq!(expand_env_vars("Bearer ${RCM_TEST_EXPAND_TOKEN}!"), "Bearer abc!");
        unsafe {
            std::env::remove_var("RCM_TEST_EXPAND_TOKEN");
        }
    }

    #[test]
    fn expand_env_vars_missing_var_becomes_empty() {
        unsafe {
            std::env::remove_var("RCM_TEST_MISSING_VAR");
        }
        assert_eq!(expand_env_vars("a${RCM_TEST_MISSING_VAR}b"), "ab");
    }

    #[test]
    fn expand_env_vars_unclosed_brace_preserved() {
        assert_eq!(expand_env_vars("x ${OPEN"), "x ${OPEN");
    }

    #[test]
    fn load_from_reads_toml_with_aliases() {
        unsafe {
            std::env::set_var("RCM_TEST_FILE_SECRET", "from-env");
        }
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
server = "config01.remosi.net"
protocol = "http"
port = 8080
appId = "app-1"
appSecret = "${{RCM_TEST_FILE_SECRET}}"
configName = "checkout"
decode = false
"#
        )
        .unwrap();

        let config = ClientConfig::load_from(file.path()).unwrap();
        assert_eq!(config.server(), "config01.remosi.net");
        assert_eq!(config.protocol(), Protocol::Http);
        assert_eq!(config.port, Some(8080));
        assert_eq!(config.app_id.as_deref(), Some("app-1"));
        assert_eq!(config.app_secret.as_deref(), Some("from-env"));
        assert_eq!(config.config_name.as_deref(), Some("checkout"));
        assert!(!config.decode());
        unsafe {
            std::env::remove_var("RCM_TEST_FILE_SECRET");
        }
    }

    #[test]
    fn load_from_reports_parse_errors_with_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();

        let err = ClientConfig::load_from(file.path()).unwrap_err();
        match err {
            ConfigError::Parse { path, .. } => assert_eq!(path, file.path()),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn load_from_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientConfig::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
