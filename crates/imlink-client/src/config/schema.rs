use std::time::Duration;

use imlink_core::error::{ImLinkError, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub login: LoginSection,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            login: LoginSection::default(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(ImLinkError::UnsupportedVersion);
        }
        self.server.validate()?;
        self.login.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Full websocket URL; takes precedence over host/port.
    #[serde(default)]
    pub url: Option<String>,

    /// Client ping interval, 0 = off.
    #[serde(default)]
    pub keepalive_ms: u64,

    /// How long to wait for the peer to answer our close frame.
    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            url: None,
            keepalive_ms: 0,
            close_timeout_ms: default_close_timeout_ms(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        if self.url.is_none() {
            if self.host.trim().is_empty() {
                return Err(ImLinkError::Config("server.host must not be empty".into()));
            }
            if self.port == 0 {
                return Err(ImLinkError::Config("server.port must not be 0".into()));
            }
        }
        if self.keepalive_ms != 0 && !(1000..=120000).contains(&self.keepalive_ms) {
            return Err(ImLinkError::Config(
                "server.keepalive_ms must be 0 or between 1000 and 120000".into(),
            ));
        }
        if !(100..=60000).contains(&self.close_timeout_ms) {
            return Err(ImLinkError::Config(
                "server.close_timeout_ms must be between 100 and 60000".into(),
            ));
        }
        Ok(())
    }

    /// Target URL: explicit `url`, else `ws://host:port`.
    pub fn url(&self) -> String {
        match &self.url {
            Some(u) => u.clone(),
            None => format!("ws://{}:{}", self.host, self.port),
        }
    }

    pub fn keepalive(&self) -> Option<Duration> {
        (self.keepalive_ms > 0).then(|| Duration::from_millis(self.keepalive_ms))
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    12345
}
fn default_close_timeout_ms() -> u64 {
    3000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginSection {
    /// Login round-trip deadline, 0 = wait indefinitely.
    #[serde(default)]
    pub timeout_ms: u64,

    #[serde(default = "default_failure_message")]
    pub failure_message: String,

    #[serde(default = "default_username")]
    pub default_username: String,
}

impl Default for LoginSection {
    fn default() -> Self {
        Self {
            timeout_ms: 0,
            failure_message: default_failure_message(),
            default_username: default_username(),
        }
    }
}

impl LoginSection {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms != 0 && !(1000..=300000).contains(&self.timeout_ms) {
            return Err(ImLinkError::Config(
                "login.timeout_ms must be 0 or between 1000 and 300000".into(),
            ));
        }
        if self.default_username.trim().is_empty() {
            return Err(ImLinkError::Config("login.default_username must not be empty".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

fn default_failure_message() -> String {
    "login failed".into()
}
fn default_username() -> String {
    "User".into()
}
