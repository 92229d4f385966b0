use crate::error::Error;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const FTP_CONFIG_FILE: &str = ".ftp_config";
pub const EMAIL_CONFIG_FILE: &str = ".email_config";

/// Reads a `KEY=VALUE` file. Quotes around values and `#` comment lines are
/// ignored. `None` when the file cannot be read.
#[must_use]
pub fn read_key_values(path: &Path) -> Option<HashMap<String, String>> {
    let content = fs::read_to_string(path).ok()?;
    let mut map = HashMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            let key = k.trim();
            let val = v.trim().trim_matches('"');
            map.insert(key.to_string(), val.to_string());
        }
    }

    Some(map)
}

/// Where the watched tree lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// `host:port` of an FTP server.
    Ftp { addr: String },
    /// A locally mounted copy of the drop.
    Local(PathBuf),
}

impl Source {
    /// Accepts `ftp://host[:port][/]` or a local directory path.
    pub fn parse(value: &str) -> Result<Self, Error> {
        if let Some(rest) = value.strip_prefix("ftp://") {
            let host = rest.trim_end_matches('/');
            if host.is_empty() || host.contains('/') {
                return Err(Error::Config(format!(
                    "expected ftp://host[:port], got {value:?} (use --root for the path)"
                )));
            }
            let addr = if host.contains(':') {
                host.to_string()
            } else {
                format!("{host}:21")
            };
            return Ok(Source::Ftp { addr });
        }

        let path = PathBuf::from(value);
        if !path.is_dir() {
            return Err(Error::Config(format!("{value:?} is not a directory")));
        }
        Ok(Source::Local(path))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpCredentials {
    pub user: String,
    pub pass: String,
}

impl Default for FtpCredentials {
    fn default() -> Self {
        Self {
            user: "anonymous".to_string(),
            pass: "anonymous".to_string(),
        }
    }
}

impl FtpCredentials {
    /// Falls back to anonymous login when the file or a key is missing.
    #[must_use]
    pub fn load(config_dir: &Path) -> Self {
        let Some(map) = read_key_values(&config_dir.join(FTP_CONFIG_FILE)) else {
            return Self::default();
        };
        let defaults = Self::default();
        Self {
            user: map.get("FTP_USER").cloned().unwrap_or(defaults.user),
            pass: map.get("FTP_PASS").cloned().unwrap_or(defaults.pass),
        }
    }
}
