use crate::config::FtpCredentials;
use crate::error::TransportError;
use crate::transport::{Connector, RemoteDir};
use crate::types::{EntryKind, RemoteEntry};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::str::FromStr;
use suppaftp::FtpStream;
use suppaftp::list::File as ListFile;
use suppaftp::types::Features;

pub struct FtpConnector {
    addr: String,
    credentials: FtpCredentials,
}

impl FtpConnector {
    #[must_use]
    pub fn new(addr: String, credentials: FtpCredentials) -> Self {
        Self { addr, credentials }
    }
}

impl Connector for FtpConnector {
    type Dir = FtpDir;

    fn connect(&self) -> Result<FtpDir, TransportError> {
        let connect_err = |e: suppaftp::FtpError| TransportError::Connect {
            addr: self.addr.clone(),
            message: e.to_string(),
        };

        let mut stream = FtpStream::connect(&self.addr).map_err(connect_err)?;
        if let Err(e) = stream.login(&self.credentials.user, &self.credentials.pass) {
            if let Err(quit) = stream.quit() {
                debug!("QUIT after failed login: {quit}");
            }
            return Err(connect_err(e));
        }

        let mlsd = match stream.feat() {
            Ok(features) => supports_mlsd(&features),
            Err(e) => {
                debug!("FEAT: {e}");
                false
            }
        };
        if !mlsd {
            warn!(
                "{} has no MLSD, falling back to LIST (minute precision, guessed years)",
                self.addr
            );
        }
        debug!(
            "DIAL_AND_LOGIN: connected to {} as {}",
            self.addr, self.credentials.user
        );
        Ok(FtpDir { stream, mlsd })
    }

    fn describe(&self) -> String {
        format!("ftp://{}", self.addr)
    }
}

pub struct FtpDir {
    stream: FtpStream,
    mlsd: bool,
}

impl RemoteDir for FtpDir {
    fn list(&mut self, path: Option<&str>) -> Result<Vec<RemoteEntry>, TransportError> {
        let entries = if self.mlsd {
            let lines = self
                .stream
                .mlsd(path)
                .map_err(|e| TransportError::operation("MLSD", path.unwrap_or("."), e))?;
            lines
                .iter()
                .filter_map(|line| {
                    let line = normalize_mlsx(line)?;
                    parse_line("MLSD", &line, ListFile::from_mlsx_line)
                })
                .collect()
        } else {
            let lines = self
                .stream
                .list(path)
                .map_err(|e| TransportError::operation("LIST", path.unwrap_or("."), e))?;
            lines
                .iter()
                .filter_map(|line| parse_line("LIST", line, ListFile::from_str))
                .collect()
        };
        Ok(entries)
    }

    fn change_dir(&mut self, path: &str) -> Result<(), TransportError> {
        self.stream
            .cwd(path)
            .map_err(|e| TransportError::operation("CWD", path, e))
    }

    fn change_to_parent(&mut self) -> Result<(), TransportError> {
        self.stream
            .cdup()
            .map_err(|e| TransportError::operation("CDUP", "..", e))
    }

    fn current_dir(&mut self) -> Result<String, TransportError> {
        self.stream
            .pwd()
            .map_err(|e| TransportError::operation("PWD", ".", e))
    }

    fn quit(&mut self) -> Result<(), TransportError> {
        self.stream
            .quit()
            .map_err(|e| TransportError::operation("QUIT", "", e))
    }
}

/// RFC 3659 servers announce `MLST`; MLSD comes with it.
fn supports_mlsd(features: &Features) -> bool {
    features
        .keys()
        .any(|k| k.eq_ignore_ascii_case("MLST") || k.eq_ignore_ascii_case("MLSD"))
}

/// Drops the `cdir`/`pdir` entries and trims fractional seconds from
/// `modify`, which the listing parser does not accept.
fn normalize_mlsx(line: &str) -> Option<String> {
    let (facts, name) = line.split_once(' ')?;
    let mut kept = Vec::new();
    for fact in facts.split(';').filter(|f| !f.is_empty()) {
        let (key, value) = fact.split_once('=').unwrap_or((fact, ""));
        if key.eq_ignore_ascii_case("type")
            && (value.eq_ignore_ascii_case("cdir") || value.eq_ignore_ascii_case("pdir"))
        {
            return None;
        }
        if key.eq_ignore_ascii_case("modify") {
            let whole = value.split('.').next().unwrap_or(value);
            kept.push(format!("{key}={whole}"));
        } else {
            kept.push(fact.to_string());
        }
    }
    Some(format!("{}; {name}", kept.join(";")))
}

fn parse_line<E: std::fmt::Display>(
    op: &str,
    line: &str,
    parse: impl Fn(&str) -> Result<ListFile, E>,
) -> Option<RemoteEntry> {
    match parse(line) {
        Ok(file) => Some(to_remote_entry(&file)),
        Err(e) => {
            debug!("{op}: skipping unparseable line {line:?}: {e}");
            None
        }
    }
}

fn to_remote_entry(file: &ListFile) -> RemoteEntry {
    let kind = if file.is_directory() {
        EntryKind::Directory
    } else if file.is_symlink() {
        EntryKind::Link
    } else {
        EntryKind::File
    };

    RemoteEntry {
        name: file.name().to_string(),
        kind,
        size: file.size() as u64,
        modified: DateTime::<Utc>::from(file.modified()).fixed_offset(),
    }
}
