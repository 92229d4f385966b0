use crate::classifier::{ChangeReason, Classification};
use crate::email::{self, EmailConfig};
use colored::Colorize;
use log::{error, info};
use std::fmt;

/// Display width of the path column.
pub const PATH_WIDTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    New,
    Changed(ChangeReason),
    Deleted,
}

impl ChangeKind {
    #[must_use]
    pub fn tag(self) -> char {
        match self {
            ChangeKind::New => '+',
            ChangeKind::Changed(_) => '~',
            ChangeKind::Deleted => '-',
        }
    }

    #[must_use]
    pub fn reason(self) -> &'static str {
        match self {
            ChangeKind::New => "new file",
            ChangeKind::Changed(ChangeReason::Timestamp) => "datetime changed",
            ChangeKind::Changed(ChangeReason::Size) => "size changed",
            ChangeKind::Deleted => "deleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub path: String,
    pub kind: ChangeKind,
}

impl Change {
    /// `None` for unchanged files, which are never reported.
    #[must_use]
    pub fn from_classification(path: &str, classification: Classification) -> Option<Self> {
        let kind = match classification {
            Classification::New => ChangeKind::New,
            Classification::Changed(reason) => ChangeKind::Changed(reason),
            Classification::Unchanged => return None,
        };
        Some(Self {
            path: path.to_string(),
            kind,
        })
    }

    #[must_use]
    pub fn deleted(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Deleted,
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.kind.tag(),
            truncate_pad(&self.path, PATH_WIDTH),
            self.kind.reason()
        )
    }
}

/// Fits `s` into exactly `width` characters: long values keep their tail
/// behind a leading `…`, short ones are padded on the right.
#[must_use]
pub fn truncate_pad(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len > width {
        if width == 0 {
            return String::new();
        }
        let tail: String = s.chars().skip(len - (width - 1)).collect();
        format!("…{tail}")
    } else {
        format!("{s:<width$}")
    }
}

/// Receives every new, changed and deleted file.
pub trait Sink {
    fn report(&mut self, change: &Change);

    /// Called once at the end of each cycle.
    fn flush(&mut self) {}
}

/// Logs changes and mails them as one digest per cycle.
pub struct Reporter {
    console: bool,
    email: Option<EmailConfig>,
    digest: Vec<String>,
}

impl Reporter {
    #[must_use]
    pub fn new(console: bool, email: Option<EmailConfig>) -> Self {
        Self {
            console,
            email,
            digest: Vec::new(),
        }
    }
}

impl Sink for Reporter {
    fn report(&mut self, change: &Change) {
        let line = change.to_string();
        if self.console {
            let colored = match change.kind {
                ChangeKind::New => line.green(),
                ChangeKind::Changed(_) => line.yellow(),
                ChangeKind::Deleted => line.red(),
            };
            println!("{colored}");
        }
        info!("{line}");
        if self.email.is_some() {
            self.digest.push(line);
        }
    }

    fn flush(&mut self) {
        let Some(cfg) = &self.email else {
            return;
        };
        if self.digest.is_empty() {
            return;
        }

        let body = self.digest.join("\n") + "\n";
        match email::send_alert(&cfg.subject, &body, cfg) {
            Ok(()) => {
                info!("Mailed {} change(s) to {}", self.digest.len(), cfg.recipient);
                self.digest.clear();
            }
            // Keep the lines so the next cycle retries them
            Err(e) => error!("{e}"),
        }
    }
}

#[cfg(test)]
impl Sink for Vec<Change> {
    fn report(&mut self, change: &Change) {
        self.push(change.clone());
    }
}
