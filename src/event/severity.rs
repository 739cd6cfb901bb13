//! Event Severities
//!
//! The ordered set of severities an execution event can carry. The order
//! is defined by position in [`InfoType::ALL`], not by a derived
//! comparison, so adding a variant means placing it in the table.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The severity of an execution event or message.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InfoType {
    /// Debugging information.
    Debug,
    /// Progress of the execution (steps and parts beginning or ending).
    Progress,
    /// Information from the processing.
    Info,
    /// Information about one work item, e.g. that it starts.
    Iteration,
    /// Warnings from the processing.
    Warning,
    /// Errors from the processing.
    Error,
    /// A fatal error: processing of the current work item is abandoned.
    Fatal,
    /// The process in charge of a work item is lost (crashed or hanging).
    Loss,
    /// Not only the work item but the whole processing cannot continue.
    Deadly,
}

impl InfoType {
    /// All severities in ascending order.
    pub const ALL: [InfoType; 9] = [
        InfoType::Debug,
        InfoType::Progress,
        InfoType::Info,
        InfoType::Iteration,
        InfoType::Warning,
        InfoType::Error,
        InfoType::Fatal,
        InfoType::Loss,
        InfoType::Deadly,
    ];

    /// Position of this severity in the ascending order.
    pub const fn rank(self) -> u8 {
        match self {
            InfoType::Debug => 0,
            InfoType::Progress => 1,
            InfoType::Info => 2,
            InfoType::Iteration => 3,
            InfoType::Warning => 4,
            InfoType::Error => 5,
            InfoType::Fatal => 6,
            InfoType::Loss => 7,
            InfoType::Deadly => 8,
        }
    }

    /// Inverse of [`InfoType::rank`].
    pub fn from_rank(rank: u8) -> Option<InfoType> {
        Self::ALL.get(rank as usize).copied()
    }

    /// The least severe value.
    pub const fn lowest() -> InfoType {
        InfoType::Debug
    }

    /// Returns true if this severity is at least `threshold`.
    pub fn meets(self, threshold: InfoType) -> bool {
        self.rank() >= threshold.rank()
    }

    /// Returns true for severities that stop an execution configured to
    /// stop at fatal errors.
    pub fn is_fatal(self) -> bool {
        self.meets(InfoType::Fatal)
    }

    /// Clamps this severity to `ceiling`.
    ///
    /// Returns the effective severity and, if clamping happened, the
    /// original one.
    pub fn appeased_to(self, ceiling: Option<InfoType>) -> (InfoType, Option<InfoType>) {
        match ceiling {
            Some(ceiling) if self > ceiling => (ceiling, Some(self)),
            _ => (self, None),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InfoType::Debug => "debug",
            InfoType::Progress => "progress",
            InfoType::Info => "info",
            InfoType::Iteration => "iteration",
            InfoType::Warning => "warning",
            InfoType::Error => "error",
            InfoType::Fatal => "fatal",
            InfoType::Loss => "loss",
            InfoType::Deadly => "deadly",
        }
    }
}

impl PartialOrd for InfoType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InfoType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for InfoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
