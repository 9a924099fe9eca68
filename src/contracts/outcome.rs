use serde::{Deserialize, Serialize};

/// Largest value `SequenceGuard::submit` will take.
///
/// Keeps `result = n + 1` representable and matches the range of a signed
/// 64-bit integer column.
pub const MAX_SUBMIT_VALUE: u64 = i64::MAX as u64;

/// Result of a single submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The value was new and is now the last accepted value.
    Accepted { received: u64, result: u64 },
    /// The value was refused; nothing but one log entry was written.
    Rejected {
        kind: RejectionKind,
        n: u64,
        last_accepted: Option<u64>,
    },
}

impl Outcome {
    pub fn accepted(n: u64) -> Self {
        Outcome::Accepted {
            received: n,
            result: n + 1,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted { .. })
    }

    /// Returns the rejection kind, if any.
    pub fn rejection(&self) -> Option<RejectionKind> {
        match self {
            Outcome::Accepted { .. } => None,
            Outcome::Rejected { kind, .. } => Some(*kind),
        }
    }
}

/// Why a submission was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// The value is already in the accepted set.
    Duplicate,
    /// The value equals the last accepted value minus one.
    SequenceViolation,
}

impl RejectionKind {
    /// Wire code used in HTTP bodies and log entries.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::SequenceViolation => "sequence_violation",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Duplicate => "Number has already been processed",
            Self::SequenceViolation => "Incoming number is last_processed - 1",
        }
    }
}

/// Kind of an audit log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Duplicate,
    SequenceViolation,
    Accepted,
}

impl From<RejectionKind> for EntryKind {
    fn from(kind: RejectionKind) -> Self {
        match kind {
            RejectionKind::Duplicate => EntryKind::Duplicate,
            RejectionKind::SequenceViolation => EntryKind::SequenceViolation,
        }
    }
}

/// An audit record that has not been assigned a log sequence yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub timestamp_ms: i64,
    pub kind: EntryKind,
    pub submitted: u64,
    pub last_accepted: Option<u64>,
    pub message: String,
}

impl LogRecord {
    pub fn rejection(kind: RejectionKind, n: u64, last_accepted: Option<u64>) -> Self {
        Self {
            timestamp_ms: current_timestamp_ms(),
            kind: kind.into(),
            submitted: n,
            last_accepted,
            message: kind.message().into(),
        }
    }

    pub fn acceptance(n: u64, last_accepted: Option<u64>) -> Self {
        Self {
            timestamp_ms: current_timestamp_ms(),
            kind: EntryKind::Accepted,
            submitted: n,
            last_accepted,
            message: "Number accepted".into(),
        }
    }

    /// Stamps the record with its log sequence.
    pub fn into_entry(self, sequence: u64) -> LogEntry {
        LogEntry {
            sequence,
            timestamp_ms: self.timestamp_ms,
            kind: self.kind,
            submitted: self.submitted,
            last_accepted: self.last_accepted,
            message: self.message,
        }
    }
}

/// A committed, immutable audit log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub sequence: u64,
    pub timestamp_ms: i64,
    pub kind: EntryKind,
    pub submitted: u64,
    /// Last accepted value at the time of the submission.
    pub last_accepted: Option<u64>,
    pub message: String,
}

pub fn current_timestamp_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_outcome_carries_successor() {
        assert_eq!(
            Outcome::accepted(41),
            Outcome::Accepted {
                received: 41,
                result: 42
            }
        );
        assert!(Outcome::accepted(0).is_accepted());
        assert_eq!(Outcome::accepted(0).rejection(), None);
    }

    #[test]
    fn rejection_codes_and_messages() {
        assert_eq!(RejectionKind::Duplicate.code(), "duplicate");
        assert_eq!(
            RejectionKind::SequenceViolation.code(),
            "sequence_violation"
        );
        assert_eq!(
            RejectionKind::SequenceViolation.message(),
            "Incoming number is last_processed - 1"
        );
    }

    #[test]
    fn rejection_record_keeps_last_accepted() {
        let record = LogRecord::rejection(RejectionKind::Duplicate, 5, Some(5));
        assert_eq!(record.kind, EntryKind::Duplicate);
        assert_eq!(record.submitted, 5);
        assert_eq!(record.last_accepted, Some(5));

        let entry = record.into_entry(7);
        assert_eq!(entry.sequence, 7);
        assert_eq!(entry.message, "Number has already been processed");
    }

    #[test]
    fn entry_kind_serializes_snake_case() {
        let json = serde_json::to_string(&EntryKind::SequenceViolation).unwrap();
        assert_eq!(json, "\"sequence_violation\"");
    }
}
