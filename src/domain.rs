use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Literal written to CSV cells for any failed field.
pub const FAILED: &str = "failed";
/// Literal written to CSV status cells for a passing signal.
pub const WORKED: &str = "worked";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct JobId(String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = FailureReason;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = !trimmed.is_empty()
            && trimmed != FAILED
            && trimmed
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
        if !is_valid {
            return Err(FailureReason::MalformedJobId(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Why a per-job field or signal did not pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    NoResponse,
    TitleMissing,
    MarkerMissing,
    MalformedJobId(String),
    /// Derived from an upstream field that had already failed.
    Upstream,
    HttpStatus(u16),
    Transport(String),
    MissingDirectory,
    TooFewFiles { found: usize, expected: usize },
    MissingResultFile,
    EmptyScoreTable,
    UnparsableScore,
    ZeroScore,
    Unreadable(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NoResponse => write!(f, "no response recorded"),
            FailureReason::TitleMissing => write!(f, "response has no title"),
            FailureReason::MarkerMissing => write!(f, "title lacks job results marker"),
            FailureReason::MalformedJobId(value) => write!(f, "malformed job id: {value}"),
            FailureReason::Upstream => write!(f, "upstream field failed"),
            FailureReason::HttpStatus(status) => write!(f, "download returned HTTP {status}"),
            FailureReason::Transport(message) => write!(f, "download failed: {message}"),
            FailureReason::MissingDirectory => write!(f, "job directory missing"),
            FailureReason::TooFewFiles { found, expected } => {
                write!(f, "job directory has {found} of {expected} expected files")
            }
            FailureReason::MissingResultFile => write!(f, "primary result file missing"),
            FailureReason::EmptyScoreTable => write!(f, "score table is empty"),
            FailureReason::UnparsableScore => write!(f, "top binding score is not numeric"),
            FailureReason::ZeroScore => write!(f, "top binding score is zero"),
            FailureReason::Unreadable(message) => write!(f, "result file unreadable: {message}"),
        }
    }
}

/// Success payload or typed failure for a derived per-job field.
pub type Outcome<T> = Result<T, FailureReason>;

/// A pass/fail stage signal, rendered as `worked`/`failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Worked,
    Failed(FailureReason),
}

impl Signal {
    pub fn is_worked(&self) -> bool {
        matches!(self, Signal::Worked)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Worked => WORKED,
            Signal::Failed(_) => FAILED,
        }
    }

    pub fn reason(&self) -> Option<&FailureReason> {
        match self {
            Signal::Worked => None,
            Signal::Failed(reason) => Some(reason),
        }
    }

    pub fn from_outcome<T>(outcome: &Outcome<T>) -> Self {
        match outcome {
            Ok(_) => Signal::Worked,
            Err(reason) => Signal::Failed(reason.clone()),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Signal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Renders an outcome the way the status CSV does: the payload, or `failed`.
pub fn outcome_cell<T: fmt::Display>(outcome: &Outcome<T>) -> String {
    match outcome {
        Ok(value) => value.to_string(),
        Err(_) => FAILED.to_string(),
    }
}

/// One submitted docking job as read from a response batch.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job_name: String,
    pub receptor_file: String,
    pub ligand_file: String,
    pub submitter_email: String,
    pub response_html: Option<String>,
    pub download_id: Outcome<JobId>,
    pub view_link: Outcome<String>,
    pub download_link: Outcome<String>,
}

impl JobRecord {
    /// Marks the download link failed after an unsuccessful retrieval.
    pub fn downgrade_download(&mut self, reason: FailureReason) {
        self.download_link = Err(reason);
    }
}

/// The nine columns of a docking result row, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreField {
    TranslationX,
    TranslationY,
    TranslationZ,
    RotationX,
    RotationY,
    RotationZ,
    BindingScore,
    Rmsd,
    TranslationalId,
}

impl ScoreField {
    pub const ALL: [ScoreField; 9] = [
        ScoreField::TranslationX,
        ScoreField::TranslationY,
        ScoreField::TranslationZ,
        ScoreField::RotationX,
        ScoreField::RotationY,
        ScoreField::RotationZ,
        ScoreField::BindingScore,
        ScoreField::Rmsd,
        ScoreField::TranslationalId,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn column_name(self) -> &'static str {
        match self {
            ScoreField::TranslationX => "Translation_X",
            ScoreField::TranslationY => "Translation_Y",
            ScoreField::TranslationZ => "Translation_Z",
            ScoreField::RotationX => "Rotation_X",
            ScoreField::RotationY => "Rotation_Y",
            ScoreField::RotationZ => "Rotation_Z",
            ScoreField::BindingScore => "Binding_Score",
            ScoreField::Rmsd => "RMSD",
            ScoreField::TranslationalId => "Translational_ID",
        }
    }
}

impl fmt::Display for ScoreField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_job_id_valid() {
        let id: JobId = " 67c074b475cea ".parse().unwrap();
        assert_eq!(id.as_str(), "67c074b475cea");
    }

    #[test]
    fn parse_job_id_rejects_sentinel_and_markup() {
        assert_matches!("failed".parse::<JobId>(), Err(FailureReason::MalformedJobId(_)));
        assert_matches!("ab<c".parse::<JobId>(), Err(FailureReason::MalformedJobId(_)));
        assert_matches!("".parse::<JobId>(), Err(FailureReason::MalformedJobId(_)));
    }

    #[test]
    fn signal_renders_pipeline_vocabulary() {
        assert_eq!(Signal::Worked.to_string(), "worked");
        assert_eq!(Signal::Failed(FailureReason::ZeroScore).to_string(), "failed");
        let outcome: Outcome<JobId> = Err(FailureReason::TitleMissing);
        assert_eq!(outcome_cell(&outcome), "failed");
    }

    #[test]
    fn score_fields_keep_file_order() {
        assert_eq!(ScoreField::ALL[6], ScoreField::BindingScore);
        assert_eq!(ScoreField::BindingScore.index(), 6);
        assert_eq!(ScoreField::TranslationalId.column_name(), "Translational_ID");
    }
}
