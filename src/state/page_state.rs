/// Page status definitions for the page log and resume store
///
/// The persisted form is a short string so that it can be shared verbatim
/// between the `pages` table and the `status` column of the CSV page log.
use std::fmt;

/// Terminal outcome of one fetch job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageStatus {
    /// The server answered with this HTTP status code
    Http(u16),

    /// No response: connection failure or timeout
    Transport,

    /// robots.txt forbids fetching the URL
    Denied,

    /// The job failed internally after admission
    Error,
}

impl PageStatus {
    /// Returns true for a 200 response
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Http(200))
    }

    /// Returns true if the remote host produced an HTTP response
    pub fn has_response(&self) -> bool {
        matches!(self, Self::Http(_))
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> String {
        match self {
            Self::Http(code) => code.to_string(),
            Self::Transport => "0".to_string(),
            Self::Denied => "denied".to_string(),
            Self::Error => "error".to_string(),
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "0" => Some(Self::Transport),
            "denied" => Some(Self::Denied),
            "error" => Some(Self::Error),
            other => other.parse::<u16>().ok().map(Self::Http),
        }
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
