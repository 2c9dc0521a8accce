// Error types for the pipeline

use std::fmt;

#[derive(Debug, Clone)]
pub enum DownloadError {
    /// yt-dlp or ffmpeg not found on the system
    ToolNotFound(String),

    /// A subprocess exceeded its timeout
    Timeout(u64),

    /// Failed to parse yt-dlp JSON output
    ParseError(String),

    /// Subprocess spawn or exit failure
    ExecutionError(String),

    /// Every quality tier and every reported format id failed
    Exhausted { attempts: usize },

    /// Filesystem error moving the result into place
    Io(String),
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToolNotFound(tool) => write!(f, "Tool not found: {}", tool),
            Self::Timeout(secs) => write!(f, "Timed out after {}s", secs),
            Self::ParseError(msg) => write!(f, "Parse error: {}", msg),
            Self::ExecutionError(msg) => write!(f, "Execution error: {}", msg),
            Self::Exhausted { attempts } => {
                write!(f, "Download failed after {} attempts", attempts)
            }
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for DownloadError {}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

// Classify raw subprocess stderr into the taxonomy
impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        if s.contains("timed out") || s.contains("timeout") {
            return Self::Timeout(0);
        }

        if s.contains("not found")
            || s.contains("No such file")
            || s.contains("command not found")
        {
            return Self::ToolNotFound(s);
        }

        if s.contains("JSON") || s.contains("expected value") {
            return Self::ParseError(s);
        }

        Self::ExecutionError(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_missing_tool() {
        let err = DownloadError::from("sh: yt-dlp: command not found".to_string());
        assert!(matches!(err, DownloadError::ToolNotFound(_)));
    }

    #[test]
    fn classifies_timeout() {
        let err = DownloadError::from("read operation timed out".to_string());
        assert!(matches!(err, DownloadError::Timeout(_)));
    }

    #[test]
    fn defaults_to_execution_error() {
        let err = DownloadError::from("ERROR: Unsupported URL".to_string());
        assert!(matches!(err, DownloadError::ExecutionError(_)));
    }

    #[test]
    fn exhausted_reports_attempt_count() {
        let msg = DownloadError::Exhausted { attempts: 6 }.to_string();
        assert!(msg.contains('6'));
    }
}
