//! Error types for nbsubmit

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::transport::TransportError;

/// Library result alias
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure is terminal for the operation that hit it, nothing is retried
#[derive(Debug, Error)]
pub enum Error {
    /// The `whoami` probe made while connecting to a cluster failed
    #[error("can't connect to {host}: {source}")]
    Connectivity {
        host: String,
        #[source]
        source: TransportError,
    },

    /// A remote or local command failed after the cluster was connected
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Bad cluster configuration, registry file or job definition
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No LAST_JOB_ID marker exists for the job
    #[error("no submitted job named {job} (missing {})", .path.display())]
    JobNotFound { job: String, path: PathBuf },

    /// Environment variable can't be exported from a submission script
    #[error("invalid environment variable: {0}")]
    InvalidEnvironment(String),

    #[error("template error: {0}")]
    Template(String),

    /// Scheduler output didn't have the expected shape
    #[error("unexpected scheduler output: {0:?}")]
    UnexpectedOutput(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Wrap an io::Error with a description of what was being attempted
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }
}

impl From<tinytemplate::error::Error> for Error {
    fn from(err: tinytemplate::error::Error) -> Self {
        Self::Template(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_error_names_host_and_stderr() {
        let err = Error::Connectivity {
            host: "comet.sdsc.edu".to_string(),
            source: TransportError::CommandFailed {
                command: "ssh comet.sdsc.edu whoami".to_string(),
                status: Some(255),
                stderr: "Permission denied (publickey)".to_string(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("comet.sdsc.edu"));
        assert!(msg.contains("Permission denied"));
    }

    #[test]
    fn job_not_found_mentions_marker_path() {
        let err = Error::JobNotFound {
            job: "demo".to_string(),
            path: PathBuf::from("nbsubmit/demo/LAST_JOB_ID"),
        };
        assert!(err.to_string().contains("nbsubmit/demo/LAST_JOB_ID"));
    }
}
