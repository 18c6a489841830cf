//! Run commands locally, on a cluster login node over ssh, and copy files with scp
//!
//! Every command is an argument vector, never a string handed to a local shell. Remote arguments
//! do pass through the login shell on the far side of ssh, so they are quoted with
//! [`shell_quote`] before they are sent.

use std::borrow::Cow;
use std::io;

use thiserror::Error;

/// Spawns processes with a hard timeout
pub mod process;

/// Records invocations and replays scripted responses
pub mod recording;

pub use process::ProcessTransport;
pub use recording::RecordingTransport;

/// Captured output of a command that exited 0
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        CommandOutput { stdout: stdout.into(), stderr: String::new() }
    }
}

/// Reasons a command didn't produce a usable result
///
/// Timeouts and non-zero exits are reported separately but callers treat them the same way.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("`{command}` exited with {}: {}", describe_status(.status), .stderr.trim())]
    CommandFailed {
        command: String,
        /// None when the process was killed by a signal
        status: Option<i32>,
        stderr: String,
    },

    #[error("`{command}` timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    #[error("can't run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    /// Captured standard error, if the command got far enough to write any
    pub fn stderr(&self) -> Option<&str> {
        match self {
            TransportError::CommandFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

/// Something that can execute an argument vector and report what happened
pub trait Transport {
    /// Run `argv[0]` with the remaining arguments on this machine
    fn run(&self, argv: &[String]) -> Result<CommandOutput, TransportError>;

    /// Run a command on `host` with ssh
    fn run_remote(&self, host: &str, argv: &[String]) -> Result<CommandOutput, TransportError> {
        let mut command = vec!["ssh".to_string(), host.to_string()];
        command.extend(argv.iter().map(|arg| shell_quote(arg).into_owned()));
        self.run(&command)
    }

    /// Copy files with scp, addresses are local paths or `host:path`
    fn copy(&self, sources: &[String], destination: &str) -> Result<CommandOutput, TransportError> {
        let mut command = vec!["scp".to_string()];
        command.extend(sources.iter().cloned());
        command.push(destination.to_string());
        self.run(&command)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn run(&self, argv: &[String]) -> Result<CommandOutput, TransportError> {
        (**self).run(argv)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn run(&self, argv: &[String]) -> Result<CommandOutput, TransportError> {
        (**self).run(argv)
    }
}

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '=' | ':' | ',' | '+' | '@' | '%')
}

/// Quote a word for a POSIX shell, leaving words made only of safe characters untouched
pub fn shell_quote(word: &str) -> Cow<'_, str> {
    if !word.is_empty() && word.chars().all(is_shell_safe) {
        Cow::Borrowed(word)
    } else {
        Cow::Owned(format!("'{}'", word.replace('\'', r"'\''")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_words_are_not_quoted() {
        assert_eq!(shell_quote("whoami"), "whoami");
        assert_eq!(shell_quote("--chdir=/oasis/scratch/x"), "--chdir=/oasis/scratch/x");
    }

    #[test]
    fn unsafe_words_are_single_quoted() {
        assert_eq!(shell_quote("two words"), "'two words'");
        assert_eq!(shell_quote("$HOME"), "'$HOME'");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn run_remote_prefixes_ssh_and_quotes() {
        let transport = RecordingTransport::new();
        transport
            .run_remote("comet", &["mkdir".to_string(), "-p".to_string(), "/a b".to_string()])
            .unwrap();
        assert_eq!(transport.commands(), vec![vec!["ssh", "comet", "mkdir", "-p", "'/a b'"]]);
    }

    #[test]
    fn copy_puts_destination_last() {
        let transport = RecordingTransport::new();
        transport
            .copy(&["nb.ipynb".to_string(), "job.cmd".to_string()], "comet:/remote")
            .unwrap();
        assert_eq!(
            transport.commands(),
            vec![vec!["scp", "nb.ipynb", "job.cmd", "comet:/remote"]]
        );
    }

    #[test]
    fn copy_addresses_are_passed_through_unquoted() {
        let transport = RecordingTransport::new();
        transport
            .copy(&["comet:/remote dir/*".to_string()], "results")
            .unwrap();
        assert_eq!(transport.commands(), vec![vec!["scp", "comet:/remote dir/*", "results"]]);
    }

    #[test]
    fn command_failed_reports_trimmed_stderr() {
        let err = TransportError::CommandFailed {
            command: "ssh comet whoami".to_string(),
            status: Some(255),
            stderr: "Host key verification failed.\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "`ssh comet whoami` exited with status 255: Host key verification failed."
        );
        assert_eq!(err.stderr(), Some("Host key verification failed.\n"));
    }
}
