use std::cell::RefCell;
use std::collections::VecDeque;

use crate::transport::{CommandOutput, Transport, TransportError};

/// Test double that records every argument vector and replays scripted responses
///
/// Responses are handed out in the order they were queued. Once the queue is empty every command
/// succeeds with empty output.
#[derive(Default)]
pub struct RecordingTransport {
    responses: RefCell<VecDeque<Result<CommandOutput, TransportError>>>,
    commands: RefCell<Vec<Vec<String>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: Vec<Result<CommandOutput, TransportError>>) -> Self {
        RecordingTransport {
            responses: RefCell::new(responses.into()),
            commands: RefCell::new(Vec::new()),
        }
    }

    /// Queue a successful response with the given stdout
    pub fn push_stdout(&self, stdout: &str) {
        self.responses.borrow_mut().push_back(Ok(CommandOutput::success(stdout)));
    }

    pub fn push_response(&self, response: Result<CommandOutput, TransportError>) {
        self.responses.borrow_mut().push_back(response);
    }

    /// Every command run so far, oldest first
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.commands.borrow().clone()
    }

    /// Commands whose program is `program`
    pub fn commands_of(&self, program: &str) -> Vec<Vec<String>> {
        self.commands
            .borrow()
            .iter()
            .filter(|argv| argv.first().map(String::as_str) == Some(program))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.commands.borrow_mut().clear();
    }
}

impl Transport for RecordingTransport {
    fn run(&self, argv: &[String]) -> Result<CommandOutput, TransportError> {
        self.commands.borrow_mut().push(argv.to_vec());
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(CommandOutput::default()))
    }
}
