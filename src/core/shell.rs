use tracing::{debug, error, info};

use crate::core::command::{self, Command};
use crate::core::config::Settings;
use crate::core::history::{InteractionHistory, InteractionRecord, CONTEXT_WINDOW};
use crate::core::lib::{AIProcessor, ElectronError, ElectronResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellState {
    AwaitingInput,
    Processing,
    Terminated,
}

/// What the terminal should show after a line has been handled.
#[derive(Debug)]
pub enum Outcome {
    Nothing,
    Exit,
    Help,
    History {
        records: Vec<InteractionRecord>,
        requested: Option<usize>,
    },
    /// `unsaved` is set when the reply could not be written to the history.
    Reply {
        text: String,
        unsaved: Option<ElectronError>,
    },
    Failed(ElectronError),
}

pub struct Shell<P: AIProcessor> {
    settings: Settings,
    history: InteractionHistory,
    processor: P,
    state: ShellState,
}

impl<P: AIProcessor> Shell<P> {
    pub fn new(settings: Settings, history: InteractionHistory, processor: P) -> Self {
        Self {
            settings,
            history,
            processor,
            state: ShellState::AwaitingInput,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn history(&self) -> &InteractionHistory {
        &self.history
    }

    pub fn state(&self) -> ShellState {
        self.state
    }

    pub async fn handle(&mut self, line: &str) -> Outcome {
        if self.state == ShellState::Terminated {
            return Outcome::Exit;
        }

        let command = match command::parse(line) {
            Ok(command) => command,
            Err(e) => return Outcome::Failed(e),
        };

        match command {
            Command::Empty => Outcome::Nothing,
            Command::Exit => {
                info!("Session ended by exit command.");
                self.state = ShellState::Terminated;
                Outcome::Exit
            }
            Command::Help => Outcome::Help,
            Command::History(requested) => {
                let records = match requested {
                    Some(n) => self.history.last(n),
                    None => self.history.all(),
                };
                Outcome::History {
                    records: records.to_vec(),
                    requested,
                }
            }
            Command::Query(query) => {
                // Stays `Processing` if the caller drops this future mid-request.
                self.state = ShellState::Processing;
                let outcome = match self.ask(&query).await {
                    Ok(text) => {
                        let unsaved = self.history.append(query.as_str(), text.as_str()).err();
                        if let Some(e) = &unsaved {
                            error!("Failed to record interaction: {}", e);
                        }
                        Outcome::Reply { text, unsaved }
                    }
                    Err(e) => {
                        error!("Error generating response: {}", e);
                        Outcome::Failed(e)
                    }
                };
                self.state = ShellState::AwaitingInput;
                outcome
            }
        }
    }

    /// Ends the session without an exit command, e.g. on Ctrl-C.
    pub fn terminate(&mut self) {
        self.state = ShellState::Terminated;
    }

    async fn ask(&mut self, query: &str) -> ElectronResult<String> {
        let context = self.history.context(CONTEXT_WINDOW);
        debug!(
            "Sending query with {} context messages ({} exchanges recorded)",
            context.len(),
            self.history.len()
        );
        self.processor.process(query, &context).await
    }
}
