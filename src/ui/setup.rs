use std::path::Path;

use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{error, info};

use crate::core::config::{save_api_key, API_KEY_NAME, SETTINGS_FILE};
use crate::core::lib::{ElectronError, ElectronResult, TerminalInterface};

pub const CONFIRMATION_COMMANDS: [&str; 8] =
    ["yes", "y", "yeah", "yep", "sure", "ok", "okay", "fine"];

pub fn is_confirmation(answer: &str) -> bool {
    CONFIRMATION_COMMANDS.contains(&answer.trim().to_lowercase().as_str())
}

/// Plain line prompt used before the chat session starts.
pub struct SetupPrompt {
    editor: DefaultEditor,
}

impl SetupPrompt {
    pub fn new() -> ElectronResult<Self> {
        let editor = DefaultEditor::new()
            .map_err(|e| ElectronError::InputError(format!("Failed to open terminal: {}", e)))?;
        Ok(Self { editor })
    }
}

impl TerminalInterface for SetupPrompt {
    fn read_line(&mut self, prompt: &str) -> ElectronResult<String> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(line),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                Err(ElectronError::InputError("Input cancelled".to_string()))
            }
            Err(e) => Err(ElectronError::InputError(e.to_string())),
        }
    }

    fn display_output(&self, output: &str) {
        println!("{}", output.green().bold());
    }

    fn display_error(&self, error: &str) {
        eprintln!("{}", error.red().bold());
    }
}

/// Asks the user for a missing API key and optionally saves it.
///
/// Returns `Ok(None)` when the user declines to provide one.
pub fn request_api_key(
    terminal: &mut impl TerminalInterface,
    settings_path: &Path,
) -> ElectronResult<Option<String>> {
    let question = format!(
        "Your API key is missing in '{}' and is not set in the environment as '{}'!\nWould you like to set it now? ",
        SETTINGS_FILE, API_KEY_NAME
    );
    if !is_confirmation(&terminal.read_line(&question.yellow().bold().to_string())?) {
        return Ok(None);
    }

    let key_prompt = "Input your API key: ".yellow().bold().to_string();
    let api_key = loop {
        let key = terminal.read_line(&key_prompt)?;
        if !key.trim().is_empty() {
            break key.trim().to_string();
        }
    };

    let save_prompt = "Save API key for future use? ".yellow().bold().to_string();
    if is_confirmation(&terminal.read_line(&save_prompt)?) {
        match save_api_key(settings_path, &api_key) {
            Ok(()) => {
                info!("API key saved to '{}'.", settings_path.display());
                terminal.display_output("API key saved.");
            }
            Err(e) => {
                error!("Failed to save API key: {}", e);
                terminal.display_error("API key not saved. See logs for more info.");
            }
        }
    } else {
        terminal.display_output("API key not saved.");
    }

    Ok(Some(api_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::fs;
    use tempfile::tempdir;

    struct ScriptedTerminal {
        answers: VecDeque<&'static str>,
        output: RefCell<Vec<String>>,
    }

    impl ScriptedTerminal {
        fn new(answers: &[&'static str]) -> Self {
            Self {
                answers: answers.iter().copied().collect(),
                output: RefCell::new(Vec::new()),
            }
        }
    }

    impl TerminalInterface for ScriptedTerminal {
        fn read_line(&mut self, _prompt: &str) -> ElectronResult<String> {
            self.answers
                .pop_front()
                .map(str::to_string)
                .ok_or_else(|| ElectronError::InputError("no more input".to_string()))
        }

        fn display_output(&self, output: &str) {
            self.output.borrow_mut().push(output.to_string());
        }

        fn display_error(&self, error: &str) {
            self.output.borrow_mut().push(error.to_string());
        }
    }

    #[test]
    fn test_confirmation_words() {
        assert!(is_confirmation("Yes"));
        assert!(is_confirmation(" ok "));
        assert!(!is_confirmation("no"));
        assert!(!is_confirmation(""));
    }

    #[test]
    fn test_declining_returns_none() {
        let dir = tempdir().unwrap();
        let mut terminal = ScriptedTerminal::new(&["no"]);

        let key = request_api_key(&mut terminal, &dir.path().join(SETTINGS_FILE)).unwrap();

        assert_eq!(key, None);
    }

    #[test]
    fn test_key_is_asked_until_non_empty_and_saved() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{"model": "gpt-4o", "api_key": ""}"#).unwrap();
        let mut terminal = ScriptedTerminal::new(&["y", "", "  ", "sk-123", "yes"]);

        let key = request_api_key(&mut terminal, &path).unwrap();

        assert_eq!(key, Some("sk-123".to_string()));
        let saved: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["api_key"], "sk-123");
        assert_eq!(saved["model"], "gpt-4o");
        assert_eq!(terminal.output.borrow().as_slice(), ["API key saved."]);
    }

    #[test]
    fn test_key_used_without_saving() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let mut terminal = ScriptedTerminal::new(&["sure", "sk-456", "n"]);

        let key = request_api_key(&mut terminal, &path).unwrap();

        assert_eq!(key, Some("sk-456".to_string()));
        assert!(!path.exists());
        assert_eq!(terminal.output.borrow().as_slice(), ["API key not saved."]);
    }

    #[test]
    fn test_cancelled_input_is_an_error() {
        let dir = tempdir().unwrap();
        let mut terminal = ScriptedTerminal::new(&["y"]);

        let result = request_api_key(&mut terminal, &dir.path().join(SETTINGS_FILE));

        assert!(matches!(result, Err(ElectronError::InputError(_))));
    }
}
