use colored::*;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::{Highlighter, MatchingBracketHighlighter};
use rustyline::hint::{Hinter, HistoryHinter};
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config, EditMode, Editor};
use std::borrow::Cow;
use tracing::{info, warn};

use crate::core::command::COMMAND_WORDS;
use crate::core::history::InteractionRecord;
use crate::core::lib::{AIProcessor, ApiErrorKind, ElectronError, ElectronResult};
use crate::core::shell::{Outcome, Shell, ShellState};
use crate::ui::markdown;

pub struct ElectronCompleter {
    commands: Vec<String>,
}

impl ElectronCompleter {
    fn new() -> Self {
        Self {
            commands: COMMAND_WORDS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Completer for ElectronCompleter {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>)
        -> rustyline::Result<(usize, Vec<Pair>)> {
        let word = &line[..pos];
        // Commands are only recognised as the whole line.
        if word.contains(char::is_whitespace) {
            return Ok((pos, Vec::new()));
        }

        let matches = self.commands.iter()
            .filter(|cmd| cmd.starts_with(word))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();

        Ok((0, matches))
    }
}

pub struct ElectronHelper {
    completer: ElectronCompleter,
    highlighter: MatchingBracketHighlighter,
    hinter: HistoryHinter,
}

impl rustyline::Helper for ElectronHelper {}

impl ElectronHelper {
    fn new() -> Self {
        Self {
            completer: ElectronCompleter::new(),
            highlighter: MatchingBracketHighlighter::new(),
            hinter: HistoryHinter {},
        }
    }
}

impl Completer for ElectronHelper {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, ctx: &rustyline::Context<'_>)
        -> rustyline::Result<(usize, Vec<Pair>)> {
        self.completer.complete(line, pos, ctx)
    }
}

impl Validator for ElectronHelper {}

impl Highlighter for ElectronHelper {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        self.highlighter.highlight(line, pos)
    }

    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(&'s self, prompt: &'p str, _default: bool) -> Cow<'b, str> {
        Cow::Owned(prompt.bold().to_string())
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(hint.dimmed().to_string())
    }

    fn highlight_char(&self, line: &str, pos: usize, forced: bool) -> bool {
        self.highlighter.highlight_char(line, pos, forced)
    }
}

impl Hinter for ElectronHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, ctx: &rustyline::Context<'_>) -> Option<String> {
        self.hinter.hint(line, pos, ctx)
    }
}

pub struct ElectronTerminal<P: AIProcessor> {
    editor: Editor<ElectronHelper, DefaultHistory>,
    shell: Shell<P>,
}

impl<P: AIProcessor> ElectronTerminal<P> {
    pub fn new(shell: Shell<P>) -> ElectronResult<Self> {
        let config = Config::builder()
            .completion_type(CompletionType::List)
            .edit_mode(EditMode::Emacs)
            .build();
        let mut editor = Editor::with_config(config)
            .map_err(|e| ElectronError::InputError(format!("Failed to open terminal: {}", e)))?;
        editor.set_helper(Some(ElectronHelper::new()));

        // Earlier questions are available with the arrow keys.
        for record in shell.history().all() {
            let _ = editor.add_history_entry(record.user.as_str());
        }

        Ok(Self { editor, shell })
    }

    pub fn display_welcome(&self) {
        let settings = self.shell.settings();
        println!(
            "{}",
            format!("=== {} is ready to help, {}! ===", settings.assistant_name, settings.user_name)
                .green()
                .bold()
        );
        println!("{}", "Type 'help' for the available commands or 'q' to leave.".yellow());
        let history = self.shell.history();
        if !history.is_empty() {
            println!(
                "{}",
                format!("{} earlier exchanges loaded. Type 'history' to see them.", history.len()).blue()
            );
        }
    }

    /// Runs the read-eval-print loop. `first_message` is handled before any prompt.
    pub async fn run(&mut self, first_message: Option<String>) -> ElectronResult<()> {
        self.display_welcome();
        let mut pending = first_message.filter(|m| !m.trim().is_empty());

        while self.shell.state() != ShellState::Terminated {
            let prompt = format!("{}: ", self.shell.settings().user_name);
            let line = match pending.take() {
                Some(line) => {
                    println!("{}{}", prompt.bold(), line);
                    line
                }
                None => match self.editor.readline(&prompt) {
                    Ok(line) => line,
                    Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                        info!("Session ended by user.");
                        self.shell.terminate();
                        println!("{}", "\nSession ended. Goodbye!".green().bold());
                        break;
                    }
                    Err(err) => {
                        return Err(ElectronError::InputError(err.to_string()));
                    }
                },
            };

            if !line.trim().is_empty() {
                if let Err(e) = self.editor.add_history_entry(line.as_str()) {
                    warn!("Failed to add line to editor history: {}", e);
                }
            }

            let outcome = tokio::select! {
                outcome = self.shell.handle(&line) => Some(outcome),
                _ = tokio::signal::ctrl_c() => None,
            };

            match outcome {
                Some(Outcome::Nothing) => {}
                Some(Outcome::Exit) => {
                    println!("{}", "\nGoodbye! See you later.".green().bold());
                    break;
                }
                Some(Outcome::Help) => self.display_help(),
                Some(Outcome::History { records, requested }) => {
                    self.display_history(&records, requested)
                }
                Some(Outcome::Reply { text, unsaved }) => {
                    self.display_response(&text);
                    if let Some(e) = unsaved {
                        eprintln!(
                            "{} {}\n",
                            "Warning: this exchange was not saved to history:".yellow().bold(),
                            e.to_string().yellow()
                        );
                    }
                }
                Some(Outcome::Failed(e)) => display_failure(&e),
                None => {
                    if self.shell.state() == ShellState::Processing {
                        info!("Session ended by user while a request was in flight.");
                    } else {
                        info!("Session ended by user.");
                    }
                    self.shell.terminate();
                    println!("{}", "\nSession ended. Goodbye!".green().bold());
                    break;
                }
            }
        }

        Ok(())
    }

    fn display_response(&self, reply: &str) {
        let text = response_view(&self.shell.settings().assistant_name, reply);
        println!("\n{}\n", markdown::render(&text));
    }

    fn display_help(&self) {
        let text = help_view(&self.shell.settings().assistant_name);
        println!("\n{}\n", markdown::render(&text));
    }

    fn display_history(&self, records: &[InteractionRecord], requested: Option<usize>) {
        let settings = self.shell.settings();
        match history_view(&settings.user_name, &settings.assistant_name, records, requested) {
            Some(text) => println!("\n{}\n", markdown::render(&text)),
            None => println!(
                "\n{}\n",
                "No conversations found. Start a discussion to create history!"
                    .yellow()
                    .bold()
            ),
        }
    }
}

fn display_failure(error: &ElectronError) {
    match error {
        ElectronError::CommandParseError(_) => {
            eprintln!("\n{}\n", error.to_string().yellow().bold());
        }
        ElectronError::ApiError { kind, .. } => {
            eprintln!("\n{} {}", "Error generating response:".red().bold(), error.to_string().red());
            if *kind == ApiErrorKind::Authentication {
                eprintln!("{}", "Update api_key in your settings or set API_KEY and restart.".yellow());
            }
            eprintln!();
        }
        _ => eprintln!("\n{} {}\n", "Error:".red().bold(), error.to_string().red()),
    }
}

fn response_view(assistant_name: &str, reply: &str) -> String {
    format!("**{}**: {}", assistant_name, reply)
}

fn help_view(assistant_name: &str) -> String {
    format!(
        "I am **{}** and I am here to assist you with anything. Just type your question.\n\n\
         - `history` shows the full conversation history\n\
         - `history N` shows the last N exchanges\n\
         - `help` shows this message\n\
         - `q`, `quit`, `exit`, `bye`, `close` or `stop` ends the session",
        assistant_name
    )
}

/// Markdown for a history listing, or `None` when there is nothing to show.
fn history_view(
    user_name: &str,
    assistant_name: &str,
    records: &[InteractionRecord],
    requested: Option<usize>,
) -> Option<String> {
    if records.is_empty() {
        return None;
    }

    let title = match requested {
        Some(1) => "## Last message".to_string(),
        Some(n) => format!("## Last {} messages", n),
        None => "## Full conversation history".to_string(),
    };

    let mut sections = vec![title, "***".to_string()];
    for record in records {
        sections.push(format!("**{}**: {}", user_name, record.user));
        sections.push(format!("**{}**: {}", assistant_name, record.assistant));
    }
    sections.push("***".to_string());
    Some(sections.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_view_empty() {
        assert_eq!(history_view("User", "Electron", &[], None), None);
    }

    #[test]
    fn test_history_view_full() {
        let records = vec![InteractionRecord::new("hi", "hello")];
        let text = history_view("Ada", "Electron", &records, None).unwrap();

        assert_eq!(
            text,
            "## Full conversation history\n\n***\n\n**Ada**: hi\n\n**Electron**: hello\n\n***"
        );
    }

    #[test]
    fn test_history_view_titles() {
        let records = vec![InteractionRecord::new("hi", "hello")];

        let one = history_view("User", "Electron", &records, Some(1)).unwrap();
        assert!(one.starts_with("## Last message\n"));

        let many = history_view("User", "Electron", &records, Some(4)).unwrap();
        assert!(many.starts_with("## Last 4 messages\n"));
    }

    #[test]
    fn test_response_view_names_assistant() {
        assert_eq!(response_view("Nova", "42"), "**Nova**: 42");
    }

    #[test]
    fn test_help_lists_commands() {
        let text = help_view("Electron");
        for word in COMMAND_WORDS {
            assert!(text.contains(&format!("`{}", word)), "missing {}", word);
        }
    }

    #[test]
    fn test_completer_offers_commands_at_line_start() {
        let completer = ElectronCompleter::new();
        let history = DefaultHistory::new();
        let ctx = rustyline::Context::new(&history);

        let (start, pairs) = completer.complete("hi", 2, &ctx).unwrap();
        assert_eq!(start, 0);
        let words: Vec<&str> = pairs.iter().map(|p| p.replacement.as_str()).collect();
        assert_eq!(words, vec!["history"]);

        let (_, pairs) = completer.complete("tell me ab", 10, &ctx).unwrap();
        assert!(pairs.is_empty());
    }
}
