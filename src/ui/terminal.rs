// Terminal seam for the shell. `ConsoleTerminal` reads keys itself through
// `console` so Ctrl-D on an empty line ends the session, renders prompts with
// the `dialoguer` theme and shows an `indicatif` spinner; when stdin is not a
// TTY it falls back to reading plain lines so the shell can be scripted.

use console::{Key, Term};
use dialoguer::theme::{ColorfulTheme, Theme};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const HISTORY_LIMIT: usize = 500;

/// Everything the shell needs from the outside world besides the API.
pub trait Terminal {
    /// Read one line of input. `None` means end of input or interrupt,
    /// which ends the whole session.
    fn read_line(&mut self, prompt: &str) -> Option<String>;

    /// Yes/no question. `None` on end of input or interrupt.
    fn confirm(&mut self, prompt: &str) -> Option<bool>;

    fn say(&mut self, text: &str);

    /// Show a spinner until `idle` is called.
    fn busy(&mut self, _message: &str) {}

    fn idle(&mut self) {}

    fn open_url(&mut self, url: &str) -> std::io::Result<()>;
}

/// What one key press did to the line being edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    Editing,
    Submit(String),
    EndOfInput,
}

/// Line buffer driven one key at a time, with up/down recall of earlier
/// lines.
#[derive(Debug, Default)]
pub struct LineEditor {
    buffer: String,
    recall: Option<usize>,
}

impl LineEditor {
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn feed(&mut self, key: Key, history: &[String]) -> KeyOutcome {
        match key {
            Key::Enter => {
                self.recall = None;
                return KeyOutcome::Submit(std::mem::take(&mut self.buffer));
            }
            // Ctrl-D only ends input on an empty line, like a shell.
            Key::Char('\u{4}') if self.buffer.is_empty() => return KeyOutcome::EndOfInput,
            Key::Char('\u{3}') => return KeyOutcome::EndOfInput,
            Key::Backspace => {
                self.buffer.pop();
            }
            Key::ArrowUp => {
                let index = match self.recall {
                    Some(i) => Some(i.saturating_sub(1)),
                    None => history.len().checked_sub(1),
                };
                if let Some(line) = index.and_then(|i| history.get(i)) {
                    self.recall = index;
                    self.buffer = line.clone();
                }
            }
            Key::ArrowDown => {
                if let Some(i) = self.recall {
                    match history.get(i + 1) {
                        Some(line) => {
                            self.recall = Some(i + 1);
                            self.buffer = line.clone();
                        }
                        None => {
                            self.recall = None;
                            self.buffer.clear();
                        }
                    }
                }
            }
            Key::Char(c) if !c.is_control() => {
                self.recall = None;
                self.buffer.push(c);
            }
            _ => {}
        }
        KeyOutcome::Editing
    }
}

/// Lines entered at the prompt, kept in a file between runs.
#[derive(Debug, Default)]
pub struct PromptHistory {
    path: Option<PathBuf>,
    entries: Vec<String>,
}

impl PromptHistory {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("raindrop-shell").join("history"))
    }

    /// A missing file is an empty history.
    pub fn load(path: Option<PathBuf>) -> Self {
        let entries = match path.as_deref().map(std::fs::read_to_string) {
            Some(Ok(text)) => text.lines().filter(|l| !l.trim().is_empty()).map(str::to_string).collect(),
            Some(Err(e)) if e.kind() != std::io::ErrorKind::NotFound => {
                warn!(error = %e, "failed to read prompt history");
                Vec::new()
            }
            _ => Vec::new(),
        };
        Self { path, entries }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Record `line` and write the history back. Blank lines and repeats of
    /// the previous line are skipped.
    pub fn push(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() || self.entries.last().map(String::as_str) == Some(line) {
            return;
        }
        self.entries.push(line.to_string());
        if self.entries.len() > HISTORY_LIMIT {
            let excess = self.entries.len() - HISTORY_LIMIT;
            self.entries.drain(..excess);
        }
        if let Some(path) = &self.path {
            if let Err(e) = save_history(path, &self.entries) {
                warn!(path = %path.display(), error = %e, "failed to save prompt history");
            }
        }
    }
}

fn save_history(path: &Path, entries: &[String]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut text = entries.join("\n");
    text.push('\n');
    std::fs::write(path, text)
}

pub struct ConsoleTerminal {
    interactive: bool,
    term: Term,
    theme: ColorfulTheme,
    history: PromptHistory,
    spinner: Option<ProgressBar>,
}

impl Default for ConsoleTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleTerminal {
    pub fn new() -> Self {
        let interactive = std::io::stdin().is_terminal();
        let history = if interactive {
            PromptHistory::load(PromptHistory::default_path())
        } else {
            PromptHistory::default()
        };
        debug!(interactive, entries = history.entries().len(), "console ready");
        Self {
            interactive,
            term: Term::stdout(),
            theme: ColorfulTheme::default(),
            history,
            spinner: None,
        }
    }

    /// Key-by-key line read on a TTY. A failed key read covers Ctrl-C.
    fn read_keys(&mut self, prefix: &str, remember: bool) -> Option<String> {
        let mut editor = LineEditor::default();
        self.term.write_str(prefix).ok()?;
        loop {
            let key = self.term.read_key().ok()?;
            match editor.feed(key, self.history.entries()) {
                KeyOutcome::Editing => {
                    self.term.clear_line().ok()?;
                    self.term.write_str(&format!("{}{}", prefix, editor.buffer())).ok()?;
                }
                KeyOutcome::Submit(line) => {
                    let _ = self.term.write_line("");
                    if remember {
                        self.history.push(&line);
                    }
                    return Some(line);
                }
                KeyOutcome::EndOfInput => {
                    let _ = self.term.write_line("");
                    return None;
                }
            }
        }
    }

    fn read_plain(&mut self, prompt: &str) -> Option<String> {
        print!("{} ", prompt);
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }
}

impl Terminal for ConsoleTerminal {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        self.idle();
        if !self.interactive {
            return self.read_plain(prompt);
        }
        let mut prefix = String::new();
        if self.theme.format_input_prompt(&mut prefix, prompt, None).is_err() {
            prefix = format!("{} ", prompt);
        }
        self.read_keys(&prefix, true)
    }

    fn confirm(&mut self, prompt: &str) -> Option<bool> {
        self.idle();
        let answer = if self.interactive {
            let mut prefix = String::new();
            if self.theme.format_confirm_prompt(&mut prefix, prompt, Some(false)).is_err() {
                prefix = format!("{} [y/N] ", prompt);
            }
            self.read_keys(&prefix, false)?
        } else {
            self.read_plain(&format!("{} [y/N]", prompt))?
        };
        Some(matches!(answer.trim().to_lowercase().as_str(), "y" | "ye" | "yes"))
    }

    fn say(&mut self, text: &str) {
        match &self.spinner {
            Some(spinner) => spinner.println(text),
            None => println!("{}", text),
        }
    }

    fn busy(&mut self, message: &str) {
        self.idle();
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    fn idle(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn open_url(&mut self, url: &str) -> std::io::Result<()> {
        open::that(url)
    }
}

#[cfg(test)]
pub use scripted::ScriptedTerminal;

#[cfg(test)]
mod scripted {
    use super::Terminal;
    use std::collections::VecDeque;

    /// Terminal fed from a fixed list of answers; running out of answers
    /// behaves like end of input.
    #[derive(Default)]
    pub struct ScriptedTerminal {
        inputs: VecDeque<String>,
        pub output: Vec<String>,
        pub prompts: Vec<String>,
        pub opened: Vec<String>,
    }

    impl ScriptedTerminal {
        pub fn new(inputs: &[&str]) -> Self {
            Self {
                inputs: inputs.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }

        pub fn transcript(&self) -> String {
            self.output.join("\n")
        }

        pub fn remaining(&self) -> usize {
            self.inputs.len()
        }
    }

    impl Terminal for ScriptedTerminal {
        fn read_line(&mut self, prompt: &str) -> Option<String> {
            self.prompts.push(prompt.to_string());
            self.inputs.pop_front()
        }

        fn confirm(&mut self, prompt: &str) -> Option<bool> {
            self.prompts.push(prompt.to_string());
            let answer = self.inputs.pop_front()?;
            Some(matches!(answer.as_str(), "y" | "yes"))
        }

        fn say(&mut self, text: &str) {
            self.output.push(text.to_string());
        }

        fn open_url(&mut self, url: &str) -> std::io::Result<()> {
            self.opened.push(url.to_string());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn type_keys(editor: &mut LineEditor, text: &str, history: &[String]) {
        for c in text.chars() {
            assert_eq!(editor.feed(Key::Char(c), history), KeyOutcome::Editing);
        }
    }

    #[test]
    fn test_ctrl_d_on_empty_line_ends_input() {
        let mut editor = LineEditor::default();
        assert_eq!(editor.feed(Key::Char('\u{4}'), &[]), KeyOutcome::EndOfInput);
    }

    #[test]
    fn test_ctrl_d_mid_line_is_ignored() {
        let mut editor = LineEditor::default();
        type_keys(&mut editor, "rust", &[]);
        assert_eq!(editor.feed(Key::Char('\u{4}'), &[]), KeyOutcome::Editing);
        assert_eq!(editor.buffer(), "rust");
        assert_eq!(editor.feed(Key::Enter, &[]), KeyOutcome::Submit("rust".into()));
    }

    #[test]
    fn test_ctrl_c_ends_input_with_text() {
        let mut editor = LineEditor::default();
        type_keys(&mut editor, "half", &[]);
        assert_eq!(editor.feed(Key::Char('\u{3}'), &[]), KeyOutcome::EndOfInput);
    }

    #[test]
    fn test_backspace_and_empty_submit() {
        let mut editor = LineEditor::default();
        type_keys(&mut editor, "ab", &[]);
        editor.feed(Key::Backspace, &[]);
        editor.feed(Key::Backspace, &[]);
        editor.feed(Key::Backspace, &[]);
        assert_eq!(editor.feed(Key::Enter, &[]), KeyOutcome::Submit(String::new()));
    }

    #[test]
    fn test_arrows_walk_history() {
        let history = vec!["s".to_string(), "rust".to_string()];
        let mut editor = LineEditor::default();
        editor.feed(Key::ArrowUp, &history);
        assert_eq!(editor.buffer(), "rust");
        editor.feed(Key::ArrowUp, &history);
        editor.feed(Key::ArrowUp, &history);
        assert_eq!(editor.buffer(), "s");
        editor.feed(Key::ArrowDown, &history);
        assert_eq!(editor.buffer(), "rust");
        editor.feed(Key::ArrowDown, &history);
        assert_eq!(editor.buffer(), "");
        type_keys(&mut editor, "x", &history);
        assert_eq!(editor.feed(Key::Enter, &history), KeyOutcome::Submit("x".into()));
    }

    #[test]
    fn test_history_persists_between_sessions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("history");

        let mut first = PromptHistory::load(Some(path.clone()));
        assert!(first.entries().is_empty());
        first.push("s");
        first.push("s");
        first.push("   ");
        first.push("rust, jazz");

        let second = PromptHistory::load(Some(path));
        assert_eq!(second.entries(), &["s".to_string(), "rust, jazz".to_string()]);
    }

    #[test]
    fn test_history_keeps_latest_entries() {
        let mut history = PromptHistory::default();
        for i in 0..HISTORY_LIMIT + 3 {
            history.push(&i.to_string());
        }
        assert_eq!(history.entries().len(), HISTORY_LIMIT);
        assert_eq!(history.entries()[0], "3");
    }
}
