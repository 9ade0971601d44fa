// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Interactive REPL
//!
//! Input is evaluated at global scope in a single context. A `[repl]` main
//! module is compiled first and its `require`, `module` and `exports` are
//! published as globals, so `require('./lib')` resolves from the base
//! directory.

use owo_colors::OwoColorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Config, Editor, Helper};
use std::borrow::Cow;
use std::fmt::Display;
use std::path::PathBuf;
use tidepool_engine::Value;
use crate::report;
use tidepool_node::{Context, ContextOptions, NodeError};

const HISTORY_FILE: &str = ".tidepool_history";
const MAX_HISTORY_SIZE: usize = 1000;

const PRELUDE: &str = "global.require = require;
global.module = module;
global.exports = exports;";

const KEYWORDS: &[&str] = &[
    "break", "catch", "const", "continue", "delete", "do", "else", "finally", "for",
    "function", "if", "in", "instanceof", "let", "new", "return", "throw", "try", "typeof",
    "var", "void", "while",
];

const LITERALS: &[&str] = &["true", "false", "null", "undefined", "NaN", "Infinity", "this"];

const GLOBALS: &[&str] = &[
    "Array", "Error", "JSON", "Number", "Object", "String", "TypeError", "console",
    "exports", "global", "module", "process", "require",
];

/// REPL commands that can be executed with a dot prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Exit,
    Clear,
    Version,
    Load,
    Cache,
}

impl ReplCommand {
    /// Parse a REPL command from input string
    pub fn parse(input: &str) -> Option<(Self, Option<&str>)> {
        let rest = input.trim().strip_prefix('.')?;
        let mut parts = rest.splitn(2, char::is_whitespace);
        let cmd = parts.next()?.to_lowercase();
        let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

        let cmd = match cmd.as_str() {
            "help" | "h" | "?" => ReplCommand::Help,
            "exit" | "quit" | "q" => ReplCommand::Exit,
            "clear" | "cls" => ReplCommand::Clear,
            "version" | "v" => ReplCommand::Version,
            "load" | "l" => ReplCommand::Load,
            "cache" => ReplCommand::Cache,
            _ => return None,
        };
        Some((cmd, arg))
    }

    /// Get all available commands for help/completion
    pub fn all_commands() -> &'static [(&'static str, &'static str)] {
        &[
            (".help", "Show this help message"),
            (".exit", "Exit the REPL"),
            (".clear", "Clear the screen"),
            (".version", "Show version information"),
            (".load <file>", "Require a file relative to the current directory"),
            (".cache", "List loaded module filenames"),
        ]
    }
}

/// Completion, hints, highlighting and multi-line validation
struct TidepoolHelper {
    words: Vec<&'static str>,
}

impl TidepoolHelper {
    fn new() -> Self {
        let mut words: Vec<&'static str> = KEYWORDS
            .iter()
            .chain(LITERALS)
            .chain(GLOBALS)
            .copied()
            .chain([
                "console.log",
                "console.error",
                "require.resolve",
                "require.cache",
                "module.exports",
                "process.cwd",
            ])
            .collect();
        words.extend(
            ReplCommand::all_commands()
                .iter()
                .map(|&(cmd, _)| cmd.split_whitespace().next().unwrap_or(cmd)),
        );
        Self { words }
    }

    fn word_start(line: &str) -> usize {
        line.rfind(|c: char| !c.is_alphanumeric() && c != '_' && c != '.')
            .map(|i| i + 1)
            .unwrap_or(0)
    }
}

impl Completer for TidepoolHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let word = &line[Self::word_start(&line[..pos])..pos];
        if word.is_empty() {
            return Ok((pos, vec![]));
        }

        let matches = self
            .words
            .iter()
            .filter(|w| w.starts_with(word))
            .map(|w| Pair {
                display: w.to_string(),
                replacement: w[word.len()..].to_string(),
            })
            .collect();

        Ok((pos, matches))
    }
}

impl Hinter for TidepoolHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if pos < line.len() {
            return None;
        }

        let word = &line[Self::word_start(line)..];
        if word.len() < 2 {
            return None;
        }

        self.words
            .iter()
            .find(|w| w.starts_with(word) && w.len() > word.len())
            .map(|w| w[word.len()..].to_string().dimmed().to_string())
    }
}

impl Highlighter for TidepoolHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let mut result = String::with_capacity(line.len() * 2);
        let mut word = String::new();

        for c in line.chars() {
            if c.is_alphanumeric() || c == '_' || c == '$' {
                word.push(c);
                continue;
            }
            if !word.is_empty() {
                result.push_str(&highlight_word(&word));
                word.clear();
            }
            let colored = match c {
                '(' | ')' | '[' | ']' | '{' | '}' => c.yellow().to_string(),
                '+' | '-' | '*' | '/' | '%' | '=' | '<' | '>' | '!' | '&' | '|' | '?' => {
                    c.cyan().to_string()
                }
                '"' | '\'' => c.green().to_string(),
                _ => c.to_string(),
            };
            result.push_str(&colored);
        }

        if !word.is_empty() {
            result.push_str(&highlight_word(&word));
        }

        Cow::Owned(result)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn highlight_word(word: &str) -> String {
    if KEYWORDS.contains(&word) {
        word.magenta().bold().to_string()
    } else if LITERALS.contains(&word) {
        word.blue().to_string()
    } else if GLOBALS.contains(&word) {
        word.cyan().to_string()
    } else if word.chars().all(|c| c.is_ascii_digit()) {
        word.yellow().to_string()
    } else {
        word.to_string()
    }
}

impl Validator for TidepoolHelper {
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        let input = ctx.input();
        if !is_balanced(input) {
            return Ok(ValidationResult::Incomplete);
        }

        let trimmed = input.trim_end();
        if trimmed.ends_with(['\\', '+', '-', '*', '/', '=', ',']) {
            return Ok(ValidationResult::Incomplete);
        }

        Ok(ValidationResult::Valid(None))
    }
}

impl Helper for TidepoolHelper {}

/// Check if brackets, braces, and parentheses are balanced
fn is_balanced(input: &str) -> bool {
    let mut stack = Vec::new();
    let mut in_string = None;
    let mut escape_next = false;

    for c in input.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }

        if c == '\\' && in_string.is_some() {
            escape_next = true;
            continue;
        }

        match in_string {
            Some(quote) if c == quote => in_string = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => in_string = Some(c),
                '(' => stack.push(')'),
                '[' => stack.push(']'),
                '{' => stack.push('}'),
                // a stray closer is a syntax error; let the parser report it
                ')' | ']' | '}' if stack.pop() != Some(c) => return true,
                _ => {}
            },
        }
    }

    stack.is_empty() && in_string.is_none()
}

/// Result of executing a REPL command
enum CommandResult {
    Continue,
    Exit,
}

/// The interactive REPL
pub struct Repl {
    cx: Context,
    inspect: Value,
    editor: Editor<TidepoolHelper, DefaultHistory>,
    history_path: PathBuf,
}

impl Repl {
    /// Create a context from `options` and prepare the line editor
    pub fn new(options: ContextOptions) -> anyhow::Result<Self> {
        let cx = Context::new(options).map_err(report)?;
        cx.eval_as_module(PRELUDE, "[repl]", true).map_err(report)?;
        let inspect = cx
            .engine()
            .evaluate("require('util').inspect", "[repl]")
            .map_err(|e| report(NodeError::from(e)))?;

        let config = Config::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .max_history_size(MAX_HISTORY_SIZE)?
            .auto_add_history(true)
            .build();

        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(TidepoolHelper::new()));

        let history_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tidepool")
            .join(HISTORY_FILE);

        if let Some(parent) = history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = editor.load_history(&history_path) {
            tracing::debug!(path = %history_path.display(), error = %e, "no REPL history loaded");
        }

        Ok(Self {
            cx,
            inspect,
            editor,
            history_path,
        })
    }

    /// Run the REPL main loop
    pub fn run(&mut self) -> rustyline::Result<()> {
        self.print_banner();

        loop {
            let prompt = format!("{} ", "tidepool>".bright_green().bold());

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    if let Some((cmd, arg)) = ReplCommand::parse(trimmed) {
                        match self.execute_command(cmd, arg) {
                            CommandResult::Continue => continue,
                            CommandResult::Exit => break,
                        }
                    }

                    self.eval_and_print(trimmed);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".dimmed());
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("{}: {:?}", "Error".red().bold(), err);
                    break;
                }
            }
        }

        let _ = self.editor.save_history(&self.history_path);
        Ok(())
    }

    fn print_banner(&self) {
        println!(
            "{} {} (base {})",
            "tidepool".cyan().bold(),
            tidepool_node::VERSION.yellow(),
            self.cx.basedir().display().dimmed()
        );
        println!("Type {} for help, {} to exit", ".help".green(), ".exit".green());
        println!();
    }

    fn execute_command(&mut self, cmd: ReplCommand, arg: Option<&str>) -> CommandResult {
        match cmd {
            ReplCommand::Help => self.print_help(),
            ReplCommand::Exit => return CommandResult::Exit,
            ReplCommand::Clear => print!("\x1B[2J\x1B[H"),
            ReplCommand::Version => {
                println!("{} {}", "tidepool".cyan().bold(), tidepool_node::VERSION.yellow());
            }
            ReplCommand::Load => match arg {
                Some(path) => self.load_file(path),
                None => eprintln!(
                    "{}: {} {}",
                    "Error".red().bold(),
                    ".load".cyan(),
                    "requires a file path".dimmed()
                ),
            },
            ReplCommand::Cache => {
                for filename in self.cx.modules().filenames() {
                    println!("  {}", filename.display());
                }
            }
        }
        CommandResult::Continue
    }

    fn print_help(&self) {
        println!();
        println!("{}", "REPL Commands:".white().bold());
        for (cmd, desc) in ReplCommand::all_commands() {
            println!("  {:16} {}", cmd.cyan(), desc.dimmed());
        }
        println!();
        println!("{}", "Keyboard Shortcuts:".white().bold());
        println!("  {:16} {}", "Ctrl+C".yellow(), "Cancel current input".dimmed());
        println!("  {:16} {}", "Ctrl+D".yellow(), "Exit REPL".dimmed());
        println!("  {:16} {}", "Tab".yellow(), "Autocomplete".dimmed());
        println!();
    }

    fn load_file(&mut self, path: &str) {
        let result = std::path::absolute(path)
            .map_err(|e| NodeError::read(path, e))
            .and_then(|path| self.cx.require(&path.to_string_lossy()));
        match result {
            Ok(exports) => println!("{}", self.format_value(exports)),
            Err(e) => print_error(&e),
        }
    }

    fn eval_and_print(&mut self, input: &str) {
        match self.cx.engine().evaluate(input, "[repl]") {
            Ok(value) => println!("{}", self.format_value(value)),
            Err(e) => print_error(&NodeError::from(e)),
        }
    }

    /// Render through the sandbox's `util.inspect`, falling back to
    /// `Display` if the shim throws.
    fn format_value(&self, value: Value) -> String {
        let rendered = self
            .cx
            .engine()
            .call(&self.inspect, Value::Undefined, &[value.clone()]);
        let text = match rendered {
            Ok(Value::String(s)) => s.to_string(),
            _ => value.to_string(),
        };

        match value {
            Value::Undefined | Value::Null => text.dimmed().to_string(),
            Value::Boolean(_) | Value::Number(_) => text.yellow().to_string(),
            Value::String(_) => text.green().to_string(),
            Value::Object(_) => text,
        }
    }
}

fn print_error(error: &dyn Display) {
    let message = error.to_string();
    match message.split_once(':') {
        Some((kind, rest)) => eprintln!("{}:{}", kind.red().bold(), rest),
        None => eprintln!("{}", message.red()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repl_command_parse() {
        assert!(matches!(
            ReplCommand::parse(".help"),
            Some((ReplCommand::Help, None))
        ));
        assert!(matches!(
            ReplCommand::parse(".exit"),
            Some((ReplCommand::Exit, None))
        ));
        assert!(matches!(
            ReplCommand::parse(".load test.js"),
            Some((ReplCommand::Load, Some("test.js")))
        ));
        assert!(matches!(
            ReplCommand::parse("  .cache  "),
            Some((ReplCommand::Cache, None))
        ));
        assert!(ReplCommand::parse(".nope").is_none());
        assert!(ReplCommand::parse("not a command").is_none());
    }

    #[test]
    fn test_is_balanced() {
        assert!(is_balanced("(1 + 2)"));
        assert!(is_balanced("{ a: 1 }"));
        assert!(is_balanced("function() { return 1; }"));
        assert!(!is_balanced("(1 + 2"));
        assert!(!is_balanced("{ a: 1"));
        assert!(is_balanced("'string with (unbalanced'"));
        assert!(!is_balanced("'unterminated"));
    }

    #[test]
    fn test_helper_words_include_commands() {
        let helper = TidepoolHelper::new();
        assert!(helper.words.contains(&".load"));
        assert!(helper.words.contains(&"require"));
    }
}
