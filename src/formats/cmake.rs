//! `CMakeLists.txt` version handling.
//!
//! Two declarations can carry the version: a fallback literal
//! `set(PROJECT_VERSION "X.Y.Z")` and the `VERSION` argument of `project()`.
//! When `project()` refers to a variable (`VERSION ${PROJECT_VERSION}`) the
//! fallback literal is the version; when it holds a literal, that literal is.
//! Files the command parser cannot handle go through the same policy with
//! two regular expressions.

use super::pattern::{splice, splice_capture};
use crate::error::{Result, VersyncError};
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;
use tracing::debug;

static FALLBACK_SET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)((?i:set)\s*\(\s*PROJECT_VERSION\s+)"([0-9]+\.[0-9]+\.[0-9]+)""#)
        .expect("valid set(PROJECT_VERSION) regex")
});

static PROJECT_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?i:project)\s*\([^)]*VERSION\s+([\d.]+|\$\{[^}]+\})")
        .expect("valid project() regex")
});

static PROJECT_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)((?i:project)\s*\([^)]*VERSION\s+)([\d.]+)").expect("valid project() regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
struct Argument {
    text: String,
    /// Byte range of the literal, inside the quotes for quoted arguments.
    span: Range<usize>,
    quoted: bool,
}

#[derive(Debug, Clone)]
struct Command {
    name: String,
    args: Vec<Argument>,
}

/// The two declarations relevant to the version, as found in the file.
#[derive(Debug, Default)]
struct Declarations {
    fallback: Option<Argument>,
    project_version: Option<Argument>,
}

impl Declarations {
    fn from_commands(commands: &[Command]) -> Self {
        let mut found = Declarations::default();

        for command in commands {
            if command.name.eq_ignore_ascii_case("set") {
                if found.fallback.is_some() {
                    continue;
                }
                if let [name, value, ..] = command.args.as_slice() {
                    if name.text == "PROJECT_VERSION" && !is_variable(&value.text) {
                        found.fallback = Some(value.clone());
                    }
                }
            } else if command.name.eq_ignore_ascii_case("project") && found.project_version.is_none()
            {
                found.project_version = command
                    .args
                    .iter()
                    .position(|arg| !arg.quoted && arg.text == "VERSION")
                    .and_then(|idx| command.args.get(idx + 1))
                    .cloned();
            }
        }

        found
    }

    fn resolve(&self, file: &str) -> Result<String> {
        resolve_policy(
            self.fallback.as_ref().map(|a| a.text.as_str()),
            self.project_version.as_ref().map(|a| a.text.as_str()),
            file,
        )
    }
}

pub fn read(content: &str, file: &str) -> Result<String> {
    match parse_commands(content) {
        Ok(commands) => Declarations::from_commands(&commands).resolve(file),
        Err(reason) => {
            debug!(file, %reason, "command parser failed, using regex fallback");
            read_with_regex(content, file)
        }
    }
}

/// Rewrites the fallback literal and the literal `project(VERSION)` argument.
///
/// Each rewrite is independent and a no-op when its declaration is absent;
/// a `VERSION ${VAR}` argument is left alone.
pub fn rewrite(content: &str, file: &str, new_version: &str) -> Result<String> {
    let commands = match parse_commands(content) {
        Ok(commands) => commands,
        Err(reason) => {
            debug!(file, %reason, "command parser failed, using regex fallback");
            return Ok(rewrite_with_regex(content, new_version));
        }
    };

    let found = Declarations::from_commands(&commands);
    let mut spans: Vec<Range<usize>> = Vec::new();
    if let Some(fallback) = &found.fallback {
        spans.push(fallback.span.clone());
    }
    if let Some(version) = &found.project_version {
        if !is_variable(&version.text) {
            spans.push(version.span.clone());
        }
    }

    // Later spans first so earlier offsets stay valid.
    spans.sort_by_key(|span| std::cmp::Reverse(span.start));
    let updated = spans
        .into_iter()
        .fold(content.to_string(), |acc, span| splice(&acc, span, new_version));

    Ok(updated)
}

fn resolve_policy(fallback: Option<&str>, project: Option<&str>, file: &str) -> Result<String> {
    match (project, fallback) {
        (Some(var), Some(fallback)) if is_variable(var) => {
            debug!(file, variable = var, "project() defers to a variable, using fallback");
            Ok(fallback.to_string())
        }
        (Some(var), None) if is_variable(var) => Err(VersyncError::LocatorNotFound {
            file: file.to_string(),
            locator: format!("fallback set(PROJECT_VERSION ...) for variable {var}"),
        }),
        (Some(literal), _) => Ok(literal.to_string()),
        (None, Some(fallback)) => Ok(fallback.to_string()),
        (None, None) => Err(VersyncError::LocatorNotFound {
            file: file.to_string(),
            locator: "project(... VERSION ...)".to_string(),
        }),
    }
}

fn read_with_regex(content: &str, file: &str) -> Result<String> {
    let fallback = FALLBACK_SET
        .captures(content)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str());
    let project = PROJECT_VERSION
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str());

    resolve_policy(fallback, project, file)
}

fn rewrite_with_regex(content: &str, new_version: &str) -> String {
    let content = splice_capture(&FALLBACK_SET, content, 2, new_version)
        .unwrap_or_else(|| content.to_string());
    splice_capture(&PROJECT_LITERAL, &content, 2, new_version).unwrap_or(content)
}

fn is_variable(value: &str) -> bool {
    value.starts_with("${")
}

/// Minimal command-invocation parser for CMake listfiles.
///
/// Understands line comments, bracket comments and arguments, quoted
/// arguments with escapes, and nested parentheses inside argument lists.
fn parse_commands(content: &str) -> std::result::Result<Vec<Command>, String> {
    let mut parser = Parser {
        src: content,
        pos: 0,
    };
    let mut commands = Vec::new();

    loop {
        parser.skip_trivia()?;
        if parser.at_end() {
            return Ok(commands);
        }

        let name = parser.identifier()?;
        parser.skip_spaces();
        parser.expect('(')?;
        let args = parser.arguments()?;
        commands.push(Command { name, args });
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn expect(&mut self, expected: char) -> std::result::Result<(), String> {
        match self.bump() {
            Some(ch) if ch == expected => Ok(()),
            Some(ch) => Err(format!("expected '{expected}' at byte {}, found '{ch}'", self.pos)),
            None => Err(format!("expected '{expected}', found end of file")),
        }
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.pos += 1;
        }
    }

    /// Skips whitespace, newlines and comments.
    fn skip_trivia(&mut self) -> std::result::Result<(), String> {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.bump();
                }
                Some('#') => self.comment()?,
                _ => return Ok(()),
            }
        }
    }

    fn comment(&mut self) -> std::result::Result<(), String> {
        self.pos += 1;
        if self.peek() == Some('[') {
            if let Some(level) = self.bracket_open_level() {
                self.bracket_body(level)?;
                return Ok(());
            }
        }
        match self.src[self.pos..].find('\n') {
            Some(offset) => self.pos += offset,
            None => self.pos = self.src.len(),
        }
        Ok(())
    }

    /// Consumes `[=*[` and returns the number of `=` signs.
    fn bracket_open_level(&mut self) -> Option<usize> {
        let rest = &self.src[self.pos..];
        let after = rest.strip_prefix('[')?;
        let level = after.len() - after.trim_start_matches('=').len();
        if after[level..].starts_with('[') {
            self.pos += level + 2;
            Some(level)
        } else {
            None
        }
    }

    /// Consumes up to and including `]=*]`, returning the body's span.
    fn bracket_body(&mut self, level: usize) -> std::result::Result<Range<usize>, String> {
        let close = format!("]{}]", "=".repeat(level));
        let start = self.pos;
        let offset = self.src[start..]
            .find(&close)
            .ok_or_else(|| "unterminated bracket argument".to_string())?;
        self.pos = start + offset + close.len();
        Ok(start..start + offset)
    }

    fn identifier(&mut self) -> std::result::Result<String, String> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if start == self.pos {
            return Err(format!("expected command name at byte {start}"));
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn arguments(&mut self) -> std::result::Result<Vec<Argument>, String> {
        let mut args = Vec::new();
        let mut depth = 0usize;

        loop {
            self.skip_trivia()?;
            match self.peek() {
                None => return Err("unbalanced parentheses in command arguments".to_string()),
                Some(')') => {
                    self.pos += 1;
                    if depth == 0 {
                        return Ok(args);
                    }
                    depth -= 1;
                }
                Some('(') => {
                    self.pos += 1;
                    depth += 1;
                }
                Some('"') => args.push(self.quoted()?),
                Some('[') => match self.bracket_open_level() {
                    Some(level) => {
                        let span = self.bracket_body(level)?;
                        args.push(Argument {
                            text: self.src[span.clone()].to_string(),
                            span,
                            quoted: true,
                        });
                    }
                    None => args.push(self.unquoted()?),
                },
                Some(_) => args.push(self.unquoted()?),
            }
        }
    }

    fn quoted(&mut self) -> std::result::Result<Argument, String> {
        self.pos += 1;
        let start = self.pos;
        let mut text = String::new();

        loop {
            match self.bump() {
                None => return Err("unterminated quoted argument".to_string()),
                Some('"') => {
                    return Ok(Argument {
                        text,
                        span: start..self.pos - 1,
                        quoted: true,
                    });
                }
                Some('\\') => {
                    if let Some(escaped) = self.bump() {
                        text.push(escaped);
                    }
                }
                Some(ch) => text.push(ch),
            }
        }
    }

    fn unquoted(&mut self) -> std::result::Result<Argument, String> {
        let start = self.pos;
        let mut brace_depth = 0usize;

        while let Some(ch) = self.peek() {
            match ch {
                '$' if self.src[self.pos..].starts_with("${") => {
                    brace_depth += 1;
                    self.pos += 2;
                    continue;
                }
                '}' if brace_depth > 0 => brace_depth -= 1,
                '\\' => {
                    self.pos += 1;
                    if self.peek().is_some() {
                        self.bump();
                    }
                    continue;
                }
                '(' | ')' | '"' | '#' if brace_depth == 0 => break,
                c if c.is_whitespace() && brace_depth == 0 => break,
                _ => {}
            }
            self.bump();
        }

        if start == self.pos {
            return Err(format!("unexpected character at byte {start}"));
        }

        Ok(Argument {
            text: self.src[start..self.pos].to_string(),
            span: start..self.pos,
            quoted: false,
        })
    }
}
