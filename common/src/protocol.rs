use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Pos;

/// Levels the server accepts for `new`.
pub const LEVELS: RangeInclusive<u8> = 1..=4;

const SUCCESS_BODY: &str = "OK";
const LOSE_BODY: &str = "You lose";
const WIN_PREFIX: &str = "You win. The password for this level is: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    #[serde(rename = "new")]
    New,
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "map")]
    Map,
}

impl Command {
    pub const ALL: [Command; 3] = [Command::New, Command::Open, Command::Map];

    pub fn name(self) -> &'static str {
        match self {
            Command::New => "new",
            Command::Open => "open",
            Command::Map => "map",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.name() == name)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single outgoing command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    command: Command,
    args: Option<String>,
}

impl Request {
    pub fn new(command: Command, args: Option<String>) -> Self {
        Self { command, args }
    }

    pub fn new_game(level: u8) -> Self {
        Self::new(Command::New, Some(level.to_string()))
    }

    pub fn open(pos: Pos) -> Self {
        Self::new(Command::Open, Some(pos.to_string()))
    }

    pub fn map() -> Self {
        Self::new(Command::Map, None)
    }

    pub fn command(&self) -> Command {
        self.command
    }

    /// Serializes to `<command>[ <args>]`; empty args are dropped.
    pub fn to_line(&self) -> String {
        match self.args.as_deref() {
            Some(args) if !args.is_empty() => format!("{} {}", self.command, args),
            _ => self.command.name().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewStatus {
    Ok,
    Err,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    Ok,
    Lose,
    Win { token: String },
}

impl OpenOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OpenOutcome::Ok)
    }
}

/// `Some(n)` for an opened cell with `n` bombs around, `None` for anything
/// the server still hides.
pub type RawCell = Option<u8>;

/// Board snapshot exactly as the `map` command reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMap {
    rows: Vec<Vec<RawCell>>,
}

impl RawMap {
    pub fn from_rows(rows: Vec<Vec<RawCell>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<RawCell>] {
        &self.rows
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    fn parse(body: &str) -> Self {
        let rows = body
            .lines()
            .filter(|line| line.chars().count() > 1)
            .map(|line| line.chars().map(parse_raw_cell).collect())
            .collect();
        Self { rows }
    }
}

fn parse_raw_cell(c: char) -> RawCell {
    c.to_digit(10).map(|digit| digit as u8)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    New(NewStatus),
    Open(OpenOutcome),
    Map(RawMap),
}

impl Response {
    pub fn command(&self) -> Command {
        match self {
            Response::New(_) => Command::New,
            Response::Open(_) => Command::Open,
            Response::Map(_) => Command::Map,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Response has no command prefix: {0:?}")]
    MissingPrefix(String),
    #[error("Unknown command in response: {0:?}")]
    UnknownCommand(String),
    #[error("Unexpected {command} response body: {body:?}")]
    UnexpectedBody { command: Command, body: String },
}

/// Splits `<command>:[ ]<body>` into the command and its raw body.
pub fn split_frame(text: &str) -> Result<(Command, &str), ProtocolError> {
    let Some((name, rest)) = text.split_once(':') else {
        return Err(ProtocolError::MissingPrefix(text.to_string()));
    };

    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(ProtocolError::MissingPrefix(text.to_string()));
    }

    let command =
        Command::from_name(name).ok_or_else(|| ProtocolError::UnknownCommand(name.to_string()))?;

    let mut chars = rest.chars();
    let body = match chars.next() {
        Some(c) if c.is_whitespace() => chars.as_str(),
        _ => rest,
    };

    Ok((command, body))
}

/// Parses a response body according to the command it answers.
pub fn parse_body(command: Command, body: &str) -> Result<Response, ProtocolError> {
    let body = body.trim();

    match command {
        Command::New if body == SUCCESS_BODY => Ok(Response::New(NewStatus::Ok)),
        Command::New => Ok(Response::New(NewStatus::Err)),
        Command::Open if body == SUCCESS_BODY => Ok(Response::Open(OpenOutcome::Ok)),
        Command::Open if body == LOSE_BODY => Ok(Response::Open(OpenOutcome::Lose)),
        Command::Open => match body.strip_prefix(WIN_PREFIX) {
            Some(token) => Ok(Response::Open(OpenOutcome::Win {
                token: token.to_string(),
            })),
            None => Err(ProtocolError::UnexpectedBody {
                command,
                body: body.to_string(),
            }),
        },
        Command::Map => Ok(Response::Map(RawMap::parse(body))),
    }
}

pub fn parse_response(text: &str) -> Result<Response, ProtocolError> {
    let (command, body) = split_frame(text)?;
    parse_body(command, body)
}

/// Splits one inbound message into the responses it carries. A new response
/// starts at every line beginning with a known `<command>:` prefix.
pub fn split_batch(text: &str) -> Vec<&str> {
    let mut starts = vec![0];
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if offset > 0 && starts_with_command(line) {
            starts.push(offset);
        }
        offset += line.len();
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            text[start..end].trim_end_matches(|c: char| c == '\r' || c == '\n')
        })
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

fn starts_with_command(line: &str) -> bool {
    line.split_once(':')
        .is_some_and(|(name, _)| Command::from_name(name).is_some())
}
