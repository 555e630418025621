//! Table-driven command classification.
//!
//! Every entry is tested against every message; there is no short-circuit.
//! Matching entries run in table order and each one's reply (or error) goes
//! back to the feed before the next entry is tried.

use chrono::{DateTime, FixedOffset};
use regex::{Captures, Regex};
use tracing::{debug, warn};

use feedbridge_core::config::{CommandsConfig, MatchSignal};
use feedbridge_history::RecencyCache;

use crate::backends::Backends;
use crate::keywords::KeywordEngine;
use crate::pipeline::commands;
use crate::pipeline::ReplySink;

/// Command families, in default table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Calc,
    Talk,
    Help,
    Log,
    Stats,
    Translate,
    Keyword,
}

impl CommandKind {
    pub const ALL: [CommandKind; 7] = [
        CommandKind::Calc,
        CommandKind::Talk,
        CommandKind::Help,
        CommandKind::Log,
        CommandKind::Stats,
        CommandKind::Translate,
        CommandKind::Keyword,
    ];

    /// Literal command word following the prefix.
    pub fn word(self) -> &'static str {
        match self {
            CommandKind::Calc => "calc",
            CommandKind::Talk => "talk",
            CommandKind::Help => "help",
            CommandKind::Log => "log",
            CommandKind::Stats => "stats",
            CommandKind::Translate => "translate",
            CommandKind::Keyword => "keyword",
        }
    }

    pub fn from_word(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.word() == word)
    }

    /// Pattern body after `^<prefix><word>`.
    fn arguments(self) -> &'static str {
        match self {
            CommandKind::Calc => r"(?:\s+(?P<command>--help)|\s+(?P<body>.+))$",
            CommandKind::Talk => r"(?:\s+(?P<command>--help)|\s+(?P<text>.+))$",
            CommandKind::Help => r"(?:\s+(?P<name>\S+))?$",
            CommandKind::Log => r"(?:\s+(?P<command>--help)|\s+(?P<count>\d+))?$",
            CommandKind::Stats => r"(?:\s+(?P<command>--help))?$",
            CommandKind::Translate => {
                r"(?:\s+(?P<command>--help)|\s+(?P<lang>[A-Za-z]{2,3}(?:-[A-Za-z]+)?)\s+(?P<text>.+))$"
            }
            CommandKind::Keyword => {
                r"(?:\s+(?P<command>\S+)(?:\s+(?P<name>\S+)(?:\s+(?P<value>.+))?)?)?$"
            }
        }
    }
}

/// One row of the routing table.
#[derive(Debug, Clone)]
pub struct CommandEntry {
    pub kind: CommandKind,
    pub pattern: Regex,
}

impl CommandEntry {
    pub fn new(kind: CommandKind, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            kind,
            pattern: Regex::new(pattern)?,
        })
    }
}

/// Named captures lifted out of a match so handlers can await freely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    pub command: Option<String>,
    pub name: Option<String>,
    pub value: Option<String>,
    pub body: Option<String>,
    pub text: Option<String>,
    pub lang: Option<String>,
    pub count: Option<String>,
}

impl CommandArgs {
    fn from_captures(caps: &Captures<'_>) -> Self {
        let get = |name: &str| caps.name(name).map(|m| m.as_str().to_string());
        Self {
            command: get("command"),
            name: get("name"),
            value: get("value"),
            body: get("body"),
            text: get("text"),
            lang: get("lang"),
            count: get("count"),
        }
    }

    /// `--help` was given as the command flag.
    pub fn wants_help(&self) -> bool {
        self.command.as_deref() == Some("--help")
    }
}

/// Read-only view handed to command handlers.
pub struct CommandContext<'a> {
    pub cache: &'a RecencyCache,
    pub keywords: &'a KeywordEngine,
    pub backends: &'a Backends,
    pub sink: &'a dyn ReplySink,
    pub prefix: &'a str,
    pub now: DateTime<FixedOffset>,
}

/// Trim, map ideographic spaces to ASCII and collapse whitespace runs.
pub fn normalize(body: &str) -> String {
    body.replace('\u{3000}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct CommandRouter {
    entries: Vec<CommandEntry>,
    match_signal: MatchSignal,
}

impl CommandRouter {
    pub fn new(entries: Vec<CommandEntry>, match_signal: MatchSignal) -> Self {
        Self {
            entries,
            match_signal,
        }
    }

    /// Default table for `config.prefix`.
    pub fn from_config(config: &CommandsConfig) -> Result<Self, regex::Error> {
        Ok(Self::new(default_table(&config.prefix)?, config.match_signal))
    }

    pub fn entries(&self) -> &[CommandEntry] {
        &self.entries
    }

    /// Run every matching entry's handler in table order.
    ///
    /// With [`MatchSignal::LastEntry`] the result is whether the final table
    /// entry matched, regardless of earlier ones; with
    /// [`MatchSignal::AnyEntry`] it is whether anything matched.
    pub async fn route(&self, body: &str, ctx: &CommandContext<'_>) -> bool {
        let body = normalize(body);
        let mut last = false;
        let mut any = false;

        for entry in &self.entries {
            let args = entry
                .pattern
                .captures(&body)
                .map(|caps| CommandArgs::from_captures(&caps));
            last = args.is_some();
            any |= last;

            let Some(args) = args else { continue };
            debug!(command = entry.kind.word(), "command matched");
            let reply = match commands::run(entry.kind, &args, ctx).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(command = entry.kind.word(), error = %e, "command failed");
                    e.to_reply()
                }
            };
            if let Err(e) = ctx.sink.send(&reply).await {
                warn!(command = entry.kind.word(), error = %e, "command reply not delivered");
            }
        }

        match self.match_signal {
            MatchSignal::LastEntry => last,
            MatchSignal::AnyEntry => any,
        }
    }
}

/// `calc, talk, help, log, stats, translate, keyword` behind `prefix`.
pub fn default_table(prefix: &str) -> Result<Vec<CommandEntry>, regex::Error> {
    let prefix = regex::escape(prefix);
    CommandKind::ALL
        .into_iter()
        .map(|kind| {
            let pattern = format!("^{prefix}{}{}", kind.word(), kind.arguments());
            CommandEntry::new(kind, &pattern)
        })
        .collect()
}
