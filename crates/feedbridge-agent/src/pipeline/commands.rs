//! Command handlers. Each returns the reply text or a [`CommandError`] that
//! the router renders for the feed.

use std::fmt::Write as _;

use tracing::info;

use crate::error::CommandError;
use crate::eval::{evaluate, format_number};
use crate::pipeline::router::{CommandArgs, CommandContext, CommandKind};
use crate::tally::tally;

/// Records published by `log` when no count is given.
pub const DEFAULT_LOG_COUNT: usize = 100;
/// Upper bound on `log <count>`.
pub const MAX_LOG_COUNT: usize = 1000;

pub(crate) async fn run(
    kind: CommandKind,
    args: &CommandArgs,
    ctx: &CommandContext<'_>,
) -> Result<String, CommandError> {
    if args.wants_help() && kind != CommandKind::Keyword {
        return Ok(usage(kind, ctx.prefix));
    }
    match kind {
        CommandKind::Calc => calc(args),
        CommandKind::Talk => talk(args, ctx).await,
        CommandKind::Help => Ok(help(args, ctx.prefix)),
        CommandKind::Log => log(args, ctx).await,
        CommandKind::Stats => {
            let records = ctx.cache.snapshot().map(|r| &**r);
            Ok(tally(records, &ctx.now).render())
        }
        CommandKind::Translate => translate(args, ctx).await,
        CommandKind::Keyword => keyword(args, ctx).await,
    }
}

/// Usage text for one command family.
pub fn usage(kind: CommandKind, prefix: &str) -> String {
    let p = prefix;
    match kind {
        CommandKind::Calc => format!(
            "{p}calc <expr> - evaluate arithmetic. Operators + - * / % ^, \
             functions cos exp log sin tan, constants PI π E"
        ),
        CommandKind::Talk => format!("{p}talk <text> - have a short exchange with the bot"),
        CommandKind::Help => format!("{p}help [command] - list commands or describe one"),
        CommandKind::Log => format!(
            "{p}log [count] - publish the newest messages (default {DEFAULT_LOG_COUNT}, \
             max {MAX_LOG_COUNT}) and reply with the link"
        ),
        CommandKind::Stats => {
            format!("{p}stats - busiest hosts this week and last week")
        }
        CommandKind::Translate => {
            format!("{p}translate <lang> <text> - translate text, e.g. {p}translate ja hello")
        }
        CommandKind::Keyword => format!(
            "{p}keyword add <name> <value> | remove <name> | list | sync - \
             reply with <value> whenever <name> appears in a message"
        ),
    }
}

fn help(args: &CommandArgs, prefix: &str) -> String {
    match args.name.as_deref() {
        Some(name) => {
            let word = name.trim_start_matches(prefix);
            match CommandKind::from_word(word) {
                Some(kind) => usage(kind, prefix),
                None if word == "--help" => usage(CommandKind::Help, prefix),
                None => format!("unknown command: {name}"),
            }
        }
        None => {
            let words: Vec<String> = CommandKind::ALL
                .iter()
                .map(|k| format!("{prefix}{}", k.word()))
                .collect();
            format!(
                "commands: {} (add --help for details)",
                words.join(" ")
            )
        }
    }
}

fn calc(args: &CommandArgs) -> Result<String, CommandError> {
    let body = args.body.as_deref().unwrap_or_default();
    let value = evaluate(body)?;
    Ok(format!("= {}", format_number(value)))
}

async fn talk(args: &CommandArgs, ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let text = required(&args.text, "talk <text>")?;
    Ok(ctx.backends.dialogue.respond(text).await?)
}

async fn translate(args: &CommandArgs, ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let lang = required(&args.lang, "translate <lang> <text>")?;
    let text = required(&args.text, "translate <lang> <text>")?;
    Ok(ctx.backends.translator.translate(text, lang).await?)
}

async fn log(args: &CommandArgs, ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let count = match args.count.as_deref() {
        None => DEFAULT_LOG_COUNT,
        Some(n) => n
            .parse::<usize>()
            .map_err(|_| CommandError::Syntax(format!("not a count: {n}")))?
            .min(MAX_LOG_COUNT),
    };
    if count == 0 || ctx.cache.is_empty() {
        return Ok("nothing to publish".to_string());
    }

    let newest: Vec<_> = ctx.cache.snapshot().take(count).collect();
    let mut content = String::new();
    for record in newest.iter().rev() {
        let f = &record.fields;
        let _ = writeln!(
            content,
            "{} {} {}: {}",
            f.date, f.time, f.origin_host, f.message
        );
    }
    let filename = format!("chat-log-{}.txt", newest[0].id);
    let url = ctx.backends.paste.publish(&filename, &content).await?;
    info!(records = newest.len(), %url, "chat log published");
    Ok(url)
}

/// Sub-commands of `keyword`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeywordAction {
    Add,
    Remove,
    List,
    Sync,
    Help,
}

const KEYWORD_ACTIONS: &[(&str, KeywordAction)] = &[
    ("add", KeywordAction::Add),
    ("remove", KeywordAction::Remove),
    ("list", KeywordAction::List),
    ("sync", KeywordAction::Sync),
    ("--help", KeywordAction::Help),
];

async fn keyword(args: &CommandArgs, ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let token = args.command.as_deref().unwrap_or_default();
    let action = KEYWORD_ACTIONS
        .iter()
        .find(|(name, _)| *name == token)
        .map(|(_, action)| *action)
        .ok_or_else(|| {
            CommandError::Syntax(format!(
                "unknown keyword command '{token}', try {}keyword --help",
                ctx.prefix
            ))
        })?;

    let keywords = ctx.keywords;
    match action {
        KeywordAction::Add => {
            let hint = "keyword add <name> <value>";
            let name = required(&args.name, hint)?;
            let value = required(&args.value, hint)?;
            if keywords.register(name, value).await? {
                Ok(format!("keyword added: {name}"))
            } else {
                Ok(format!("keyword already exists: {name}"))
            }
        }
        KeywordAction::Remove => {
            let name = required(&args.name, "keyword remove <name>")?;
            if keywords.unregister(name).await? {
                Ok(format!("keyword removed: {name}"))
            } else {
                Ok(format!("no such keyword: {name}"))
            }
        }
        KeywordAction::List => {
            let names = keywords.names();
            if names.is_empty() {
                Ok("no keywords registered".to_string())
            } else {
                Ok(format!("keywords: {}", names.join(", ")))
            }
        }
        KeywordAction::Sync => {
            let count = keywords.sync().await?;
            Ok(format!("{count} keywords synchronised"))
        }
        KeywordAction::Help => Ok(usage(CommandKind::Keyword, ctx.prefix)),
    }
}

fn required<'a>(arg: &'a Option<String>, usage: &str) -> Result<&'a str, CommandError> {
    arg.as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CommandError::Syntax(format!("usage: {usage}")))
}
