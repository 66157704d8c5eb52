use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::PipeBurstError;
use crate::store::{Coordinate, PipeCategory};

use super::controller::Command;

type Parser = fn(&[&str]) -> Result<Command, PipeBurstError>;

struct Entry {
    usage: &'static str,
    parse: Parser,
}

/// Resolves action names, as sent by buttons or typed by a user, to commands.
pub struct CommandTable {
    entries: BTreeMap<&'static str, Entry>,
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandTable {
    pub fn new() -> Self {
        let mut table = Self {
            entries: BTreeMap::new(),
        };
        table.register("new", "new", |args| no_args(args, Command::StartNewLine));
        table.register("click", "click <lat> <lng>", |args| {
            Ok(Command::Click(coordinate(args)?))
        });
        table.register("finish", "finish", |args| no_args(args, Command::Finish));
        table.register(
            "name",
            "name <category> [pressure=<value>] <name...>",
            parse_name,
        );
        table.register("cancel", "cancel", |args| no_args(args, Command::Cancel));
        table.register("edit", "edit <line-id>", |args| {
            Ok(Command::StartEdit(single(args, "line id")?))
        });
        table.register("move", "move <index> <lat> <lng>", |args| {
            let [index, rest @ ..] = args else {
                return Err(usage_error("move <index> <lat> <lng>"));
            };
            Ok(Command::MovePoint {
                index: number(index, "point index")?,
                to: coordinate(rest)?,
            })
        });
        table.register("remove-point", "remove-point <index>", |args| {
            Ok(Command::RemovePoint(single(args, "point index")?))
        });
        table.register("save", "save", |args| no_args(args, Command::SaveEdit));
        table.register("burst", "burst", |args| no_args(args, Command::StartBurstReport));
        table.register("repair", "repair <line-id>", |args| {
            Ok(Command::Repair(single(args, "line id")?))
        });
        table.register("delete", "delete <line-id>", |args| {
            Ok(Command::Delete(single(args, "line id")?))
        });
        table.register("power", "power", |args| no_args(args, Command::ToggleSystemPower));
        table.register("reset", "reset", |args| no_args(args, Command::ResetAllData));
        table.register("zoom", "zoom <line-id>", |args| {
            Ok(Command::ZoomToLine(single(args, "line id")?))
        });
        table.register("confirm", "confirm <token>", |args| {
            Ok(Command::Confirm(single(args, "token")?))
        });
        table.register("decline", "decline <token>", |args| {
            Ok(Command::Decline(single(args, "token")?))
        });
        table
    }

    pub fn register(&mut self, name: &'static str, usage: &'static str, parse: Parser) {
        self.entries.insert(name, Entry { usage, parse });
    }

    /// `(name, usage)` pairs, sorted by name.
    pub fn usage(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.entries.iter().map(|(name, e)| (*name, e.usage))
    }

    pub fn parse(&self, name: &str, args: &[&str]) -> Result<Command, PipeBurstError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| PipeBurstError::Validation(format!("unknown command '{}'", name)))?;
        (entry.parse)(args)
    }

    /// Parses a whitespace separated line such as `click -17.64 -40.18`.
    pub fn resolve(&self, line: &str) -> Result<Command, PipeBurstError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let (name, args) = words
            .split_first()
            .ok_or_else(|| PipeBurstError::Validation("empty command".into()))?;
        self.parse(name, args)
    }
}

fn usage_error(usage: &str) -> PipeBurstError {
    PipeBurstError::Validation(format!("usage: {}", usage))
}

fn no_args(args: &[&str], command: Command) -> Result<Command, PipeBurstError> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(PipeBurstError::Validation(format!(
            "unexpected arguments: {}",
            args.join(" ")
        )))
    }
}

fn number<T: FromStr>(raw: &str, what: &str) -> Result<T, PipeBurstError> {
    raw.parse()
        .map_err(|_| PipeBurstError::Validation(format!("invalid {} '{}'", what, raw)))
}

fn single<T: FromStr>(args: &[&str], what: &str) -> Result<T, PipeBurstError> {
    match args {
        [raw] => number(raw, what),
        _ => Err(PipeBurstError::Validation(format!("expected one {}", what))),
    }
}

fn coordinate(args: &[&str]) -> Result<Coordinate, PipeBurstError> {
    match args {
        [lat, lng] => Ok(Coordinate::new(number(lat, "latitude")?, number(lng, "longitude")?)),
        _ => Err(PipeBurstError::Validation(
            "expected a coordinate as <lat> <lng>".into(),
        )),
    }
}

fn parse_name(args: &[&str]) -> Result<Command, PipeBurstError> {
    let [category, rest @ ..] = args else {
        return Err(usage_error("name <category> [pressure=<value>] <name...>"));
    };
    let category: PipeCategory = category.parse()?;

    let (nominal_pressure, words) = match rest.split_first() {
        Some((first, words)) if first.starts_with("pressure=") => {
            let raw = first.trim_start_matches("pressure=");
            (Some(number::<f64>(raw, "pressure")?), words)
        }
        _ => (None, rest),
    };

    Ok(Command::FinishLine {
        name: words.join(" "),
        category,
        nominal_pressure,
    })
}
