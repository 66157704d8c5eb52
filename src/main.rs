use std::fs;
use std::io::{self, BufRead, Write};

use pipe_burst_rs::{
    AppConfig, Command, CommandTable, FileStore, NewLine, NoticeLevel, Outcome, PipeBurstError,
    Prompt, RecordingSurface, Session, route_from_geojson_str,
};
use tracing_subscriber::EnvFilter;

type CliSession = Session<FileStore, RecordingSurface>;

fn main() -> Result<(), PipeBurstError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let config = AppConfig::from_env()?;
    let kv = FileStore::open(&config.data_dir)?;
    let mut session = Session::open(&config, kv, RecordingSurface::new())?;
    let table = CommandTable::new();

    println!(
        "Pipeline control panel: {} lines loaded from {}. Type 'help' for commands.",
        session.summaries().len(),
        config.data_dir.display()
    );
    print_lines(&session);

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let input = line.trim();
        if input.is_empty() || input.starts_with('#') {
            continue;
        }

        let words: Vec<&str> = input.split_whitespace().collect();
        let result = match words[0] {
            "quit" | "exit" => break,
            "help" => {
                print_help(&table);
                Ok(())
            }
            "list" => {
                print_lines(&session);
                Ok(())
            }
            "export" => export(&session, &words[1..]),
            "import" => import(&mut session, &table, &words[1..]),
            _ => table.resolve(input).map(|command| {
                let outcome = session.execute(command);
                report(&outcome);
            }),
        };

        if let Err(e) = result {
            eprintln!("error: {}", e);
        }
        io::stdout().flush()?;
    }

    Ok(())
}

fn report(outcome: &Outcome) {
    for notice in &outcome.notices {
        match notice.level {
            NoticeLevel::Error => eprintln!("error: {}", notice.message),
            level => println!("{}: {}", level, notice.message),
        }
    }
    match &outcome.prompt {
        Some(Prompt::Name) => {
            println!("Name the line: name <category> [pressure=<value>] <name...>")
        }
        Some(Prompt::Confirm { token, message }) => {
            println!("{} (confirm {} / decline {})", message, token, token)
        }
        None => {}
    }
}

fn print_help(table: &CommandTable) {
    println!("Commands:");
    for (_, usage) in table.usage() {
        println!("  {}", usage);
    }
    println!("  list");
    println!("  export <path>");
    println!("  import <path> <category> [pressure=<value>] <name...>");
    println!("  quit");
}

fn print_lines(session: &CliSession) {
    let rows = session.summaries();
    if rows.is_empty() {
        println!("(no lines)");
        return;
    }
    for row in rows {
        println!(
            "{:>14}  {:<24} {:<14} {:>8.0} m  {:>4.1} bar  {}",
            row.id,
            row.name,
            row.category,
            row.length_meters,
            row.nominal_pressure,
            if row.bursting { "LEAK" } else { "ok" }
        );
    }
}

fn export(session: &CliSession, args: &[&str]) -> Result<(), PipeBurstError> {
    let [path] = args else {
        return Err(PipeBurstError::Validation("usage: export <path>".into()));
    };
    let collection = session.export_geojson();
    fs::write(path, serde_json::to_string_pretty(&collection)?)?;
    println!("Wrote {} lines to {}", collection.features.len(), path);
    Ok(())
}

/// Adds a line whose route comes from a GeoJSON file. The arguments after the
/// path follow the `name` command.
fn import(
    session: &mut CliSession,
    table: &CommandTable,
    args: &[&str],
) -> Result<(), PipeBurstError> {
    let [path, naming @ ..] = args else {
        return Err(PipeBurstError::Validation(
            "usage: import <path> <category> [pressure=<value>] <name...>".into(),
        ));
    };
    let Command::FinishLine {
        name,
        category,
        nominal_pressure,
    } = table.parse("name", naming)?
    else {
        return Err(PipeBurstError::Validation("expected line naming arguments".into()));
    };

    let points = route_from_geojson_str(&fs::read_to_string(path)?)?;
    let new_line = NewLine {
        name,
        category,
        nominal_pressure,
        points,
    };
    report(&session.execute(Command::ImportLine(new_line)));
    Ok(())
}
