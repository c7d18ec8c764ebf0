use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use super::{parse_command, Console};

/// Interactive loop. Each command is awaited before the next line is read, so at
/// most one login attempt is ever in flight.
pub fn run_repl(rt: &tokio::runtime::Runtime, console: &mut Console) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    println!("stockroom console. Type 'help' for commands.");
    loop {
        let prompt = format!("{}> ", console.screen());
        let line = match editor.readline(&prompt) {
            Ok(l) => l,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        if !line.trim().is_empty() {
            let _ = editor.add_history_entry(line.as_str());
        }
        let cmd = match parse_command(&line) {
            Ok(c) => c,
            Err(msg) => {
                eprintln!("{}", msg);
                continue;
            }
        };
        match rt.block_on(console.execute(cmd)) {
            Some(out) if out.is_empty() => {}
            Some(out) => println!("{}", out),
            None => break,
        }
    }
    Ok(())
}

/// Run a single command line and print its output.
pub fn run_once(rt: &tokio::runtime::Runtime, console: &mut Console, line: &str) -> Result<()> {
    let cmd = parse_command(line).map_err(anyhow::Error::msg)?;
    if let Some(out) = rt.block_on(console.execute(cmd)) {
        if !out.is_empty() {
            println!("{}", out);
        }
    }
    Ok(())
}
