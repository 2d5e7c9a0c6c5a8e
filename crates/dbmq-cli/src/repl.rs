//! Control prompt on stdin.
//!
//! Commands:
//!   help           – show this list
//!   mappings       – print the loaded mapping table
//!   exit | quit    – stop the bridge

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use dbmq_engine::MappingTable;
use tracing::info;

use crate::Shutdown;

/// What the prompt should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    Exit,
}

/// Read commands until `exit`, a shutdown request or end of input.
///
/// End of input only closes the prompt; the bridge keeps running, so the
/// binary can be started without a terminal.
pub fn run(table: Arc<MappingTable>, shutdown: Arc<Shutdown>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.is_requested() {
            break;
        }

        print!("# ");
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => {
                info!("stdin closed, control prompt disabled");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        if execute(line.trim(), &table, &mut stdout) == Action::Exit {
            shutdown.request();
            break;
        }
    }
}

/// Run one command, writing any output to `out`.
pub fn execute(cmd: &str, table: &MappingTable, out: &mut impl Write) -> Action {
    match cmd {
        "" => {}
        "exit" | "quit" => return Action::Exit,
        "help" => {
            let _ = writeln!(out, "  {}      show this list", "help".bold());
            let _ = writeln!(out, "  {}  print the loaded mapping table", "mappings".bold());
            let _ = writeln!(out, "  {}      stop the bridge (also: quit)", "exit".bold());
        }
        "mappings" => print_mappings(table, out),
        other => {
            let _ = writeln!(
                out,
                "{} '{}'. Type {} for available commands.",
                "Unknown command:".red(),
                other.yellow(),
                "help".bold()
            );
        }
    }
    Action::Continue
}

fn print_mappings(table: &MappingTable, out: &mut impl Write) {
    if table.is_empty() {
        let _ = writeln!(out, "  {}", "no mappings configured".dimmed());
        return;
    }
    for (index, rule) in table.iter().enumerate() {
        let _ = writeln!(out, "  {:>3}  {}", index, rule);
    }
}
