use anyhow::Result;

use elo_ranking::cli::Command;
use elo_ranking::{
    handle_init, handle_process, handle_rebuild, handle_recalculate, handle_revert, handle_serve,
    interpret,
};

fn main() {
    setup_logging();
    parse_and_execute().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });
}

fn setup_logging() {
    sensible_env_logger::init!();
}

fn parse_and_execute() -> Result<()> {
    let command = interpret();
    execute_command(&command)
}

fn execute_command(command: &Command) -> Result<()> {
    match command {
        Command::Serve { port } => handle_serve(*port),
        Command::Init => handle_init(),
        Command::Process { match_id } => handle_process(*match_id),
        Command::Revert { match_id } => handle_revert(*match_id),
        Command::Recalculate {
            after_match_id,
            players,
            rating_type,
        } => handle_recalculate(*after_match_id, players, rating_type),
        Command::Rebuild => handle_rebuild(),
    }
}
