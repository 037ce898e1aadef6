use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Elo rating engine for 1v1 and 2v2 matches")]
pub struct Cli {
    /// Command
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
#[clap(rename_all = "lower_case")]
pub enum Command {
    /// Start the backend server
    Serve {
        /// Port number (optional, defaults to 3000)
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
    },
    /// Create the database schema if it does not exist
    Init,
    /// Rate one stored match
    Process {
        match_id: i64,
    },
    /// Undo every rating change written for one match
    Revert {
        match_id: i64,
    },
    /// Replay matches after the given id that involve the given players
    Recalculate {
        after_match_id: i64,
        /// Player ids whose later matches are replayed
        #[arg(short, long, num_args = 1.., required = true)]
        players: Vec<i64>,
        /// global, 1v1 or 2v2
        #[arg(short, long, default_value = "global")]
        rating_type: String,
    },
    /// Drop all ratings and replay every match from scratch
    Rebuild,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recalculate_parses_players() {
        let cli = Cli::parse_from(["elo_ranking", "recalculate", "12", "--players", "3", "8"]);
        assert_eq!(
            cli.command,
            Command::Recalculate {
                after_match_id: 12,
                players: vec![3, 8],
                rating_type: "global".to_string(),
            }
        );
    }

    #[test]
    fn test_serve_default_port() {
        let cli = Cli::parse_from(["elo_ranking", "serve"]);
        assert_eq!(cli.command, Command::Serve { port: 3000 });
    }
}
