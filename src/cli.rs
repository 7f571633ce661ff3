use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "aegris_sim")]
#[command(version, about = "Portfolio allocation simulator and dashboard service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP + websocket service (default)
    Serve {
        /// Listen port (overrides SERVER_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Replay the dataset offline with the configured policy and write a report
    Evaluate {
        /// Upper bound on steps; the run also stops at the end of the data
        #[arg(short, long, default_value_t = 10_000)]
        steps: usize,

        /// Output directory for the CSV artifacts (overrides REPORT_DIR)
        #[arg(short, long)]
        report_dir: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_serve() {
        let cli = Cli::try_parse_from(["aegris_sim"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_evaluate_args() {
        let cli = Cli::try_parse_from(["aegris_sim", "evaluate", "--steps", "250", "--report-dir", "out"]).unwrap();
        match cli.command {
            Some(Commands::Evaluate { steps, report_dir }) => {
                assert_eq!(steps, 250);
                assert_eq!(report_dir, Some(PathBuf::from("out")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
