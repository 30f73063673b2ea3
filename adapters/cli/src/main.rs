#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a Learninator session headlessly.

mod maze_transfer;

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use learninator_core::BrainKind;
use learninator_maze::{Maze, MazeConfig};
use learninator_system_simulation::{Session, SessionConfig};
use maze_transfer::MazeSnapshot;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Decision-making variant selectable from the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BrainArg {
    Qlearn,
    Sarsa,
    Td,
    Dqn,
    Ga,
}

impl From<BrainArg> for BrainKind {
    fn from(value: BrainArg) -> Self {
        match value {
            BrainArg::Qlearn => Self::Qlearn,
            BrainArg::Sarsa => Self::Sarsa,
            BrainArg::Td => Self::Td,
            BrainArg::Dqn => Self::Dqn,
            BrainArg::Ga => Self::Ga,
        }
    }
}

/// Runs agents through an open world or a maze and reports how they learn.
#[derive(Debug, Parser)]
#[command(name = "learninator", version)]
struct Cli {
    /// TOML file with session options; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 10_000)]
    ticks: u64,
    /// Seed for every random stream.
    #[arg(long)]
    seed: Option<u64>,
    /// Number of agents.
    #[arg(long)]
    agents: Option<usize>,
    /// Decision-making variant driving every agent.
    #[arg(long, value_enum)]
    brain: Option<BrainArg>,
    /// Host each brain on a worker thread.
    #[arg(long)]
    worker: bool,
    /// Carve a maze with the configured (or default) options.
    #[arg(long)]
    maze: bool,
    /// Print the maze solution.
    #[arg(long)]
    cheats: bool,
    /// Load the maze from a `maze:v1:...` string instead of carving one.
    #[arg(long, value_name = "SNAPSHOT")]
    import_maze: Option<String>,
    /// Print the maze as a `maze:v1:...` string before running.
    #[arg(long)]
    export_maze: bool,
    /// Ticks between progress reports.
    #[arg(long, default_value_t = 1000)]
    report_every: u64,
}

/// Entry point for the Learninator command-line interface.
fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let (mut session, maze_config) = match &cli.import_maze {
        Some(encoded) => {
            let (maze, maze_config) = import_maze(encoded, cli.cheats)?;
            (Session::with_maze(config, maze), Some(maze_config))
        }
        None => {
            let maze_config = config.maze.clone();
            (Session::new(config), maze_config)
        }
    };

    if let (Some(maze_config), Some(maze)) = (maze_config.as_ref(), session.maze()) {
        if cli.export_maze {
            let encoded = MazeSnapshot::capture(maze_config, maze)
                .encode()
                .context("failed to encode maze snapshot")?;
            println!("{encoded}");
        }
        if cli.cheats || maze_config.cheats {
            let path: Vec<String> = maze
                .solution()
                .iter()
                .map(|cell| cell.get().to_string())
                .collect();
            println!("solution: {}", path.join(" -> "));
        }
    }

    let report_every = cli.report_every.max(1);
    while session.clock() < cli.ticks {
        let _ = session.advance_frame();
        let clock = session.clock();
        if clock % report_every == 0 {
            for agent in session.analytics().report().agents {
                info!(clock, agent = agent.agent.get(), smoothed = agent.smoothed, "reward");
            }
        }
    }

    let report = session.analytics().report();
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("failed to encode report")?
    );
    Ok(())
}

fn import_maze(encoded: &str, cheats: bool) -> Result<(Maze, MazeConfig)> {
    let mut snapshot = MazeSnapshot::decode(encoded).context("failed to decode maze snapshot")?;
    snapshot.cheats |= cheats;
    let maze = snapshot.restore().context("failed to rebuild imported maze")?;
    Ok((maze, snapshot.config()))
}

fn load_config(cli: &Cli) -> Result<SessionConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => SessionConfig::default(),
    };

    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(agents) = cli.agents {
        config.agent_count = agents;
    }
    if let Some(brain) = cli.brain {
        config.agent.brain_type = brain.into();
    }
    config.agent.worker |= cli.worker;
    if cli.maze || cli.cheats {
        let maze = config.maze.get_or_insert_with(MazeConfig::default);
        maze.cheats |= cli.cheats;
    }
    Ok(config)
}
