//! CLI module for Agora
//!
//! Command-line parsing for the `agora` binary. Every research command loads
//! the session file, performs one operation and saves the session back.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod init;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Agora - multi-agent research orchestration
///
/// A team of specialized agents brainstorms, gathers evidence, debates and
/// rates its own progress, improving its instructions along the way.
#[derive(Parser, Debug)]
#[command(
    name = "agora",
    author = "Agora Research <dev@agora-research.org>",
    version,
    about = "Agora - multi-agent research orchestration",
    long_about = "Coordinates a team of specialized research agents through brainstorm,\n\
                  research and discussion rounds, a satisfaction gate, and self-improvement\n\
                  of each agent's instructions. State lives in a session file between commands.",
    after_help = "EXAMPLES:\n    \
                  agora init                                # Write agora.toml\n    \
                  agora team                                # Add the default research team\n    \
                  agora topic \"Efficient transformers\"      # Set the research topic\n    \
                  agora brainstorm                          # Run a brainstorm round\n    \
                  agora discuss \"evaluation methodology\"    # Run a discussion round\n    \
                  agora snapshot                            # Ask the team if it is satisfied\n    \
                  agora render --format latex -o paper.tex  # Write the paper"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "agora.toml", global = true)]
    pub config: PathBuf,

    /// Path to the session file
    #[arg(
        short,
        long,
        default_value = "agora.session.json",
        env = "AGORA_SESSION",
        global = true
    )]
    pub session: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a workspace with an agora.toml
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,

        /// Default model for the team
        #[arg(long)]
        model: Option<String>,

        /// Configure research rounds to run without web search
        #[arg(long)]
        offline: bool,
    },

    /// Add one agent to the roster
    AddAgent {
        /// Display name, e.g. "Dr. Quantum"
        name: String,

        /// Free-text specialty
        specialty: String,

        /// Model identifier (defaults to inference.default_model)
        #[arg(long)]
        model: Option<String>,

        /// Explicit agent id (derived from the name by default)
        #[arg(long)]
        id: Option<String>,
    },

    /// Add the configured default team to the roster
    Team,

    /// Set the research topic
    Topic {
        /// Topic text
        topic: String,

        /// Archive the current cycle and start a new one on this topic
        #[arg(long)]
        reset: bool,
    },

    /// Run a brainstorm round
    Brainstorm,

    /// Run a research round (search plus synthesized notes)
    Research,

    /// Run a discussion round on a sub-topic
    Discuss {
        /// Sub-topic to debate
        sub_topic: String,
    },

    /// Collect satisfaction ratings and check convergence
    Snapshot,

    /// Improve agent configurations from their history
    Improve {
        /// Agent id to improve
        agent: Option<String>,

        /// Improve every agent on the roster
        #[arg(long, conflicts_with = "agent")]
        all: bool,
    },

    /// Restore an agent's previous configuration
    Rollback {
        /// Agent id
        agent: String,
    },

    /// Show the session status
    Status,

    /// Render the artifact as a document
    Render {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = RenderFormat::Markdown)]
        format: RenderFormat,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the artifact export as JSON
    Export {
        /// Export the full session state instead of the artifact
        #[arg(long)]
        state: bool,
    },
}

/// Document formats selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RenderFormat {
    Markdown,
    Latex,
}

impl From<RenderFormat> for crate::render::DocumentFormat {
    fn from(format: RenderFormat) -> Self {
        match format {
            RenderFormat::Markdown => crate::render::DocumentFormat::Markdown,
            RenderFormat::Latex => crate::render::DocumentFormat::Latex,
        }
    }
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
