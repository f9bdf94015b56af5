mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    assign::AssignSubcommand, config::ConfigSubcommand, group::GroupSubcommand,
    lesson::LessonSubcommand, protocol::ProtocolSubcommand, user::UserSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "coach",
    about = "Author coaching protocols, assign them to learners and track progress",
    version,
    propagate_version = true
)]
struct Cli {
    /// Workspace root (default: auto-detect from .coach/)
    #[arg(long, global = true, env = "COACH_ROOT")]
    root: Option<PathBuf>,

    /// Acting user recorded on writes
    #[arg(long = "as", global = true, env = "COACH_USER", default_value = "operator")]
    user: String,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .coach/ with a config and an empty database
    Init {
        /// Tenant display name (default: directory name)
        #[arg(long)]
        name: Option<String>,
        /// Product the workspace writes to
        #[arg(long)]
        product: Option<String>,
    },

    /// Run the HTTP API
    Serve {
        /// Port to listen on (default: server.port from config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Author, list and move protocols in and out of documents
    Protocol {
        #[command(subcommand)]
        subcommand: ProtocolSubcommand,
    },

    /// Check conflicts, assign protocols and record progress
    Assign {
        #[command(subcommand)]
        subcommand: AssignSubcommand,
    },

    /// Manage learners
    User {
        #[command(subcommand)]
        subcommand: UserSubcommand,
    },

    /// Manage custom groups
    Group {
        #[command(subcommand)]
        subcommand: GroupSubcommand,
    },

    /// Manage lessons and their tactics
    Lesson {
        #[command(subcommand)]
        subcommand: LessonSubcommand,
    },

    /// Inspect the workspace config
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let user = cli.user;
    let json = cli.json;

    let result = match cli.command {
        Commands::Init { name, product } => {
            cmd::init::run(&root, name.as_deref(), product.as_deref(), json)
        }
        Commands::Serve { port } => cmd::serve::run(&root, port),
        Commands::Protocol { subcommand } => cmd::protocol::run(&root, &user, subcommand, json),
        Commands::Assign { subcommand } => cmd::assign::run(&root, &user, subcommand, json),
        Commands::User { subcommand } => cmd::user::run(&root, &user, subcommand, json),
        Commands::Group { subcommand } => cmd::group::run(&root, &user, subcommand, json),
        Commands::Lesson { subcommand } => cmd::lesson::run(&root, &user, subcommand, json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
