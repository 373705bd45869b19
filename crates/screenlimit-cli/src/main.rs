use clap::{Parser, Subcommand};

mod commands;
mod host;

#[derive(Parser)]
#[command(name = "screenlimit", version, about = "Daily screen-time limits")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Choose which applications are limited
    Apps {
        #[command(subcommand)]
        action: commands::apps::AppsAction,
    },
    /// Daily limit in minutes
    Limit {
        #[command(subcommand)]
        action: commands::limit::LimitAction,
    },
    /// Reminder preferences
    Reminders {
        #[command(subcommand)]
        action: commands::reminders::RemindersAction,
    },
    /// Engine configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Show today's usage and enforcement state
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the daily reset if it is due
    Reset {
        /// Reset now even if today's reset already ran
        #[arg(long)]
        force: bool,
    },
    /// Run the enforcement engine
    Monitor {
        #[command(subcommand)]
        action: commands::monitor::MonitorAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("SCREENLIMIT_LOG")
                .unwrap_or_else(|_| "screenlimit_core=info,screenlimit_cli=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Apps { action } => commands::apps::run(action),
        Commands::Limit { action } => commands::limit::run(action),
        Commands::Reminders { action } => commands::reminders::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Status { json } => commands::status::run(json),
        Commands::Reset { force } => commands::reset::run(force),
        Commands::Monitor { action } => commands::monitor::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
