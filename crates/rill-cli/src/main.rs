//! rill CLI - reactive script server.

mod demo;
mod run;
mod serve;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rill")]
#[command(about = "Reactive script server with streamed widgets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the WebSocket server for one or more scripts
    Serve {
        /// Script files to register (cells split on `# %%` markers)
        scripts: Vec<String>,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "8888")]
        port: u16,

        /// Also register the built-in demo script
        #[arg(long)]
        demo: bool,
    },

    /// Run a script once, headlessly, and print the final widget states
    Run {
        /// Path to the script file
        script: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into())
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve {
            scripts,
            host,
            port,
            demo,
        } => {
            serve::execute(&scripts, &host, port, demo).await?;
        }

        Commands::Run { script } => {
            run::execute(&script).await?;
        }
    }

    Ok(())
}
