mod config;
mod logging;
mod run;

pub use config::RunFile;
pub use logging::{init_logging, LogArgs, LogFormat};
pub use run::{run_loop, run_poll, run_stream, Summary};

use std::path::PathBuf;

/// loopctl delivers the rows of a query in resumable batches, or pushes them
/// from a polled table or streamed query, writing items to stdout as JSON lines.
#[derive(Debug, clap::Parser)]
#[clap(author, version, about)]
pub struct Args {
    #[clap(flatten)]
    pub log: LogArgs,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Paginate the `loop` query of the run file until it's exhausted.
    Run(RunArgs),
    /// Poll the `poll` table of the run file on its interval.
    Poll(PollArgs),
    /// Stream the rows of the `stream` query of the run file.
    Stream(StreamArgs),
}

#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Path to the YAML run file.
    #[clap(long, env = "LOOPCTL_CONFIG")]
    pub config: PathBuf,
}

#[derive(Debug, clap::Args)]
pub struct PollArgs {
    #[clap(flatten)]
    pub run: RunArgs,
    /// Exit after this many poll cycles have finished,
    /// including cycles which found no rows or which failed.
    /// By default, polling continues until interrupted.
    #[clap(long)]
    pub max_cycles: Option<u64>,
}

#[derive(Debug, clap::Args)]
pub struct StreamArgs {
    #[clap(flatten)]
    pub run: RunArgs,
    /// Exit after this many rows.
    #[clap(long)]
    pub max_rows: Option<u64>,
}

/// Run the command of `args`, writing delivered items to stdout.
pub async fn run(args: Args) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();

    let summary = match args.command {
        Command::Run(RunArgs { config }) => {
            run_loop(&RunFile::load(&config)?, &mut stdout).await?
        }
        Command::Poll(PollArgs { run, max_cycles }) => {
            run_poll(&RunFile::load(&run.config)?, &mut stdout, max_cycles, ctrl_c()).await?
        }
        Command::Stream(StreamArgs { run, max_rows }) => {
            run_stream(&RunFile::load(&run.config)?, &mut stdout, max_rows, ctrl_c()).await?
        }
    };
    tracing::debug!(?summary, "finished");

    Ok(())
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("caught interrupt; stopping"),
        Err(error) => {
            tracing::error!(%error, "failed to listen for interrupt");
            std::future::pending::<()>().await
        }
    }
}
