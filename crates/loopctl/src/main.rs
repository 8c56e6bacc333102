use clap::Parser;

fn main() {
    let args = loopctl::Args::parse();
    loopctl::init_logging(&args.log);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build();

    let runtime = match runtime {
        Ok(runtime) => runtime,
        Err(error) => {
            tracing::error!(%error, "couldn't build Tokio runtime");
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(loopctl::run(args));

    // Blocking SQLite reads may still be parked on a full row buffer.
    runtime.shutdown_background();

    if let Err(error) = result {
        tracing::error!(error = format!("{error:#}"), "loopctl failed");
        std::process::exit(1);
    }
}
