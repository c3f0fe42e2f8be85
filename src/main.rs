use std::sync::Arc;

use clap::Parser;

use docker_tar_pusher::cli::Args;
use docker_tar_pusher::progress::ProgressKind;
use docker_tar_pusher::{OutputManager, Result, TarPusher};

#[tokio::main]
async fn main() {
    let args = Args::parse().from_env();
    let output = OutputManager::new(args.verbose, args.quiet);

    if let Err(e) = run(args, output.clone()).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(args: Args, output: OutputManager) -> Result<()> {
    let config = args.into_config()?;

    let progress_output = output.clone();
    let pusher = TarPusher::new(config)?
        .with_output(output.clone())
        .with_progress(Arc::new(move |event| {
            let label = match event.kind {
                ProgressKind::Layer => "layer",
                ProgressKind::Config => "config",
                ProgressKind::Manifest => "manifest",
            };
            progress_output.info(&format!(
                "pushing {} {} ({}/{})",
                label, event.item, event.current, event.total
            ));
        }));

    // Racing against ctrl_c drops the in-flight push future on interrupt,
    // which releases the temporary working directory before the process
    // exits.
    tokio::select! {
        result = pusher.push() => result,
        _ = tokio::signal::ctrl_c() => {
            output.warning("interrupted, cleaning up");
            Err(std::io::Error::new(std::io::ErrorKind::Interrupted, "push interrupted").into())
        }
    }
}
