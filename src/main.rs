// src/main.rs

use batchdag::{cli, exec, logging, run, run_worker};

#[tokio::main]
async fn main() {
    let args = cli::parse();

    if let Some(task) = exec::worker_task_from_env() {
        let _ = logging::init_logging(args.log_level);
        std::process::exit(run_worker(&args, &task));
    }

    if let Err(err) = run_main(args).await {
        eprintln!("batchdag error: {err:#}");
        std::process::exit(1);
    }
}

async fn run_main(args: cli::CliArgs) -> anyhow::Result<()> {
    logging::init_logging(args.log_level)?;
    run(args).await
}
