// src/main.rs

use std::process::ExitCode;

use stagehand::{cli, logging, run};

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("stagehand: {err:#}");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(code) => exit_code(code),
        Err(err) => {
            tracing::error!(phase = %err.phase(), "{err}");
            eprintln!("stagehand: {err}");
            exit_code(err.exit_code())
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
