//! pipeprobe command-line entry point.

// The binary is the output layer: tables and envelopes go to stdout.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use pipeprobe::cli::{self, EXIT_OK, exit_code_for, render_error};
use pipeprobe::commands;
use pipeprobe::tracing::{TracingConfig, init_tracing};
use tracing::Instrument;

fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    // clap exits with code 2 on usage errors.
    let cli = cli::parse();

    let config = TracingConfig {
        format: cli.log_format,
        level: cli.effective_level().into(),
    };
    if let Err(e) = init_tracing(config) {
        eprintln!("Warning: {e}");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Fatal error: Failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    let span = pipeprobe::command_span!(cli.command.name());
    let result = runtime.block_on(commands::execute(&cli.command).instrument(span));

    let exit_code = match result.and_then(|outcome| outcome.render(cli.json)) {
        Ok(output) => {
            print!("{output}");
            EXIT_OK
        }
        Err(err) => {
            let code = exit_code_for(&err);
            render_error(err, cli.json);
            code
        }
    };
    drop(runtime);
    std::process::exit(exit_code);
}
