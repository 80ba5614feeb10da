use c8vm::{
    cli::{rom_config, Cli, CliCommand},
    render::panic_cleanup_terminal,
    run::{
        core::{spawn_run_threads, DEFAULT_EXECUTION_FREQUENCY},
        rom::Rom,
    },
    trace::trace,
};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossterm::style::Stylize;

use std::{io::stdout, panic};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        CliCommand::Run {
            path,
            hz,
            log,
            kind,
            halt_on_illegal,
            memory,
            quirks,
        } => {
            // initialize tui logger
            if let Some(level) = log {
                tui_logger::init_logger(level.to_level_filter())
                    .context("Failed to initialize logger")?;
                tui_logger::set_default_level(level.to_level_filter());
            }

            let config = rom_config(kind, quirks, memory, log, halt_on_illegal);
            let rom = Rom::read(&path, config)
                .with_context(|| format!("Failed to read ROM at {}", path.display()))?;
            let rom_name = rom.config.name.clone();

            // leave the terminal usable if any thread panics while it is in raw mode
            let default_panic = panic::take_hook();
            panic::set_hook(Box::new(move |info| {
                if let Err(e) = panic_cleanup_terminal() {
                    eprintln!("Failed to clean up terminal: {}", e);
                }
                default_panic(info);
            }));

            let (render_thread, main_thread) = spawn_run_threads(rom, hz);

            let run_result = main_thread
                .join()
                .map_err(|_| anyhow!("Event loop panicked"))?;
            render_thread
                .join()
                .map_err(|_| anyhow!("Render thread panicked"))??;

            println!("\n  {} \"{}\"", "Stopped".green().bold(), rom_name);

            match run_result {
                Ok(analytics) => println!("{}", analytics),
                Err(e) => return Err(anyhow!("Runner stopped: {}", e)),
            }
        }

        CliCommand::Trace {
            path,
            steps,
            log,
            kind,
            memory,
            quirks,
        } => {
            if let Some(level) = log {
                simple_logger::init_with_level(level.to_level())
                    .context("Failed to initialize logger")?;
            }

            let config = rom_config(kind, quirks, memory, log, false);
            let rom = Rom::read(&path, config)
                .with_context(|| format!("Failed to read ROM at {}", path.display()))?;

            // timers advance as if running at the default frequency
            trace(rom, steps, DEFAULT_EXECUTION_FREQUENCY, &mut stdout().lock())?;
        }
    }

    Ok(())
}

