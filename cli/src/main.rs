#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::exit;

use clap::{ArgGroup, Parser};
use tracing::{error, info};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;

use lc3_emulator::Machine;

mod console;

use crate::console::TerminalConsole;

#[derive(Parser)]
#[clap(version, about, group = ArgGroup::new("format"))]
struct Opt {
    /// Image files to load, in order. Later images overwrite earlier ones.
    #[clap(required = true, parse(from_os_str), value_name = "IMAGE")]
    images: Vec<PathBuf>,

    /// Increase the level of verbosity. Can be used multiple times.
    #[clap(short, long, parse(from_occurrences))]
    verbose: u8,

    /// Force colored log output. Default is to check if stderr is a tty
    #[clap(short = 'c', long, group = "format")]
    color: bool,

    /// Force non-colored log output. Default is to check if stderr is a tty
    #[clap(short = 'C', long, group = "format")]
    no_color: bool,

    /// Leave the condition codes untouched on lea (rev 2 behavior)
    #[clap(long)]
    lea_keeps_cond: bool,
}

impl Opt {
    const fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "lc3_emulator=debug,lc3=debug,info",
            2 => "lc3_emulator=trace,lc3=trace,debug",
            3..=u8::MAX => "trace",
        }
    }

    fn should_use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            atty::is(atty::Stream::Stderr)
        }
    }

    fn filter_layer(&self) -> EnvFilter {
        // Parse the log level from the env, or infer it from the args
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(self.log_filter()))
            .unwrap()
    }
}

fn run(opt: &Opt) -> Result<(), Box<dyn std::error::Error>> {
    let console = TerminalConsole::new()?;
    let mut machine = Machine::new(console);
    machine.set_lea_sets_cond(!opt.lea_keeps_cond);

    for path in &opt.images {
        machine.load_image_file(path)?;
    }

    info!("running");
    machine.run()?;
    info!(registers = %machine.registers, "end of program");

    Ok(())
}

fn main() {
    let opt = Opt::parse();

    // Logs go to stderr so they never mix with guest console output
    let fmt_layer = tracing_subscriber::fmt::layer()
        .without_time()
        .with_ansi(opt.should_use_colors())
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(opt.filter_layer())
        .with(fmt_layer)
        .init();

    if let Err(e) = run(&opt) {
        error!("{}", e);
        exit(1);
    }
}
