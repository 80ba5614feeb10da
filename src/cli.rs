use crate::run::{
    core::{DEFAULT_EXECUTION_FREQUENCY, MAX_EXECUTION_FREQUENCY, MIN_EXECUTION_FREQUENCY},
    mem::{DEFAULT_MEMORY_SIZE, MAX_MEMORY_SIZE, MIN_MEMORY_SIZE},
    quirk::{KeyWait, Quirks, RomKind},
    rom::RomConfig,
};

use clap::{value_parser, Args, Parser, Subcommand, ValueEnum};
use log::{Level, LevelFilter};
use std::path::PathBuf;

const DEFAULT_TRACE_STEPS: usize = 100;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
/// C8VM: CHIP-8 interpreter with selectable compatibility quirks.
/// Runs ROMs in the terminal or traces them headlessly.
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindOption {
    CHIP8,
    COSMACVIP,
    CHIP48,
}

impl KindOption {
    pub fn to_kind(self) -> RomKind {
        match self {
            KindOption::CHIP8 => RomKind::CHIP8,
            KindOption::COSMACVIP => RomKind::COSMACVIP,
            KindOption::CHIP48 => RomKind::CHIP48,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyWaitOption {
    Held,
    Press,
    Release,
}

impl KeyWaitOption {
    pub fn to_key_wait(self) -> KeyWait {
        match self {
            KeyWaitOption::Held => KeyWait::Held,
            KeyWaitOption::Press => KeyWait::Press,
            KeyWaitOption::Release => KeyWait::Release,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevelOption {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevelOption {
    pub fn to_level(self) -> Level {
        match self {
            LogLevelOption::Trace => Level::Trace,
            LogLevelOption::Debug => Level::Debug,
            LogLevelOption::Info => Level::Info,
            LogLevelOption::Warn => Level::Warn,
            LogLevelOption::Error => Level::Error,
        }
    }

    pub fn to_level_filter(self) -> LevelFilter {
        self.to_level().to_level_filter()
    }
}

/// Overrides applied on top of the quirks of the selected kind
///
/// A bare flag turns its quirk on and `--flag=false` turns it off
#[derive(Args, Clone, Copy, Debug, Default)]
pub struct QuirkArgs {
    /// 8XY6 / 8XYE shift VY into VX
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    pub shift_vy: Option<bool>,

    /// 8XY1 / 8XY2 / 8XY3 reset VF
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    pub logic_clears_vf: Option<bool>,

    /// FX55 / FX65 advance the index register
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    pub index_increment: Option<bool>,

    /// DXYN wraps sprites around the display edges instead of clipping
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    pub wrap: Option<bool>,

    /// FX1E sets VF when the index register leaves the 12 bit address range
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    pub index_overflow_vf: Option<bool>,

    /// BNNN jumps to NNN + VX
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true", value_name = "BOOL")]
    pub jump_vx: Option<bool>,

    /// When FX0A considers a key entered
    #[arg(long, value_enum, value_name = "POLICY")]
    pub key_wait: Option<KeyWaitOption>,
}

impl QuirkArgs {
    pub fn apply(&self, quirks: Quirks) -> Quirks {
        Quirks {
            shift_reads_vy: self.shift_vy.unwrap_or(quirks.shift_reads_vy),
            logic_clears_vf: self.logic_clears_vf.unwrap_or(quirks.logic_clears_vf),
            load_store_increments_index: self
                .index_increment
                .unwrap_or(quirks.load_store_increments_index),
            draw_wraps: self.wrap.unwrap_or(quirks.draw_wraps),
            index_overflow_sets_vf: self
                .index_overflow_vf
                .unwrap_or(quirks.index_overflow_sets_vf),
            jump_reads_vx: self.jump_vx.unwrap_or(quirks.jump_reads_vx),
            key_wait: self
                .key_wait
                .map_or(quirks.key_wait, KeyWaitOption::to_key_wait),
        }
    }
}

#[derive(Subcommand)]
pub enum CliCommand {
    /// C8VM RUN: Loads a CHIP-8 ROM and runs it in the terminal
    Run {
        /// Path of the ROM to load
        #[arg(value_name = "ROM")]
        path: PathBuf,

        /// Sets the instructions executed per second
        #[arg(
            long,
            default_value_t = DEFAULT_EXECUTION_FREQUENCY,
            value_parser = value_parser!(u32).range(MIN_EXECUTION_FREQUENCY as i64..=MAX_EXECUTION_FREQUENCY as i64)
        )]
        hz: u32,

        /// Enable logging
        #[arg(short, long, value_enum, value_name = "LEVEL")]
        log: Option<LogLevelOption>,

        /// Sets the ROM kind
        #[arg(long, value_enum, default_value_t = KindOption::CHIP8)]
        kind: KindOption,

        /// Stops the interpreter at the first undecodable instruction
        #[arg(long)]
        halt_on_illegal: bool,

        /// Sets the memory size in bytes
        #[arg(
            long,
            value_name = "BYTES",
            default_value_t = DEFAULT_MEMORY_SIZE as u32,
            value_parser = value_parser!(u32).range(MIN_MEMORY_SIZE as i64..=MAX_MEMORY_SIZE as i64)
        )]
        memory: u32,

        #[command(flatten)]
        quirks: QuirkArgs,
    },

    /// C8VM TRACE: Runs a CHIP-8 ROM headlessly, dumping the machine state after every step
    Trace {
        /// Path of the ROM to load
        #[arg(value_name = "ROM")]
        path: PathBuf,

        /// Number of instructions to execute
        #[arg(long, default_value_t = DEFAULT_TRACE_STEPS)]
        steps: usize,

        /// Enable logging
        #[arg(short, long, value_enum, value_name = "LEVEL")]
        log: Option<LogLevelOption>,

        /// Sets the ROM kind
        #[arg(long, value_enum, default_value_t = KindOption::CHIP8)]
        kind: KindOption,

        /// Sets the memory size in bytes
        #[arg(
            long,
            value_name = "BYTES",
            default_value_t = DEFAULT_MEMORY_SIZE as u32,
            value_parser = value_parser!(u32).range(MIN_MEMORY_SIZE as i64..=MAX_MEMORY_SIZE as i64)
        )]
        memory: u32,

        #[command(flatten)]
        quirks: QuirkArgs,
    },
}

// config for the ROM being loaded, the name is filled in from the path when it is read
pub fn rom_config(
    kind: KindOption,
    quirks: QuirkArgs,
    memory: u32,
    log: Option<LogLevelOption>,
    halt_on_illegal: bool,
) -> RomConfig {
    let kind = kind.to_kind();
    let mut config = RomConfig::new("", kind);
    config.quirks = quirks.apply(kind.quirks());
    config.memory_size = memory as usize;
    config.logging = log.is_some();
    config.halt_on_illegal = halt_on_illegal;
    config
}
