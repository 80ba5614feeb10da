use crate::run::{rom::Rom, vm::VM};

use anyhow::{anyhow, Result};
use std::{io::Write, sync::mpsc::channel};

/// Runs `steps` instructions without a terminal, writing the machine state after each one
/// and the display once done.
///
/// The timers advance as if instructions ran at `frequency`. Stops early with an error if the
/// ROM is configured to halt on an illegal instruction and hits one.
pub fn trace<W: Write>(rom: Rom, steps: usize, frequency: u32, out: &mut W) -> Result<()> {
    // nothing ever sends input in a trace but the VM still needs somewhere to receive it from
    let (_vm_event_sender, vm_event_receiver) = channel();

    let name = rom.config.name.clone();
    let mut vm = VM::new(rom, vm_event_receiver, frequency);
    vm.time_step = 1.0 / frequency.max(1) as f32;

    writeln!(out, "Tracing \"{}\" for {} steps", name, steps)?;
    write!(out, "{}", vm.state())?;

    for i in 1..=steps {
        let result = vm.step();

        writeln!(out, "-- step {}", i)?;
        write!(out, "{}", vm.state())?;

        result.map_err(|e| anyhow!(e))?;
    }

    writeln!(out, "-- display")?;
    write!(out, "{}", vm.display())?;

    Ok(())
}
