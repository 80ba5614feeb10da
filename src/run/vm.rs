use super::{
    disp::Display,
    input::{Key, Keyboard},
    instruct::InstructionParameters,
    interp::{load_program, step, tick_timers, InterpreterIo, MachineState},
    rom::Rom,
};

use std::sync::mpsc::Receiver;

const TIMER_TICKS_PER_SECOND: f32 = 60.0;

#[derive(Debug)]
pub enum VMEvent {
    KeyUp(Key),
    KeyDown(Key),
    Focus,
    Unfocus,
    FocusingKeyDown(Key),
}

// The interpreter only sees the VM through this
struct VMIo<'a> {
    display: &'a mut Display,
    keyboard: &'a Keyboard,
    illegal: Option<InstructionParameters>,
}

impl InterpreterIo for VMIo<'_> {
    fn held_keys(&mut self) -> u16 {
        self.keyboard.down_keys()
    }

    fn get_pixel(&self, x: u8, y: u8) -> bool {
        self.display.get(x, y)
    }

    fn toggle_pixel(&mut self, x: u8, y: u8) {
        self.display.toggle(x, y)
    }

    fn clear_display(&mut self) {
        self.display.clear()
    }

    fn illegal_instruction(&mut self, params: InstructionParameters) {
        self.illegal = Some(params);
    }
}

pub struct VM {
    // Time elapsed since last time step was called
    pub time_step: f32,

    // Time accumulated towards the next 60Hz timer tick
    timer_time: f32,

    // Instructions per second the runner is currently targeting
    pub execution_frequency: u32,

    state: MachineState,
    halt_on_illegal: bool,

    // Event receiver and queue
    event: Receiver<VMEvent>,
    event_queue: Vec<VMEvent>,

    // Virtualized IO
    display: Display,
    display_dirty: bool,
    keyboard: Keyboard,
}

impl VM {
    pub fn new(rom: Rom, recv: Receiver<VMEvent>, execution_frequency: u32) -> Self {
        let mut state = MachineState::new(rom.config.memory_size, rom.config.quirks);
        load_program(&mut state, &rom.data);

        VM {
            time_step: 0.0,
            timer_time: 0.0,
            execution_frequency,
            state,
            halt_on_illegal: rom.config.halt_on_illegal,
            event: recv,
            event_queue: Vec::new(),
            display: Display::default(),
            display_dirty: true,
            keyboard: Keyboard::default(),
        }
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut MachineState {
        &mut self.state
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    pub fn sound_active(&self) -> bool {
        self.state.sound_timer > 0
    }

    pub fn queue_events(&mut self) {
        self.event_queue.extend(self.event.try_iter());
    }

    // drop anything that happened while the runner was not stepping
    pub fn clear_events(&mut self) {
        self.event.try_iter().last();
    }

    pub fn drain_event_queue(&mut self) {
        self.queue_events();
        for event in self.event_queue.drain(..) {
            log::debug!("Processing Event {:?}", event);
            match event {
                VMEvent::KeyUp(key) => self.keyboard.handle_key_up(key),
                VMEvent::KeyDown(key) => self.keyboard.handle_key_down(key),
                VMEvent::Focus => self.keyboard.handle_focus(),
                VMEvent::Unfocus => self.keyboard.handle_unfocus(),
                VMEvent::FocusingKeyDown(key) => self.keyboard.handle_focusing_key_down(key),
            }
        }
    }

    pub fn extract_new_display(&mut self) -> Option<Display> {
        if self.display_dirty {
            self.display_dirty = false;
            Some(self.display.clone())
        } else {
            None
        }
    }

    // ticks the timers once for every 1/60th of a second that time_step has accumulated
    fn update_timers(&mut self) {
        self.timer_time += self.time_step;

        let ticks = (self.timer_time * TIMER_TICKS_PER_SECOND) as u32;
        self.timer_time = self.timer_time.rem_euclid(1.0 / TIMER_TICKS_PER_SECOND);

        // both timers are a byte so anything past 255 ticks is a no-op
        for _ in 0..ticks.min(u8::MAX as u32) {
            tick_timers(&mut self.state);
        }
    }

    pub fn step(&mut self) -> Result<(), String> {
        self.drain_event_queue();
        self.update_timers();

        let address = self.state.program_counter;
        let mut io = VMIo {
            display: &mut self.display,
            keyboard: &self.keyboard,
            illegal: None,
        };

        if step(&mut self.state, &mut io) {
            self.display_dirty = true;
        }

        if let Some(params) = io.illegal {
            log::warn!(
                "Illegal instruction {:04X} at {:#05X?}",
                params.bits,
                address
            );

            if self.halt_on_illegal {
                return Err(format!(
                    "Halted on illegal instruction {:04X} at {:#05X?}",
                    params.bits, address
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::{quirk::RomKind, rom::RomConfig};

    use std::sync::mpsc::{channel, Sender};

    fn test_vm(program: &[u8], halt_on_illegal: bool) -> (VM, Sender<VMEvent>) {
        let mut config = RomConfig::new("test", RomKind::CHIP8);
        config.halt_on_illegal = halt_on_illegal;
        let rom = Rom::new(config, program.to_vec()).unwrap();

        let (sender, receiver) = channel();
        (VM::new(rom, receiver, 700), sender)
    }

    // jump to self forever
    const SPIN: [u8; 2] = [0x12, 0x00];

    #[test]
    fn timers_tick_once_per_sixtieth_of_a_second() {
        let (mut vm, _sender) = test_vm(&SPIN, false);
        vm.state_mut().delay_timer = 100;
        vm.state_mut().sound_timer = 100;
        vm.time_step = 0.01;

        vm.step().unwrap();
        assert_eq!(vm.state().delay_timer, 100);

        vm.step().unwrap();
        assert_eq!(vm.state().delay_timer, 99);
        assert_eq!(vm.state().sound_timer, 99);
    }

    #[test]
    fn long_time_steps_tick_several_times() {
        let (mut vm, _sender) = test_vm(&SPIN, false);
        vm.state_mut().delay_timer = 20;
        vm.time_step = 0.25;

        vm.step().unwrap();
        assert_eq!(vm.state().delay_timer, 5);
        assert!(!vm.sound_active());
    }

    #[test]
    fn held_keys_reach_the_interpreter() {
        // V0 = 7, skip next if key V0 is down, else spin
        let (mut vm, sender) = test_vm(&[0x60, 0x07, 0xE0, 0x9E, 0x12, 0x04, 0x12, 0x06], false);

        sender.send(VMEvent::Focus).unwrap();
        sender.send(VMEvent::KeyDown(Key::A)).unwrap();

        for _ in 0..3 {
            vm.step().unwrap();
        }
        assert_eq!(vm.keyboard().down_keys(), 1 << 0x7);
        assert_eq!(vm.state().program_counter, 0x206);
    }

    #[test]
    fn draws_mark_the_display_dirty() {
        // I = font glyph 0, draw it at (0, 0)
        let (mut vm, _sender) = test_vm(&[0xF0, 0x29, 0xD0, 0x05, 0x12, 0x04], false);
        assert!(vm.extract_new_display().is_some());

        vm.step().unwrap();
        assert!(vm.extract_new_display().is_none());

        vm.step().unwrap();
        let display = vm.extract_new_display().unwrap();
        assert_eq!(display.buffer[0] >> 60, 0xF);
        assert_eq!(vm.display().lit(), 14);
        assert!(vm.extract_new_display().is_none());
    }

    #[test]
    fn illegal_instructions_are_skipped_unless_halting() {
        let (mut vm, _sender) = test_vm(&[0xFF, 0xFF, 0x60, 0x01], false);
        vm.step().unwrap();
        vm.step().unwrap();
        assert_eq!(vm.state().registers[0], 1);

        let (mut vm, _sender) = test_vm(&[0xFF, 0xFF, 0x60, 0x01], true);
        let err = vm.step().unwrap_err();
        assert!(err.contains("FFFF"));
    }
}
