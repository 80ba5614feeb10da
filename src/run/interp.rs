use super::{
    instruct::{Instruction, InstructionParameters},
    mem::*,
    quirk::{KeyWait, Quirks},
};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

pub const VFLAG: usize = 15;

pub const STACK_SIZE: usize = 16;

// highest address a 12 bit address field can name, used by the FX1E overflow quirk
const ADDRESSABLE_RANGE_END: u16 = 0x0FFF;

pub const DISPLAY_WIDTH: u8 = 64;
pub const DISPLAY_HEIGHT: u8 = 32;

/// Everything the interpreter needs from the outside world.
///
/// The interpreter never touches a screen or keyboard directly. Pixel coordinates handed to
/// [`InterpreterIo::get_pixel`] and [`InterpreterIo::toggle_pixel`] are always inside the
/// 64x32 display but implementations are expected to wrap them anyway.
pub trait InterpreterIo {
    /// Bitmap of held keys, bit `i` is set iff key `i` is held
    fn held_keys(&mut self) -> u16;

    fn get_pixel(&self, x: u8, y: u8) -> bool;

    fn toggle_pixel(&mut self, x: u8, y: u8);

    fn clear_display(&mut self);

    /// Called when the fetched word matches no instruction. The interpreter moves on afterwards.
    fn illegal_instruction(&mut self, params: InstructionParameters);
}

pub struct MachineState {
    pub memory: Vec<u8>,
    pub program_counter: u16,
    pub index_register: u16,
    pub registers: [u8; 16],
    pub call_stack: [u16; STACK_SIZE],
    pub stack_pointer: u8,
    // live frames on the call stack, stack_pointer alone can't tell a full stack from an empty one
    pub stack_depth: u8,
    pub delay_timer: u8,
    pub sound_timer: u8,
    pub quirks: Quirks,
    pub rng: StdRng,
    // snapshot of held keys from the previous attempt of a blocking FX0A
    pub key_wait: Option<u16>,
}

impl Default for MachineState {
    fn default() -> Self {
        MachineState::new(DEFAULT_MEMORY_SIZE, Quirks::default())
    }
}

impl MachineState {
    pub fn new(memory_size: usize, quirks: Quirks) -> Self {
        MachineState::with_font(memory_size, quirks, &DEFAULT_FONT)
    }

    pub fn with_font(memory_size: usize, quirks: Quirks, font: &Font) -> Self {
        let memory_size = memory_size.clamp(MIN_MEMORY_SIZE, MAX_MEMORY_SIZE);
        let mut memory = vec![0; memory_size];
        memory.import(font, FONT_ADDRESS);

        MachineState {
            memory,
            program_counter: PROGRAM_STARTING_ADDRESS,
            index_register: 0,
            registers: [0; 16],
            call_stack: [0; STACK_SIZE],
            stack_pointer: 0,
            stack_depth: 0,
            delay_timer: 0,
            sound_timer: 0,
            quirks,
            rng: StdRng::from_entropy(),
            key_wait: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn max_program_size(&self) -> usize {
        self.memory.len() - PROGRAM_STARTING_ADDRESS as usize
    }

    pub fn fetch(&self) -> InstructionParameters {
        InstructionParameters::from([
            self.memory.read(self.program_counter),
            self.memory.read(self.program_counter.wrapping_add(1)),
        ])
    }

    fn push(&mut self, address: u16) {
        if self.stack_depth as usize == STACK_SIZE {
            log::warn!(
                "Stack overflow at {:#05X?}: overwriting return address {:#05X?}",
                self.program_counter,
                self.call_stack[self.stack_pointer as usize]
            );
        } else {
            self.stack_depth += 1;
        }

        self.call_stack[self.stack_pointer as usize] = address;
        self.stack_pointer = (self.stack_pointer + 1) % STACK_SIZE as u8;
    }

    fn pop(&mut self) -> u16 {
        if self.stack_depth == 0 {
            log::warn!(
                "Stack underflow at {:#05X?}: returning without a matching call",
                self.program_counter
            );
        } else {
            self.stack_depth -= 1;
        }

        self.stack_pointer = (self.stack_pointer + STACK_SIZE as u8 - 1) % STACK_SIZE as u8;
        self.call_stack[self.stack_pointer as usize]
    }

    fn skip_next(&mut self) {
        self.program_counter = self.program_counter.wrapping_add(2);
    }
}

// register dump in the layout of a debugger status line
impl std::fmt::Display for MachineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "PC: {:#05X}  Instruction: {:04X}  I: {:#05X}  SP: {:X}  DT: {:3}  ST: {:3}",
            self.program_counter,
            self.fetch().bits,
            self.index_register,
            self.stack_pointer,
            self.delay_timer,
            self.sound_timer
        )?;

        write!(f, "Stack:")?;
        for address in self.call_stack.iter() {
            write!(f, " {:03X}", address)?;
        }
        writeln!(f)?;

        write!(f, "V:    ")?;
        for (i, value) in self.registers.iter().enumerate() {
            write!(f, " {:X}={:02X}", i, value)?;
        }
        writeln!(f)
    }
}

/// Copies the program into memory starting at 0x200 and returns how many bytes were copied.
///
/// Programs bigger than the space after 0x200 are truncated.
pub fn load_program(state: &mut MachineState, program: &[u8]) -> usize {
    let size = program.len().min(state.max_program_size());
    if size < program.len() {
        log::warn!(
            "Program ({}B) exceeds program memory ({}B), truncating",
            program.len(),
            state.max_program_size()
        );
    }

    state.memory.import(&program[..size], PROGRAM_STARTING_ADDRESS);
    size
}

/// Counts the delay and sound timers down by one, should be called at 60Hz.
pub fn tick_timers(state: &mut MachineState) {
    state.delay_timer = state.delay_timer.saturating_sub(1);
    state.sound_timer = state.sound_timer.saturating_sub(1);
}

/// Fetches, decodes and executes the next instruction.
///
/// Returns whether the display was touched.
pub fn step<T: InterpreterIo + ?Sized>(state: &mut MachineState, io: &mut T) -> bool {
    let params = state.fetch();
    let address = state.program_counter;

    state.program_counter = state.program_counter.wrapping_add(2);

    match params.try_decode() {
        Ok(instruction) => {
            log::trace!("Instruction {:#05X?} {:?}", address, instruction);
            exec(state, io, instruction);
            instruction.touches_display()
        }
        Err(e) => {
            log::debug!("Decode at {:#05X?} failed: {}", address, e);
            io.illegal_instruction(params);
            false
        }
    }
}

fn exec<T: InterpreterIo + ?Sized>(state: &mut MachineState, io: &mut T, inst: Instruction) {
    let quirks = state.quirks;
    let registers = &mut state.registers;

    if !matches!(inst, Instruction::WaitForKey(_)) {
        state.key_wait = None;
    }

    match inst {
        Instruction::ClearScreen => io.clear_display(),

        Instruction::SubroutineReturn => state.program_counter = state.pop(),

        Instruction::Jump(address) => state.program_counter = address,

        Instruction::CallSubroutine(address) => {
            state.push(state.program_counter);
            state.program_counter = address;
        }

        Instruction::JumpWithOffset(address, vx) => {
            let offset = if quirks.jump_reads_vx {
                registers[vx as usize]
            } else {
                registers[0]
            };

            state.program_counter = address.wrapping_add(offset as u16);
        }

        Instruction::SkipIfEqualsConstant(vx, value) => {
            if registers[vx as usize] == value {
                state.skip_next();
            }
        }

        Instruction::SkipIfNotEqualsConstant(vx, value) => {
            if registers[vx as usize] != value {
                state.skip_next();
            }
        }

        Instruction::SkipIfEquals(vx, vy) => {
            if registers[vx as usize] == registers[vy as usize] {
                state.skip_next();
            }
        }

        Instruction::SkipIfNotEquals(vx, vy) => {
            if registers[vx as usize] != registers[vy as usize] {
                state.skip_next();
            }
        }

        Instruction::SkipIfKeyDown(vx) => {
            if io.held_keys() >> (registers[vx as usize] & 0xF) & 1 == 1 {
                state.skip_next();
            }
        }

        Instruction::SkipIfKeyNotDown(vx) => {
            if io.held_keys() >> (registers[vx as usize] & 0xF) & 1 == 0 {
                state.skip_next();
            }
        }

        Instruction::WaitForKey(vx) => {
            let held = io.held_keys();
            let prior = state.key_wait.unwrap_or(held);

            let entered = match quirks.key_wait {
                KeyWait::Held => held,
                KeyWait::Press => held & !prior,
                KeyWait::Release => prior & !held,
            };

            if entered != 0 {
                registers[vx as usize] = entered.trailing_zeros() as u8;
                state.key_wait = None;
            } else {
                // go back and execute this instruction again next step
                state.key_wait = Some(held);
                state.program_counter = state.program_counter.wrapping_sub(2);
            }
        }

        Instruction::SetConstant(vx, value) => registers[vx as usize] = value,

        Instruction::AddConstant(vx, value) => {
            registers[vx as usize] = registers[vx as usize].wrapping_add(value)
        }

        Instruction::Set(vx, vy) => registers[vx as usize] = registers[vy as usize],

        Instruction::Or(vx, vy) => {
            registers[vx as usize] |= registers[vy as usize];
            if quirks.logic_clears_vf {
                registers[VFLAG] = 0;
            }
        }

        Instruction::And(vx, vy) => {
            registers[vx as usize] &= registers[vy as usize];
            if quirks.logic_clears_vf {
                registers[VFLAG] = 0;
            }
        }

        Instruction::Xor(vx, vy) => {
            registers[vx as usize] ^= registers[vy as usize];
            if quirks.logic_clears_vf {
                registers[VFLAG] = 0;
            }
        }

        Instruction::Add(vx, vy) => {
            let (value, overflowed) = registers[vx as usize].overflowing_add(registers[vy as usize]);
            registers[vx as usize] = value;
            registers[VFLAG] = overflowed as u8;
        }

        Instruction::Sub(vx, vy, vx_minus_vy) => {
            let (value, overflowed) = if vx_minus_vy {
                registers[vx as usize].overflowing_sub(registers[vy as usize])
            } else {
                registers[vy as usize].overflowing_sub(registers[vx as usize])
            };

            registers[vx as usize] = value;
            registers[VFLAG] = !overflowed as u8; // vf is 0 on borrow instead of 1 like add
        }

        Instruction::Shift(vx, vy, right) => {
            let bits = if quirks.shift_reads_vy {
                registers[vy as usize]
            } else {
                registers[vx as usize]
            };

            if right {
                registers[vx as usize] = bits >> 1;
                registers[VFLAG] = bits & 1;
            } else {
                registers[vx as usize] = bits << 1;
                registers[VFLAG] = bits >> 7 & 1;
            }
        }

        Instruction::GetDelayTimer(vx) => registers[vx as usize] = state.delay_timer,

        Instruction::SetDelayTimer(vx) => state.delay_timer = registers[vx as usize],

        Instruction::SetSoundTimer(vx) => state.sound_timer = registers[vx as usize],

        Instruction::SetIndex(address) => state.index_register = address,

        Instruction::SetIndexToHexChar(vx) => {
            let c = (registers[vx as usize] & 0xF) as u16;
            state.index_register = FONT_ADDRESS + c * FONT_CHAR_DATA_SIZE;
        }

        Instruction::AddToIndex(vx) => {
            state.index_register = state.index_register.wrapping_add(registers[vx as usize] as u16);
            if quirks.index_overflow_sets_vf {
                registers[VFLAG] = (state.index_register > ADDRESSABLE_RANGE_END) as u8;
            }
        }

        Instruction::Load(vx) => {
            state.memory.export(state.index_register, &mut registers[..=vx as usize]);
            if quirks.load_store_increments_index {
                state.index_register = state.index_register.wrapping_add(vx as u16 + 1);
            }
        }

        Instruction::Store(vx) => {
            state.memory.import(&registers[..=vx as usize], state.index_register);
            if quirks.load_store_increments_index {
                state.index_register = state.index_register.wrapping_add(vx as u16 + 1);
            }
        }

        Instruction::StoreBinaryCodedDecimal(vx) => {
            let decimal = registers[vx as usize];
            let address = state.index_register;
            state.memory.write(address, decimal / 100);
            state.memory.write(address.wrapping_add(1), decimal / 10 % 10);
            state.memory.write(address.wrapping_add(2), decimal % 10);
        }

        Instruction::GenerateRandom(vx, bound) => {
            registers[vx as usize] = (state.rng.next_u32() & bound as u32) as u8;
        }

        Instruction::Draw(vx, vy, height) => {
            let pos_x = registers[vx as usize] % DISPLAY_WIDTH;
            let pos_y = registers[vy as usize] % DISPLAY_HEIGHT;

            let mut sprite = [0; 16];
            let sprite = &mut sprite[..height as usize];
            state.memory.export(state.index_register, sprite);

            registers[VFLAG] = draw_sprite(io, sprite, pos_x, pos_y, quirks.draw_wraps) as u8;
        }
    }
}

// xor the sprite onto the display returning whether any pixel that was on got turned off
fn draw_sprite<T: InterpreterIo + ?Sized>(
    io: &mut T,
    sprite: &[u8],
    pos_x: u8,
    pos_y: u8,
    wrap: bool,
) -> bool {
    let mut collision = false;

    for (row, &sprite_row) in sprite.iter().enumerate() {
        let mut y = pos_y as usize + row;
        if y >= DISPLAY_HEIGHT as usize {
            if !wrap {
                break;
            }
            y %= DISPLAY_HEIGHT as usize;
        }

        for bit in 0..8 {
            let mut x = pos_x as usize + bit;
            if x >= DISPLAY_WIDTH as usize {
                if !wrap {
                    break;
                }
                x %= DISPLAY_WIDTH as usize;
            }

            // the left-most pixel is the most significant bit
            if sprite_row >> (7 - bit) & 1 == 1 {
                collision |= io.get_pixel(x as u8, y as u8);
                io.toggle_pixel(x as u8, y as u8);
            }
        }
    }

    collision
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::quirk::RomKind;

    use proptest::prelude::*;

    // minimal capabilities so the core can be driven without a VM
    #[derive(Default)]
    struct TestIo {
        // one u64 per row, left-most pixel in the most significant bit
        rows: [u64; DISPLAY_HEIGHT as usize],
        keys: u16,
        illegal: Vec<u16>,
    }

    impl TestIo {
        fn pixel(&self, x: u8, y: u8) -> bool {
            self.get_pixel(x, y)
        }

        fn lit(&self) -> u32 {
            self.rows.iter().map(|row| row.count_ones()).sum()
        }
    }

    impl InterpreterIo for TestIo {
        fn held_keys(&mut self) -> u16 {
            self.keys
        }

        fn get_pixel(&self, x: u8, y: u8) -> bool {
            self.rows[(y % DISPLAY_HEIGHT) as usize] >> (63 - x % DISPLAY_WIDTH) & 1 == 1
        }

        fn toggle_pixel(&mut self, x: u8, y: u8) {
            self.rows[(y % DISPLAY_HEIGHT) as usize] ^= 1u64 << (63 - x % DISPLAY_WIDTH);
        }

        fn clear_display(&mut self) {
            self.rows = [0; DISPLAY_HEIGHT as usize];
        }

        fn illegal_instruction(&mut self, params: InstructionParameters) {
            self.illegal.push(params.bits);
        }
    }

    fn machine(program: &[u8]) -> MachineState {
        machine_with(RomKind::CHIP8.quirks(), program)
    }

    fn machine_with(quirks: Quirks, program: &[u8]) -> MachineState {
        let mut state = MachineState::new(DEFAULT_MEMORY_SIZE, quirks).with_seed(8);
        load_program(&mut state, program);
        state
    }

    fn run(state: &mut MachineState, io: &mut TestIo, steps: usize) {
        for _ in 0..steps {
            step(state, io);
        }
    }

    #[test]
    fn starts_at_program_memory_with_font_loaded() {
        let state = MachineState::default();
        assert_eq!(state.program_counter, 0x200);
        assert_eq!(state.memory.len(), 4096);
        assert_eq!(&state.memory[FONT_ADDRESS as usize..][..80], &DEFAULT_FONT[..]);
    }

    #[test]
    fn custom_font_replaces_the_default() {
        let font = [0xAA; 80];
        let state = MachineState::with_font(DEFAULT_MEMORY_SIZE, Quirks::default(), &font);
        assert_eq!(&state.memory[FONT_ADDRESS as usize..][..80], &font[..]);
    }

    #[test]
    fn dump_shows_registers_and_next_word() {
        let mut state = machine(&[0x60, 0x2A]);
        state.registers[0xF] = 1;
        let dump = state.to_string();
        assert!(dump.starts_with("PC: 0x200  Instruction: 602A  I: 0x000  SP: 0"));
        assert!(dump.contains(" 0=00 "));
        assert!(dump.contains(" F=01"));
        assert_eq!(dump.lines().count(), 3);
    }

    #[test]
    fn memory_size_is_at_least_4096() {
        assert_eq!(MachineState::new(16, Quirks::default()).memory.len(), 4096);
        assert_eq!(MachineState::new(8192, Quirks::default()).memory.len(), 8192);
    }

    #[test]
    fn oversized_programs_are_truncated() {
        let mut state = MachineState::default();
        let program = vec![0x12; 5000];
        assert_eq!(load_program(&mut state, &program), 4096 - 0x200);
        assert_eq!(state.memory[4095], 0x12);
        assert_eq!(&state.memory[FONT_ADDRESS as usize..][..80], &DEFAULT_FONT[..]);
    }

    #[test]
    fn end_to_end_add_then_clear() {
        let mut state = machine(&[0x60, 0x05, 0x61, 0x03, 0x80, 0x14, 0x00, 0xE0]);
        let mut io = TestIo::default();
        io.toggle_pixel(3, 3);

        let dirty: Vec<bool> = (0..4).map(|_| step(&mut state, &mut io)).collect();

        assert_eq!(dirty, vec![false, false, false, true]);
        assert_eq!(state.registers[0], 8);
        assert_eq!(state.registers[VFLAG], 0);
        assert_eq!(io.lit(), 0);
        assert_eq!(state.program_counter, 0x208);
    }

    #[test]
    fn add_sets_carry() {
        let mut state = machine(&[0x80, 0x14]);
        state.registers[0] = 250;
        state.registers[1] = 10;
        step(&mut state, &mut TestIo::default());
        assert_eq!(state.registers[0], 4);
        assert_eq!(state.registers[VFLAG], 1);
    }

    proptest! {
        #[test]
        fn add_flag_matches_carry(vx in any::<u8>(), vy in any::<u8>()) {
            let mut state = machine(&[0x80, 0x14]);
            state.registers[0] = vx;
            state.registers[1] = vy;
            step(&mut state, &mut TestIo::default());
            prop_assert_eq!(state.registers[0], ((vx as u16 + vy as u16) % 256) as u8);
            prop_assert_eq!(state.registers[VFLAG], (vx as u16 + vy as u16 > 255) as u8);
        }

        #[test]
        fn sub_flag_is_no_borrow(vx in any::<u8>(), vy in any::<u8>()) {
            let mut state = machine(&[0x80, 0x15, 0x82, 0x37]);
            state.registers[0] = vx;
            state.registers[1] = vy;
            state.registers[2] = vx;
            state.registers[3] = vy;
            step(&mut state, &mut TestIo::default());
            prop_assert_eq!(state.registers[0], vx.wrapping_sub(vy));
            prop_assert_eq!(state.registers[VFLAG], (vx >= vy) as u8);
            step(&mut state, &mut TestIo::default());
            prop_assert_eq!(state.registers[2], vy.wrapping_sub(vx));
            prop_assert_eq!(state.registers[VFLAG], (vy >= vx) as u8);
        }
    }

    #[test]
    fn subtract_borrow_cases() {
        let mut state = machine(&[0x80, 0x15, 0x82, 0x35]);
        state.registers[0] = 5;
        state.registers[1] = 10;
        state.registers[2] = 10;
        state.registers[3] = 5;
        let mut io = TestIo::default();

        step(&mut state, &mut io);
        assert_eq!((state.registers[0], state.registers[VFLAG]), (251, 0));

        step(&mut state, &mut io);
        assert_eq!((state.registers[2], state.registers[VFLAG]), (5, 1));
    }

    #[test]
    fn flag_wins_when_vf_is_the_destination() {
        let mut state = machine(&[0x8F, 0x04]);
        state.registers[VFLAG] = 200;
        state.registers[0] = 100;
        step(&mut state, &mut TestIo::default());
        assert_eq!(state.registers[VFLAG], 1);
    }

    #[test]
    fn add_constant_leaves_flag_alone() {
        let mut state = machine(&[0x70, 0xFF]);
        state.registers[0] = 2;
        state.registers[VFLAG] = 7;
        step(&mut state, &mut TestIo::default());
        assert_eq!(state.registers[0], 1);
        assert_eq!(state.registers[VFLAG], 7);
    }

    #[test]
    fn shifts_in_place_by_default() {
        let mut state = machine(&[0x80, 0x16, 0x82, 0x3E]);
        state.registers[0] = 0b0000_0011;
        state.registers[1] = 0b1000_0000;
        state.registers[2] = 0b1000_0001;
        let mut io = TestIo::default();

        step(&mut state, &mut io);
        assert_eq!((state.registers[0], state.registers[VFLAG]), (0b0000_0001, 1));

        step(&mut state, &mut io);
        assert_eq!((state.registers[2], state.registers[VFLAG]), (0b0000_0010, 1));
    }

    #[test]
    fn shift_reads_vy_quirk() {
        let quirks = Quirks { shift_reads_vy: true, ..Quirks::default() };
        let mut state = machine_with(quirks, &[0x80, 0x16]);
        state.registers[0] = 0xFF;
        state.registers[1] = 0b0000_0110;
        step(&mut state, &mut TestIo::default());
        assert_eq!(state.registers[0], 0b0000_0011);
        assert_eq!(state.registers[VFLAG], 0);

        let mut state = machine_with(quirks, &[0x80, 0x1E, 0x8F, 0x1E]);
        state.registers[0] = 0x01;
        state.registers[1] = 0x81;
        step(&mut state, &mut TestIo::default());
        assert_eq!(state.registers[0], 0x02);
        assert_eq!(state.registers[VFLAG], 1);

        // VF as the destination ends up holding the flag, not the shifted value
        state.registers[1] = 0x40;
        step(&mut state, &mut TestIo::default());
        assert_eq!(state.registers[VFLAG], 0);
    }

    #[test]
    fn logic_ops_touch_flag_only_with_quirk() {
        let program = [0x80, 0x11, 0x80, 0x12, 0x80, 0x13];

        let mut state = machine(&program);
        state.registers[VFLAG] = 9;
        run(&mut state, &mut TestIo::default(), 3);
        assert_eq!(state.registers[VFLAG], 9);

        let quirks = Quirks { logic_clears_vf: true, ..Quirks::default() };
        let mut state = machine_with(quirks, &program);
        for _ in 0..3 {
            state.registers[VFLAG] = 9;
            step(&mut state, &mut TestIo::default());
            assert_eq!(state.registers[VFLAG], 0);
        }
    }

    #[test]
    fn call_then_return_resumes_after_call_site() {
        // 0x200: call 0x300, 0x202: clear; 0x300: return
        let mut state = machine(&[0x23, 0x00, 0x00, 0xE0]);
        state.memory[0x300] = 0x00;
        state.memory[0x301] = 0xEE;
        let mut io = TestIo::default();

        step(&mut state, &mut io);
        assert_eq!(state.program_counter, 0x300);
        assert_eq!(state.stack_depth, 1);

        step(&mut state, &mut io);
        assert_eq!(state.program_counter, 0x202);
        assert_eq!(state.stack_depth, 0);
        assert_eq!(state.stack_pointer, 0);
    }

    #[test]
    fn stack_overflow_wraps_and_keeps_running() {
        // calls itself forever
        let mut state = machine(&[0x22, 0x00]);
        let mut io = TestIo::default();

        run(&mut state, &mut io, 17);

        assert_eq!(state.program_counter, 0x200);
        assert_eq!(state.stack_depth, 16);
        assert_eq!(state.stack_pointer, 1);
        assert!(state.call_stack.iter().all(|&address| address == 0x202));
    }

    #[test]
    fn return_on_empty_stack_wraps() {
        let mut state = machine(&[0x00, 0xEE]);
        state.call_stack[15] = 0x456;
        step(&mut state, &mut TestIo::default());
        assert_eq!(state.program_counter, 0x456);
        assert_eq!(state.stack_pointer, 15);
        assert_eq!(state.stack_depth, 0);
    }

    #[test]
    fn skips() {
        // skip if v0 == 1, skip if v0 != 1, skip if v0 == v1, skip if v0 != v1
        let mut state = machine(&[0x30, 0x01, 0x00, 0x00, 0x40, 0x01, 0x50, 0x10, 0x00, 0x00, 0x90, 0x10]);
        state.registers[0] = 1;
        state.registers[1] = 1;
        let mut io = TestIo::default();

        step(&mut state, &mut io);
        assert_eq!(state.program_counter, 0x204);
        step(&mut state, &mut io);
        assert_eq!(state.program_counter, 0x206);
        step(&mut state, &mut io);
        assert_eq!(state.program_counter, 0x20A);
        step(&mut state, &mut io);
        assert_eq!(state.program_counter, 0x20C);
    }

    #[test]
    fn jump_with_offset() {
        let mut state = machine(&[0xB3, 0x00]);
        state.registers[0] = 0x10;
        state.registers[3] = 0x20;
        step(&mut state, &mut TestIo::default());
        assert_eq!(state.program_counter, 0x310);

        let quirks = Quirks { jump_reads_vx: true, ..Quirks::default() };
        let mut state = machine_with(quirks, &[0xB3, 0x00]);
        state.registers[0] = 0x10;
        state.registers[3] = 0x20;
        step(&mut state, &mut TestIo::default());
        assert_eq!(state.program_counter, 0x320);
    }

    #[test]
    fn random_is_masked() {
        let mut state = machine(&[0xC0, 0x0F, 0xC1, 0x00]);
        state.registers[1] = 0xFF;
        run(&mut state, &mut TestIo::default(), 2);
        assert_eq!(state.registers[0] & 0xF0, 0);
        assert_eq!(state.registers[1], 0);
    }

    #[test]
    fn draw_twice_restores_display_and_reports_collision() {
        // point I at the glyph for 0, draw it at (V0, V1) twice
        let mut state = machine(&[0xF2, 0x29, 0xD0, 0x15, 0xD0, 0x15]);
        state.registers[0] = 10;
        state.registers[1] = 5;
        let mut io = TestIo::default();

        step(&mut state, &mut io);
        assert_eq!(state.index_register, FONT_ADDRESS);

        assert!(step(&mut state, &mut io));
        assert_eq!(state.registers[VFLAG], 0);
        assert_eq!(io.lit(), 14);
        assert!(io.pixel(10, 5));

        assert!(step(&mut state, &mut io));
        assert_eq!(state.registers[VFLAG], 1);
        assert_eq!(io.lit(), 0);
    }

    #[test]
    fn draw_start_wraps_but_sprite_clips() {
        let mut state = machine(&[0xA3, 0x00, 0xD0, 0x12]);
        state.memory[0x300] = 0xFF;
        state.memory[0x301] = 0xFF;
        state.registers[0] = 64 + 60;
        state.registers[1] = 32 + 31;
        let mut io = TestIo::default();

        run(&mut state, &mut io, 2);

        // 4 columns fit before the right edge and 1 row before the bottom edge
        assert_eq!(io.lit(), 4);
        assert!(io.pixel(60, 31) && io.pixel(63, 31));
        assert!(!io.pixel(0, 0));
    }

    #[test]
    fn draw_wraps_quirk() {
        let quirks = Quirks { draw_wraps: true, ..Quirks::default() };
        let mut state = machine_with(quirks, &[0xA3, 0x00, 0xD0, 0x12]);
        state.memory[0x300] = 0xFF;
        state.memory[0x301] = 0xFF;
        state.registers[0] = 60;
        state.registers[1] = 31;
        let mut io = TestIo::default();

        run(&mut state, &mut io, 2);

        assert_eq!(io.lit(), 16);
        assert!(io.pixel(0, 0) && io.pixel(3, 0) && io.pixel(63, 31));
    }

    #[test]
    fn sprite_rows_wrap_around_memory() {
        let mut state = machine(&[0xAF, 0xFF, 0xD0, 0x02]);
        state.memory[0xFFF] = 0x80;
        state.memory[0x000] = 0x80;
        let mut io = TestIo::default();

        run(&mut state, &mut io, 2);

        assert!(io.pixel(0, 0) && io.pixel(0, 1));
        assert_eq!(io.lit(), 2);
    }

    #[test]
    fn fetch_wraps_around_memory() {
        let mut state = machine(&[0x1F, 0xFF]);
        state.memory[0xFFF] = 0x60;
        state.memory[0x000] = 0x2A;
        run(&mut state, &mut TestIo::default(), 2);
        assert_eq!(state.registers[0], 0x2A);
    }

    #[test]
    fn key_skips_use_low_nibble() {
        let mut state = machine(&[0xE0, 0x9E, 0x00, 0x00, 0xE0, 0xA1]);
        state.registers[0] = 0x13;
        let mut io = TestIo { keys: 1 << 0x3, ..Default::default() };

        step(&mut state, &mut io);
        assert_eq!(state.program_counter, 0x204);
        step(&mut state, &mut io);
        assert_eq!(state.program_counter, 0x206);
    }

    #[test]
    fn wait_for_key_blocks_until_a_key_is_held() {
        let mut state = machine(&[0xF5, 0x0A]);
        let mut io = TestIo::default();

        run(&mut state, &mut io, 5);
        assert_eq!(state.program_counter, 0x200);

        io.keys = 0b1010_0000;
        step(&mut state, &mut io);
        assert_eq!(state.program_counter, 0x202);
        assert_eq!(state.registers[5], 5);
    }

    #[test]
    fn wait_for_key_press_ignores_keys_already_down() {
        let quirks = Quirks { key_wait: KeyWait::Press, ..Quirks::default() };
        let mut state = machine_with(quirks, &[0xF5, 0x0A]);
        let mut io = TestIo { keys: 1 << 0x2, ..Default::default() };

        run(&mut state, &mut io, 3);
        assert_eq!(state.program_counter, 0x200);

        io.keys |= 1 << 0x9;
        step(&mut state, &mut io);
        assert_eq!(state.program_counter, 0x202);
        assert_eq!(state.registers[5], 0x9);
    }

    #[test]
    fn wait_for_key_release_completes_on_release() {
        let quirks = Quirks { key_wait: KeyWait::Release, ..Quirks::default() };
        let mut state = machine_with(quirks, &[0xF5, 0x0A]);
        let mut io = TestIo::default();

        step(&mut state, &mut io);
        io.keys = 1 << 0xB;
        run(&mut state, &mut io, 2);
        assert_eq!(state.program_counter, 0x200);

        io.keys = 0;
        step(&mut state, &mut io);
        assert_eq!(state.program_counter, 0x202);
        assert_eq!(state.registers[5], 0xB);
        assert_eq!(state.key_wait, None);
    }

    #[test]
    fn timers_transfer_and_tick_toward_zero() {
        let mut state = machine(&[0xF0, 0x15, 0xF0, 0x18, 0xF1, 0x07]);
        state.registers[0] = 2;
        run(&mut state, &mut TestIo::default(), 2);
        assert_eq!((state.delay_timer, state.sound_timer), (2, 2));

        tick_timers(&mut state);
        step(&mut state, &mut TestIo::default());
        assert_eq!(state.registers[1], 1);

        tick_timers(&mut state);
        tick_timers(&mut state);
        assert_eq!((state.delay_timer, state.sound_timer), (0, 0));
    }

    #[test]
    fn index_overflow_quirk() {
        let program = [0xFE, 0x1E];

        let mut state = machine(&program);
        state.index_register = 0x0FFF;
        state.registers[0xE] = 1;
        step(&mut state, &mut TestIo::default());
        assert_eq!(state.index_register, 0x1000);
        assert_eq!(state.registers[VFLAG], 0);

        let quirks = Quirks { index_overflow_sets_vf: true, ..Quirks::default() };
        let mut state = machine_with(quirks, &program);
        state.index_register = 0x0FFF;
        state.registers[0xE] = 1;
        step(&mut state, &mut TestIo::default());
        assert_eq!(state.registers[VFLAG], 1);
    }

    #[test]
    fn font_pointer_masks_to_a_hex_digit() {
        let mut state = machine(&[0xF0, 0x29]);
        state.registers[0] = 0x1A;
        step(&mut state, &mut TestIo::default());
        assert_eq!(state.index_register, FONT_ADDRESS + 0xA * 5);
    }

    #[test]
    fn binary_coded_decimal() {
        let mut state = machine(&[0xF0, 0x33]);
        state.registers[0] = 254;
        state.index_register = 0x300;
        step(&mut state, &mut TestIo::default());
        assert_eq!(&state.memory[0x300..0x303], &[2, 5, 4]);
    }

    #[test]
    fn binary_coded_decimal_wraps_around_memory() {
        let mut state = machine(&[0xF0, 0x33]);
        state.registers[0] = 254;
        state.index_register = 0xFFF;
        step(&mut state, &mut TestIo::default());
        assert_eq!([state.memory[0xFFF], state.memory[0x000], state.memory[0x001]], [2, 5, 4]);
    }

    #[test]
    fn store_and_load_registers() {
        let mut state = machine(&[0xF2, 0x55, 0xF2, 0x65]);
        state.index_register = 0x300;
        state.registers[..4].copy_from_slice(&[1, 2, 3, 4]);

        step(&mut state, &mut TestIo::default());
        assert_eq!(&state.memory[0x300..0x304], &[1, 2, 3, 0]);
        assert_eq!(state.index_register, 0x300);

        state.registers = [0; 16];
        step(&mut state, &mut TestIo::default());
        assert_eq!(&state.registers[..4], &[1, 2, 3, 0]);
    }

    #[test]
    fn store_and_load_wrap_around_memory() {
        let mut state = machine(&[0xF2, 0x55, 0xF2, 0x65]);
        state.index_register = 0xFFE;
        state.registers[..3].copy_from_slice(&[7, 8, 9]);

        step(&mut state, &mut TestIo::default());
        assert_eq!([state.memory[0xFFE], state.memory[0xFFF], state.memory[0x000]], [7, 8, 9]);

        state.registers = [0; 16];
        step(&mut state, &mut TestIo::default());
        assert_eq!(&state.registers[..3], &[7, 8, 9]);
    }

    #[test]
    fn store_and_load_increment_index_with_quirk() {
        let quirks = Quirks { load_store_increments_index: true, ..Quirks::default() };
        let mut state = machine_with(quirks, &[0xF2, 0x55, 0xF0, 0x65]);
        state.index_register = 0x300;

        step(&mut state, &mut TestIo::default());
        assert_eq!(state.index_register, 0x303);

        step(&mut state, &mut TestIo::default());
        assert_eq!(state.index_register, 0x304);
    }

    #[test]
    fn illegal_instruction_is_reported_and_skipped() {
        let mut state = machine(&[0xFF, 0xFF, 0x60, 0x01]);
        let mut io = TestIo::default();

        assert!(!step(&mut state, &mut io));
        assert_eq!(io.illegal, vec![0xFFFF]);
        assert_eq!(state.program_counter, 0x202);
        assert_eq!(state.registers, [0; 16]);

        step(&mut state, &mut io);
        assert_eq!(state.registers[0], 1);
    }
}
