pub const PROGRAM_STARTING_ADDRESS: u16 = 0x200;

pub const DEFAULT_MEMORY_SIZE: usize = 4096;
pub const MIN_MEMORY_SIZE: usize = 4096;
pub const MAX_MEMORY_SIZE: usize = u16::MAX as usize + 1;

pub const FONT_CHAR_DATA_SIZE: u16 = 5;

// font is squeezed in right before program memory, 0x1B0 to 0x1FF inclusive
pub const FONT_ADDRESS: u16 = PROGRAM_STARTING_ADDRESS - 16 * FONT_CHAR_DATA_SIZE;

pub type Font = [u8; 16 * FONT_CHAR_DATA_SIZE as usize];

pub const DEFAULT_FONT: Font = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

// Every access into CHIP-8 memory goes through these so that addresses always wrap around
// the end of memory instead of panicking
pub trait MemoryRef {
    fn read(&self, address: u16) -> u8;
    fn export(&self, address: u16, dst: &mut [u8]);
}

pub trait MemoryMut {
    fn write(&mut self, address: u16, value: u8);
    fn import(&mut self, src: &[u8], address: u16);
}

impl<T> MemoryRef for T
where
    T: AsRef<[u8]> + ?Sized,
{
    fn read(&self, address: u16) -> u8 {
        let memory = self.as_ref();
        memory[address as usize % memory.len()]
    }

    fn export(&self, address: u16, dst: &mut [u8]) {
        let memory = self.as_ref();
        let address = address as usize % memory.len();

        for (i, byte) in dst.iter_mut().enumerate() {
            *byte = memory[(address + i) % memory.len()];
        }
    }
}

impl<T> MemoryMut for T
where
    T: AsMut<[u8]> + ?Sized,
{
    fn write(&mut self, address: u16, value: u8) {
        let memory = self.as_mut();
        let len = memory.len();
        memory[address as usize % len] = value;
    }

    fn import(&mut self, src: &[u8], address: u16) {
        let memory = self.as_mut();
        let len = memory.len();
        let address = address as usize % len;

        for (i, &byte) in src.iter().enumerate() {
            memory[(address + i) % len] = byte;
        }
    }
}
