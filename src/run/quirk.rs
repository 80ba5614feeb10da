use std::fmt::Display;

// How the wait for key instruction (FX0A) decides a key was entered
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum KeyWait {
    // any key currently held
    Held,
    // a key that went from up to down while waiting
    Press,
    // a key that went from down to up while waiting
    Release,
}

impl Display for KeyWait {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Held => write!(f, "held"),
            Self::Press => write!(f, "press"),
            Self::Release => write!(f, "release"),
        }
    }
}

/// Behaviors that historical CHIP-8 interpreters disagree on.
///
/// Each flag off is the modern CHIP-8 behavior, each flag on is the alternative.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Quirks {
    /// 8XY6 / 8XYE shift VY into VX instead of shifting VX in place
    pub shift_reads_vy: bool,
    /// 8XY1 / 8XY2 / 8XY3 reset VF to 0
    pub logic_clears_vf: bool,
    /// FX55 / FX65 leave the index register pointing past the last register transferred
    pub load_store_increments_index: bool,
    /// DXYN wraps sprites around the display edges instead of clipping them
    pub draw_wraps: bool,
    /// FX1E sets VF to 1 when the index register leaves the 12 bit address range, 0 otherwise
    pub index_overflow_sets_vf: bool,
    /// BNNN is read as BXNN and jumps to NNN + VX instead of NNN + V0
    pub jump_reads_vx: bool,
    pub key_wait: KeyWait,
}

impl Default for Quirks {
    fn default() -> Self {
        RomKind::default().quirks()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum RomKind {
    COSMACVIP,
    #[default]
    CHIP8,
    CHIP48,
}

impl RomKind {
    pub fn quirks(self) -> Quirks {
        match self {
            RomKind::CHIP8 => Quirks {
                shift_reads_vy: false,
                logic_clears_vf: false,
                load_store_increments_index: false,
                draw_wraps: false,
                index_overflow_sets_vf: false,
                jump_reads_vx: false,
                key_wait: KeyWait::Held,
            },
            RomKind::COSMACVIP => Quirks {
                shift_reads_vy: true,
                logic_clears_vf: true,
                load_store_increments_index: true,
                draw_wraps: false,
                index_overflow_sets_vf: false,
                jump_reads_vx: false,
                key_wait: KeyWait::Release,
            },
            RomKind::CHIP48 => Quirks {
                shift_reads_vy: false,
                logic_clears_vf: false,
                load_store_increments_index: false,
                draw_wraps: false,
                index_overflow_sets_vf: true,
                jump_reads_vx: true,
                key_wait: KeyWait::Press,
            },
        }
    }
}

impl Display for RomKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CHIP8 => write!(f, "CHIP8"),
            Self::COSMACVIP => write!(f, "CHIP8 (COSMAC VIP)"),
            Self::CHIP48 => write!(f, "CHIP48"),
        }
    }
}
