use crossterm::event::KeyCode as CrosstermKey;
use device_query::Keycode as DeviceKey;

// The 4x4 CHIP-8 keypad laid over the left side of a QWERTY keyboard
//
// 1 2 3 4      1 2 3 C
// Q W E R  ->  4 5 6 D
// A S D F      7 8 9 E
// Z X C V      A 0 B F
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum Key {
    One,
    Two,
    Three,
    Four,
    Q,
    W,
    E,
    R,
    A,
    S,
    D,
    F,
    Z,
    X,
    C,
    V,
}

impl Key {
    // Key enum to the hexadecimal key code CHIP-8 programs see
    pub fn to_code(self) -> u8 {
        match self {
            Key::One => 0x1,
            Key::Two => 0x2,
            Key::Three => 0x3,
            Key::Four => 0xC,
            Key::Q => 0x4,
            Key::W => 0x5,
            Key::E => 0x6,
            Key::R => 0xD,
            Key::A => 0x7,
            Key::S => 0x8,
            Key::D => 0x9,
            Key::F => 0xE,
            Key::Z => 0xA,
            Key::X => 0x0,
            Key::C => 0xB,
            Key::V => 0xF,
        }
    }

    fn try_from_char(c: char) -> Result<Self, &'static str> {
        match c.to_ascii_uppercase() {
            '1' => Ok(Key::One),
            '2' => Ok(Key::Two),
            '3' => Ok(Key::Three),
            '4' => Ok(Key::Four),
            'Q' => Ok(Key::Q),
            'W' => Ok(Key::W),
            'E' => Ok(Key::E),
            'R' => Ok(Key::R),
            'A' => Ok(Key::A),
            'S' => Ok(Key::S),
            'D' => Ok(Key::D),
            'F' => Ok(Key::F),
            'Z' => Ok(Key::Z),
            'X' => Ok(Key::X),
            'C' => Ok(Key::C),
            'V' => Ok(Key::V),
            _ => Err("not a valid char"),
        }
    }
}

impl TryFrom<DeviceKey> for Key {
    type Error = &'static str;
    fn try_from(key: DeviceKey) -> Result<Self, Self::Error> {
        match key {
            DeviceKey::Key1 => Ok(Key::One),
            DeviceKey::Key2 => Ok(Key::Two),
            DeviceKey::Key3 => Ok(Key::Three),
            DeviceKey::Key4 => Ok(Key::Four),
            DeviceKey::Q => Ok(Key::Q),
            DeviceKey::W => Ok(Key::W),
            DeviceKey::E => Ok(Key::E),
            DeviceKey::R => Ok(Key::R),
            DeviceKey::A => Ok(Key::A),
            DeviceKey::S => Ok(Key::S),
            DeviceKey::D => Ok(Key::D),
            DeviceKey::F => Ok(Key::F),
            DeviceKey::Z => Ok(Key::Z),
            DeviceKey::X => Ok(Key::X),
            DeviceKey::C => Ok(Key::C),
            DeviceKey::V => Ok(Key::V),
            _ => Err("not a valid key"),
        }
    }
}

impl TryFrom<CrosstermKey> for Key {
    type Error = &'static str;
    fn try_from(key: CrosstermKey) -> Result<Self, Self::Error> {
        match key {
            CrosstermKey::Char(c) => Key::try_from_char(c),
            _ => Err("not a valid key"),
        }
    }
}

// Keyboard holds state necessary for providing keyboard state to CHIP-8 interpeters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Keyboard {
    focused: bool,

    // This field is a bitmap of the keyboard state because each key has
    // a hexadecimal value and there are exactly 16 of them so we can do this
    // A 1 is key down and a 0 is key up
    focused_down_keys: u16,
}

impl Keyboard {
    pub fn down_keys(&self) -> u16 {
        self.focused_down_keys
    }

    // on terminal focus
    pub fn handle_focus(&mut self) {
        if !self.focused {
            self.focused = true;
            log::info!("focus gained");
        }
    }

    // on terminal unfocus
    pub fn handle_unfocus(&mut self) {
        self.focused = false;
        self.focused_down_keys = 0;

        log::info!("clearing pressed keys because of focus lost");
    }

    // we default set focused to false but the terminal could just not fire a terminal focus event at the start or not support such events in the first place
    // therefore if we receive an event from crossterm but our state is unfocused we know this must be incorrect and update it accordingly
    // afterwards we must handle the trigger key if possible because we cannot rely on device_query being able to capture events after crossterm
    pub fn handle_focusing_key_down(&mut self, key: Key) {
        if !self.focused {
            self.handle_focus();
            self.handle_key_down(key);
        }
    }

    pub fn handle_key_down(&mut self, key: Key) {
        if !self.focused {
            return;
        }

        if self.focused_down_keys >> key.to_code() & 1 == 0 {
            self.focused_down_keys |= 1 << key.to_code();

            log::debug!(
                "focused key change detected: bitmap {:#018b}",
                self.focused_down_keys
            );
            log::info!(
                "changed key -> pressed key {:?} code {:X?}",
                key,
                key.to_code()
            );
        }
    }

    pub fn handle_key_up(&mut self, key: Key) {
        if !self.focused {
            return;
        }

        if self.focused_down_keys >> key.to_code() & 1 == 1 {
            self.focused_down_keys &= !(1 << key.to_code());

            log::debug!(
                "focused key change detected: bitmap {:#018b}",
                self.focused_down_keys
            );
            log::info!(
                "changed key -> released key {:?} code {:X?}",
                key,
                key.to_code()
            );
        }
    }
}
