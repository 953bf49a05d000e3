use crate::gb::interrupt::InterruptRegister;
use crate::gb::utils;

/// The abstract buttons a host can press or release.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Button {
    A,
    B,
    Start,
    Select,
    Up,
    Down,
    Left,
    Right,
}

/// Represents the Joypad at register 0xFF00.
/// The eight Game Boy action/direction buttons are arranged as a 2x4 matrix.
/// Select either action or direction buttons by writing to bits 4-5,
/// then read out bits 0-3. The lower nibble is read-only.
/// Note that, rather unconventionally for the Game Boy,
/// a button being pressed is seen as the corresponding bit being 0, not 1.
#[derive(Copy, Clone, Default, Debug)]
pub struct Joypad {
    select_dpad: bool,
    select_action: bool,
    a: bool,
    b: bool,
    start: bool,
    select: bool,
    up: bool,
    down: bool,
    left: bool,
    right: bool,
}

impl Joypad {
    /// Updates the state of a single button and requests the joypad
    /// interrupt if it is a press in the currently selected group.
    pub fn handle_button(&mut self, button: Button, pressed: bool, int_reg: &mut InterruptRegister) {
        let group_selected = match button {
            Button::A | Button::B | Button::Start | Button::Select => self.select_action,
            _ => self.select_dpad,
        };
        match button {
            Button::A => self.a = pressed,
            Button::B => self.b = pressed,
            Button::Start => self.start = pressed,
            Button::Select => self.select = pressed,
            Button::Up => self.up = pressed,
            Button::Down => self.down = pressed,
            Button::Left => self.left = pressed,
            Button::Right => self.right = pressed,
        }
        if pressed && group_selected {
            int_reg.insert(InterruptRegister::JOYPAD);
        }
    }

    /// Reads the Joypad register composed from the selected button groups.
    /// If both groups are selected their rows are merged, like the matrix
    /// would on hardware.
    pub fn read(&self) -> u8 {
        let mut value = 0b1100_0000;
        value = utils::with_bit(value, 4, !self.select_dpad);
        value = utils::with_bit(value, 5, !self.select_action);

        let mut row0 = false;
        let mut row1 = false;
        let mut row2 = false;
        let mut row3 = false;
        if self.select_dpad {
            row0 |= self.right;
            row1 |= self.left;
            row2 |= self.up;
            row3 |= self.down;
        }
        if self.select_action {
            row0 |= self.a;
            row1 |= self.b;
            row2 |= self.select;
            row3 |= self.start;
        }
        value = utils::with_bit(value, 0, !row0);
        value = utils::with_bit(value, 1, !row1);
        value = utils::with_bit(value, 2, !row2);
        utils::with_bit(value, 3, !row3)
    }

    /// Writes the group selection, bits 4-5 are the only writable bits.
    /// A 0 selects the respective group.
    #[inline]
    pub fn write(&mut self, value: u8) {
        self.select_dpad = !utils::bit(value, 4);
        self.select_action = !utils::bit(value, 5);
    }
}
