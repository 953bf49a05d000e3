pub mod apu;
pub mod bus;
pub mod cartridge;
pub mod constants;
pub mod cpu;
pub mod interrupt;
pub mod joypad;
pub mod oam;
pub mod ppu;
pub mod serial;
pub mod timer;
pub mod utils;

#[cfg(test)]
mod tests;

use crate::gb::bus::Bus as MainBus;
use crate::gb::cartridge::Cartridge;
use crate::gb::cpu::CPU;
use crate::gb::cpu::interrupt as cpu_interrupt;
use crate::gb::interrupt::InterruptRegister;
use crate::gb::joypad::Button;
use crate::gb::ppu::buffer::FrameBuffer;
use std::io;
use thiserror::Error;

pub const SCREEN_WIDTH: u8 = 160;
pub const SCREEN_HEIGHT: u8 = 144;
pub const VERTICAL_BLANK_SCAN_LINE_MAX: u8 = 153;

/// The DMG master clock in T-cycles per second, 4 T-cycles make up one M-cycle.
pub const CPU_CLOCK_SPEED: u32 = 1024 * 1024 * 4;

/// This trait defines the register level read/write contract each
/// component implements for the address ranges it owns.
pub trait SubSystem {
    fn write(&mut self, address: u16, value: u8);
    fn read(&mut self, address: u16) -> u8;
}

/// This trait defines the interface the CPU executes against.
/// Every read or write advances the machine by one M-cycle before the
/// access happens, instructions with internal delays call `cycle` directly.
pub trait Bus {
    /// Advances all clocked components by one M-cycle (4 T-cycles).
    fn cycle(&mut self);

    /// Advances one M-cycle, then reads from the given address.
    fn read(&mut self, address: u16) -> u8;

    /// Advances one M-cycle, then writes to the given address.
    fn write(&mut self, address: u16, value: u8);

    fn get_ie(&self) -> InterruptRegister;
    fn set_ie(&mut self, value: InterruptRegister);
    fn get_if(&self) -> InterruptRegister;
    fn set_if(&mut self, value: InterruptRegister);

    /// Indicates whether an interrupt is both enabled and pending.
    #[inline]
    fn has_irq(&self) -> bool {
        !(self.get_ie() & self.get_if() & InterruptRegister::all()).is_empty()
    }
}

#[derive(Debug, Error)]
pub enum GBError {
    #[error("invalid cartridge: {0}")]
    InvalidCartridge(String),
    #[error("illegal opcode {opcode:#04x} at {pc:#06x}")]
    IllegalOpcode { opcode: u8, pc: u16 },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<String> for GBError {
    fn from(msg: String) -> Self {
        GBError::InvalidCartridge(msg)
    }
}

impl From<&str> for GBError {
    fn from(msg: &str) -> Self {
        GBError::InvalidCartridge(msg.to_string())
    }
}

pub type GBResult<T> = Result<T, GBError>;

/// Ties CPU and Bus together and drives them in lockstep.
/// This is the only type a host has to interact with.
pub struct Emulator {
    pub cpu: CPU,
    pub bus: MainBus,
}

impl Emulator {
    pub fn new(cartridge: Cartridge) -> Self {
        Self {
            cpu: CPU::post_boot(),
            bus: MainBus::with_cartridge(cartridge),
        }
    }

    /// Executes one CPU instruction and services pending interrupts afterwards.
    /// All other components are advanced implicitly through the bus clock.
    pub fn step(&mut self) -> GBResult<()> {
        self.cpu.step(&mut self.bus)?;
        cpu_interrupt::handle(&mut self.cpu, &mut self.bus);
        Ok(())
    }

    /// Runs instructions until the PPU finishes the current frame.
    pub fn step_frame(&mut self) -> GBResult<()> {
        loop {
            self.step()?;
            if self.bus.ppu.take_frame_ready() {
                return Ok(());
            }
        }
    }

    /// Resets the machine to the post-boot state.
    /// The cartridge and its external RAM survive the reset.
    pub fn reset(&mut self) {
        let cartridge = self.bus.cartridge.clone();
        *self = Emulator::new(cartridge);
    }

    /// Handles a button press or release pushed in by the host.
    #[inline]
    pub fn handle_button(&mut self, button: Button, pressed: bool) {
        self.bus.handle_button(button, pressed);
    }

    /// Returns the last completed frame.
    #[inline]
    pub fn frame(&self) -> &FrameBuffer {
        self.bus.ppu.front_buffer()
    }

    /// Returns the frame currently being drawn.
    #[inline]
    pub fn working_frame(&self) -> &FrameBuffer {
        self.bus.ppu.working_buffer()
    }

    /// Hands out all audio samples collected since the last call.
    #[inline]
    pub fn drain_audio(&mut self) -> Vec<f32> {
        self.bus.apu.drain_samples()
    }
}
