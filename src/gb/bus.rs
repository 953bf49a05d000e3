use crate::gb::apu::*;
use crate::gb::cartridge::Cartridge;
use crate::gb::constants::*;
use crate::gb::interrupt::InterruptRegister;
use crate::gb::joypad::{Button, Joypad};
use crate::gb::ppu::PPU;
use crate::gb::ppu::registers::{LCDControl, LCDState};
use crate::gb::serial::SerialTransfer;
use crate::gb::timer::Timer;
use crate::gb::{Bus as BusInterface, SubSystem};

/// Defines the global memory map, all processing units are owned by it and
/// advance in lockstep whenever the CPU touches the bus.
pub struct Bus {
    pub cartridge: Cartridge,
    pub ppu: PPU,
    pub apu: APU,
    pub timer: Timer,
    pub joypad: Joypad,
    pub serial: SerialTransfer,
    pub interrupt_enable: InterruptRegister,
    pub interrupt_flag: InterruptRegister,
    wram: [u8; WRAM_SIZE],
    hram: [u8; HRAM_SIZE],
}

impl Bus {
    pub fn with_cartridge(cartridge: Cartridge) -> Self {
        let mut bus = Self {
            cartridge,
            ppu: PPU::default(),
            apu: APU::default(),
            timer: Timer::default(),
            joypad: Joypad::default(),
            serial: SerialTransfer::default(),
            interrupt_enable: InterruptRegister::empty(),
            interrupt_flag: InterruptRegister::empty(),
            wram: [0u8; WRAM_SIZE],
            hram: [0u8; HRAM_SIZE],
        };
        bus.write_post_boot_defaults();
        bus
    }

    /// Brings all I/O registers into the state the boot ROM leaves behind.
    /// The table is ordered so register side effects reproduce the
    /// documented post-boot values bit for bit.
    fn write_post_boot_defaults(&mut self) {
        self.joypad.write(0xCF);
        self.serial.write(SERIAL_TRANSFER_DATA, 0x00);
        self.serial.write(SERIAL_TRANSFER_CTRL, 0x7E);

        self.timer.divider = 0xAB00;
        self.timer.write(TIMER_COUNTER, 0x00);
        self.timer.write(TIMER_MODULO, 0x00);
        self.timer.write(TIMER_CTRL, 0xF8);

        self.interrupt_flag = InterruptRegister::from_bits_truncate(0xE1);

        // NR52 first: the power bit gates all other audio register writes.
        // Triggering channel 1 afterwards makes its status bit read back set.
        self.apu.write(AUDIO_MASTER_CONTROL, 0xF1);
        self.apu.write(AUDIO_CHANNEL_1_SWEEP, 0x80);
        self.apu.write(AUDIO_CHANNEL_1_LENGTH, 0xBF);
        self.apu.write(AUDIO_CHANNEL_1_VOLUME, 0xF3);
        self.apu.write(AUDIO_CHANNEL_1_PERIOD_HIGH, 0xBF);
        self.apu.write(AUDIO_CHANNEL_2_LENGTH, 0x3F);
        self.apu.write(AUDIO_CHANNEL_2_VOLUME, 0x00);
        self.apu.write(AUDIO_CHANNEL_2_PERIOD_LOW, 0xFF);
        self.apu.write(AUDIO_CHANNEL_2_PERIOD_HIGH, 0xBF);
        self.apu.write(AUDIO_CHANNEL_3_DAC_ENABLE, 0x7F);
        self.apu.write(AUDIO_CHANNEL_3_LENGTH, 0xFF);
        self.apu.write(AUDIO_CHANNEL_3_VOLUME, 0x9F);
        self.apu.write(AUDIO_CHANNEL_3_PERIOD_LOW, 0xFF);
        self.apu.write(AUDIO_CHANNEL_3_PERIOD_HIGH, 0xBF);
        self.apu.write(AUDIO_CHANNEL_4_LENGTH, 0xFF);
        self.apu.write(AUDIO_CHANNEL_4_VOLUME, 0x00);
        self.apu.write(AUDIO_CHANNEL_4_FREQ, 0x00);
        self.apu.write(AUDIO_CHANNEL_4_CONTROL, 0xBF);
        self.apu.write(AUDIO_MASTER_VOLUME, 0x77);
        self.apu.write(AUDIO_SOUND_PANNING, 0xF3);

        // LCDC and STAT are set directly: the boot ROM hands the machine
        // over inside the vertical blank of its last frame.
        self.ppu.r.lcd_control = LCDControl::from_bits_retain(0x91);
        self.ppu.r.lcd_stat = LCDState::from_bits_retain(0x85);
        self.ppu.write(PPU_SCY, 0x00);
        self.ppu.write(PPU_SCX, 0x00);
        self.ppu.write(PPU_LYC, 0x00);
        self.ppu.write(PPU_BGP, 0xFC);
        self.ppu.write(PPU_OBP0, 0xFF);
        self.ppu.write(PPU_OBP1, 0xFF);
        self.ppu.write(PPU_WY, 0x00);
        self.ppu.write(PPU_WX, 0x00);

        self.interrupt_enable = InterruptRegister::empty();
    }

    /// Handles a button press or release pushed in by the host.
    #[inline]
    pub fn handle_button(&mut self, button: Button, pressed: bool) {
        self.joypad
            .handle_button(button, pressed, &mut self.interrupt_flag);
    }

    /// Moves up to 4 bytes of a running OAM DMA transfer,
    /// one per T-cycle.
    fn dma_cycle(&mut self) {
        self.ppu.r.oam_dma.advance();
        for _ in 0..4 {
            if let Some(source) = self.ppu.r.oam_dma.transfer() {
                let value = self.dma_read(source);
                self.ppu.dma_write_oam(source as u8, value);
            }
        }
    }

    /// DMA reads bypass the mode based VRAM gate the CPU is subject to.
    fn dma_read(&mut self, address: u16) -> u8 {
        match address {
            VRAM_BEGIN..=VRAM_END => self.ppu.vram_read_raw(address),
            _ => self.read_raw(address),
        }
    }

    /// Handles all writes to the I/O registers (0xFF00 - 0xFF7F).
    fn write_io(&mut self, address: u16, value: u8) {
        match address {
            JOYPAD => self.joypad.write(value),
            SERIAL_TRANSFER_DATA | SERIAL_TRANSFER_CTRL => self.serial.write(address, value),
            TIMER_DIVIDER..=TIMER_CTRL => self.timer.write(address, value),
            INTERRUPT_FLAG => self.interrupt_flag = InterruptRegister::from_bits_truncate(value),
            AUDIO_REGISTERS_START..=AUDIO_REGISTERS_END => self.apu.write(address, value),
            PPU_REGISTER_START..=PPU_REGISTER_END => self.ppu.write(address, value),
            _ => log::debug!("Ignoring write to unmapped I/O register {address:#06x}"),
        }
    }

    /// Handles all reads from the I/O registers (0xFF00 - 0xFF7F).
    fn read_io(&mut self, address: u16) -> u8 {
        match address {
            JOYPAD => self.joypad.read(),
            SERIAL_TRANSFER_DATA | SERIAL_TRANSFER_CTRL => self.serial.read(address),
            TIMER_DIVIDER..=TIMER_CTRL => self.timer.read(address),
            // Undocumented bits should be 1
            INTERRUPT_FLAG => self.interrupt_flag.bits() | 0b1110_0000,
            AUDIO_REGISTERS_START..=AUDIO_REGISTERS_END => self.apu.read(address),
            PPU_REGISTER_START..=PPU_REGISTER_END => self.ppu.read(address),
            _ => {
                log::debug!("Ignoring read from unmapped I/O register {address:#06x}");
                UNDEFINED_READ
            }
        }
    }

    /// Dispatches a write without advancing the machine.
    pub fn write_raw(&mut self, address: u16, value: u8) {
        match address {
            ROM_LOW_BANK_BEGIN..=ROM_HIGH_BANK_END => self.cartridge.write(address, value),
            VRAM_BEGIN..=VRAM_END => self.ppu.write(address, value),
            CRAM_BANK_BEGIN..=CRAM_BANK_END => self.cartridge.write(address, value),
            WRAM_BEGIN..=WRAM_END => self.wram[(address - WRAM_BEGIN) as usize] = value,
            // Echo RAM mirrors 0xC000 - 0xDDFF
            ERAM_BEGIN..=ERAM_END => self.wram[(address - ERAM_BEGIN) as usize] = value,
            OAM_BEGIN..=OAM_END => self.ppu.write(address, value),
            UNUSED_BEGIN..=UNUSED_END => {}
            IO_BEGIN..=IO_END => self.write_io(address, value),
            HRAM_BEGIN..=HRAM_END => self.hram[(address - HRAM_BEGIN) as usize] = value,
            INTERRUPT_ENABLE => self.interrupt_enable = InterruptRegister::from_bits_truncate(value),
        }
    }

    /// Dispatches a read without advancing the machine.
    pub fn read_raw(&mut self, address: u16) -> u8 {
        match address {
            ROM_LOW_BANK_BEGIN..=ROM_HIGH_BANK_END => self.cartridge.read(address),
            VRAM_BEGIN..=VRAM_END => self.ppu.read(address),
            CRAM_BANK_BEGIN..=CRAM_BANK_END => self.cartridge.read(address),
            WRAM_BEGIN..=WRAM_END => self.wram[(address - WRAM_BEGIN) as usize],
            ERAM_BEGIN..=ERAM_END => self.wram[(address - ERAM_BEGIN) as usize],
            OAM_BEGIN..=OAM_END => self.ppu.read(address),
            UNUSED_BEGIN..=UNUSED_END => UNDEFINED_READ,
            IO_BEGIN..=IO_END => self.read_io(address),
            HRAM_BEGIN..=HRAM_END => self.hram[(address - HRAM_BEGIN) as usize],
            INTERRUPT_ENABLE => self.interrupt_enable.bits(),
        }
    }
}

impl BusInterface for Bus {
    /// One M-cycle: the timer, the OAM DMA engine, the PPU and the APU each
    /// cover their 4 T-cycles, in that order.
    fn cycle(&mut self) {
        self.timer.step(&mut self.interrupt_flag);
        self.dma_cycle();
        self.ppu.step(&mut self.interrupt_flag);
        self.apu.step();
    }

    fn read(&mut self, address: u16) -> u8 {
        self.cycle();
        self.read_raw(address)
    }

    fn write(&mut self, address: u16, value: u8) {
        self.cycle();
        self.write_raw(address, value);
    }

    #[inline]
    fn get_ie(&self) -> InterruptRegister {
        self.interrupt_enable
    }

    #[inline]
    fn set_ie(&mut self, value: InterruptRegister) {
        self.interrupt_enable = value;
    }

    #[inline]
    fn get_if(&self) -> InterruptRegister {
        self.interrupt_flag
    }

    #[inline]
    fn set_if(&mut self, value: InterruptRegister) {
        self.interrupt_flag = value;
    }
}
