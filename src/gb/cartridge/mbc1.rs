use crate::gb::cartridge::controller::BankController;
use crate::gb::cartridge::{CartridgeConfig, RAM_BANK_SIZE, ROM_BANK_SIZE, rom_bank_mask};
use crate::gb::constants::*;
use std::sync::Arc;

/// Before external RAM can be read or written, it must be enabled by writing
/// a value with 0x0A in the lower 4 bits to anywhere in this address space.
/// Any other value disables the RAM.
const RAM_ENABLE_BEGIN: u16 = 0x0000;
const RAM_ENABLE_END: u16 = 0x1FFF;

/// This 5-bit register selects the ROM bank number for the 0x4000 - 0x7FFF
/// region. If this register is set to 0x00, it behaves as if it is set to
/// 0x01, which is why writing 0x00, 0x20, 0x40 or 0x60 selects bank + 1.
const ROM_BANK_NUMBER_BEGIN: u16 = 0x2000;
const ROM_BANK_NUMBER_END: u16 = 0x3FFF;

/// This 2-bit register selects the RAM bank (32 KiB RAM carts), or the upper
/// two bits (bits 5-6) of the ROM bank number (1 MiB ROM or larger carts).
const RAM_BANK_NUMBER_BEGIN: u16 = 0x4000;
const RAM_BANK_NUMBER_END: u16 = 0x5FFF;

/// This 1-bit register selects between the two MBC1 banking modes, which
/// controls how the secondary 2-bit banking register above is interpreted
/// for the 0x0000 - 0x3FFF ROM window and the RAM window.
const BANKING_MODE_SELECT_BEGIN: u16 = 0x6000;
const BANKING_MODE_SELECT_END: u16 = 0x7FFF;

/// In its default configuration, MBC1 supports up to 512 KiB ROM with up to
/// 32 KiB of banked RAM. Some cartridges wire the 2-bit register as an
/// extension of the ROM banking register instead, supporting up to 2 MiB ROM
/// at the cost of a fixed 8 KiB of cartridge RAM.
#[derive(Clone)]
pub struct MBC1 {
    config: CartridgeConfig,
    rom: Arc<[u8]>,
    ram: Vec<u8>,
    ram_enabled: bool,
    rom_bank: u8,       // 5 bit ROM bank number, never 0
    ram_bank: u8,       // 2 bit RAM bank number or ROM bank bits 5-6
    banking_mode: bool, // false: simple mode, true: advanced mode
}

impl MBC1 {
    pub fn new(config: CartridgeConfig, rom: Arc<[u8]>) -> Self {
        Self {
            ram: vec![0; config.ram_size()],
            ram_enabled: false,
            rom_bank: 0b0000_0001,
            ram_bank: 0b0000_0000,
            banking_mode: false,
            rom,
            config,
        }
    }

    /// Physical ROM bank mapped into the 0x0000 - 0x3FFF window.
    #[inline]
    fn low_bank(&self) -> usize {
        match self.banking_mode {
            true => usize::from(self.ram_bank) << 5 & rom_bank_mask(self.config.rom_banks) as usize,
            false => 0,
        }
    }

    /// Physical ROM bank mapped into the 0x4000 - 0x7FFF window.
    #[inline]
    fn high_bank(&self) -> usize {
        (usize::from(self.ram_bank) << 5 | usize::from(self.rom_bank))
            & rom_bank_mask(self.config.rom_banks) as usize
    }

    /// RAM bank mapped into the external RAM window.
    /// RAM banking is only in effect in advanced banking mode.
    #[inline]
    fn ram_bank(&self) -> usize {
        match self.banking_mode {
            true => usize::from(self.ram_bank),
            false => 0,
        }
    }
}

impl BankController for MBC1 {
    fn read(&mut self, address: u16) -> u8 {
        match address {
            ROM_LOW_BANK_BEGIN..=ROM_LOW_BANK_END => {
                let offset = self.low_bank() * ROM_BANK_SIZE;
                self.rom[(offset + address as usize) % self.rom.len()]
            }
            ROM_HIGH_BANK_BEGIN..=ROM_HIGH_BANK_END => {
                let offset = self.high_bank() * ROM_BANK_SIZE;
                self.rom[(offset + (address - ROM_HIGH_BANK_BEGIN) as usize) % self.rom.len()]
            }
            CRAM_BANK_BEGIN..=CRAM_BANK_END => {
                if self.ram_enabled && !self.ram.is_empty() {
                    let offset = self.ram_bank() * RAM_BANK_SIZE;
                    self.ram[(offset + (address - CRAM_BANK_BEGIN) as usize) % self.ram.len()]
                } else {
                    UNDEFINED_READ
                }
            }
            _ => panic!("MBC1: Invalid address for read: {address:#06x}"),
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            RAM_ENABLE_BEGIN..=RAM_ENABLE_END => {
                self.ram_enabled = value & 0b1111 == 0b1010;
            }
            ROM_BANK_NUMBER_BEGIN..=ROM_BANK_NUMBER_END => {
                let bank = value & 0b0001_1111 & rom_bank_mask(self.config.rom_banks) as u8;
                self.rom_bank = match bank {
                    0 => 1,
                    n => n,
                };
            }
            RAM_BANK_NUMBER_BEGIN..=RAM_BANK_NUMBER_END => {
                self.ram_bank = value & 0b11;
            }
            BANKING_MODE_SELECT_BEGIN..=BANKING_MODE_SELECT_END => {
                self.banking_mode = value & 0b1 == 0b1;
            }
            CRAM_BANK_BEGIN..=CRAM_BANK_END => {
                if self.ram_enabled && !self.ram.is_empty() {
                    let offset = self.ram_bank() * RAM_BANK_SIZE;
                    let index = (offset + (address - CRAM_BANK_BEGIN) as usize) % self.ram.len();
                    self.ram[index] = value;
                }
            }
            _ => {}
        }
    }
}
