use crate::gb::cartridge::controller::BankController;
use crate::gb::cartridge::{CartridgeConfig, RAM_BANK_SIZE, ROM_BANK_SIZE, rom_bank_mask};
use crate::gb::constants::*;
use std::sync::Arc;

/// Mostly the same as for MBC1. Writing a value with 0x0A in the lower
/// 4 bits enables reading and writing to external RAM, anything else
/// disables it.
const RAM_ENABLE_BEGIN: u16 = 0x0000;
const RAM_ENABLE_END: u16 = 0x1FFF;

/// The 8 least significant bits of the ROM bank number go here.
/// Writing 0 will indeed give bank 0 on MBC5, unlike other MBCs.
const ROM_BANK_LOW_BITS_BEGIN: u16 = 0x2000;
const ROM_BANK_LOW_BITS_END: u16 = 0x2FFF;

/// The 9th bit of the ROM bank number goes here.
const ROM_BANK_HIGH_BIT_BEGIN: u16 = 0x3000;
const ROM_BANK_HIGH_BIT_END: u16 = 0x3FFF;

/// Writing a value in the range 0x00 - 0x0F maps the corresponding external
/// RAM bank (if any) into the memory area at 0xA000 - 0xBFFF.
const RAM_BANK_NUMBER_BEGIN: u16 = 0x4000;
const RAM_BANK_NUMBER_END: u16 = 0x5FFF;

/// MBC5 is the 5th generation MBC. It can map up to 64 MBits (8 MiB) of ROM
/// through its 9 bit ROM bank number.
#[derive(Clone)]
pub struct MBC5 {
    config: CartridgeConfig,
    rom: Arc<[u8]>,
    ram: Vec<u8>,
    rom_bank: u16, // 9 bit ROM bank number for 0x4000 - 0x7FFF, bank 0 is selectable
    ram_bank: u8,  // 4 bit RAM bank number for 0xA000 - 0xBFFF
    ram_enabled: bool,
}

impl MBC5 {
    pub fn new(config: CartridgeConfig, rom: Arc<[u8]>) -> Self {
        Self {
            ram: vec![0; config.ram_size()],
            rom_bank: 1,
            ram_bank: 0,
            ram_enabled: false,
            rom,
            config,
        }
    }
}

impl BankController for MBC5 {
    fn read(&mut self, address: u16) -> u8 {
        match address {
            ROM_LOW_BANK_BEGIN..=ROM_LOW_BANK_END => self.rom[address as usize],
            ROM_HIGH_BANK_BEGIN..=ROM_HIGH_BANK_END => {
                let offset = self.rom_bank as usize * ROM_BANK_SIZE;
                self.rom[(offset + (address - ROM_HIGH_BANK_BEGIN) as usize) % self.rom.len()]
            }
            CRAM_BANK_BEGIN..=CRAM_BANK_END => {
                if self.ram_enabled && !self.ram.is_empty() {
                    let offset = self.ram_bank as usize * RAM_BANK_SIZE;
                    self.ram[(offset + (address - CRAM_BANK_BEGIN) as usize) % self.ram.len()]
                } else {
                    UNDEFINED_READ
                }
            }
            _ => panic!("MBC5: Invalid address for read: {address:#06x}"),
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            RAM_ENABLE_BEGIN..=RAM_ENABLE_END => {
                self.ram_enabled = value & 0b1111 == 0b1010;
            }
            // Sets the lower 8 bits of the ROM bank number.
            ROM_BANK_LOW_BITS_BEGIN..=ROM_BANK_LOW_BITS_END => {
                self.rom_bank = (self.rom_bank & 0x0100) | u16::from(value);
                self.rom_bank &= rom_bank_mask(self.config.rom_banks);
            }
            // Sets the upper 1 bit of the ROM bank number.
            ROM_BANK_HIGH_BIT_BEGIN..=ROM_BANK_HIGH_BIT_END => {
                self.rom_bank = (self.rom_bank & 0x00FF) | u16::from(value & 0b1) << 8;
                self.rom_bank &= rom_bank_mask(self.config.rom_banks);
            }
            RAM_BANK_NUMBER_BEGIN..=RAM_BANK_NUMBER_END => {
                self.ram_bank = value & 0b0000_1111;
            }
            CRAM_BANK_BEGIN..=CRAM_BANK_END => {
                if self.ram_enabled && !self.ram.is_empty() {
                    let offset = self.ram_bank as usize * RAM_BANK_SIZE;
                    let index = (offset + (address - CRAM_BANK_BEGIN) as usize) % self.ram.len();
                    self.ram[index] = value;
                }
            }
            _ => {}
        }
    }
}
