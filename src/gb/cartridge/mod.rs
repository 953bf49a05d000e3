use crate::gb::cartridge::controller::BankController;
use crate::gb::{GBError, GBResult, SubSystem};
use std::path::Path;
use std::sync::Arc;
use std::{fmt, fs};

mod controller;
mod mbc1;
mod mbc3;
mod mbc5;
mod nombc;

/// This area of memory contains the cartridge title.
const CARTRIDGE_TITLE_BEGIN: u16 = 0x0134;
const CARTRIDGE_TITLE_END: u16 = 0x0143;

/// This address contains the cartridge type and what kind of hardware is present.
/// See https://gbdev.io/pandocs/The_Cartridge_Header.html#0147--cartridge-type
const CARTRIDGE_TYPE: u16 = 0x0147;

/// This byte indicates how much ROM is present on the cartridge.
/// The ROM size is given by 32 KiB << value.
const CARTRIDGE_ROM_SIZE: u16 = 0x0148;

/// This byte indicates how much RAM is present on the cartridge.
const CARTRIDGE_RAM_SIZE: u16 = 0x0149;

/// These bytes contain a 16-bit (big-endian) checksum computed as the sum of
/// all the bytes of the cartridge ROM (except these two checksum bytes).
const CARTRIDGE_GLOBAL_CHECKSUM1: u16 = 0x014E;
const CARTRIDGE_GLOBAL_CHECKSUM2: u16 = 0x014F;

pub const ROM_BANK_SIZE: usize = 16384;
pub const RAM_BANK_SIZE: usize = 8192;

/// The memory bank controller soldered onto the cartridge.
/// See https://gbdev.io/pandocs/The_Cartridge_Header.html#0147--cartridge-type
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum ControllerType {
    NoMBC,
    MBC1,
    MBC3,
    MBC5,
}

impl TryFrom<u8> for ControllerType {
    type Error = GBError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let controller = match value {
            0x00 | 0x08 | 0x09 => ControllerType::NoMBC,
            0x01..=0x03 => ControllerType::MBC1,
            0x0F..=0x13 => ControllerType::MBC3,
            0x19..=0x1E => ControllerType::MBC5,
            _ => return Err(format!("cartridge type {value:#04x} not supported").into()),
        };
        Ok(controller)
    }
}

impl fmt::Display for ControllerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerType::NoMBC => "NoMBC",
            ControllerType::MBC1 => "MBC1",
            ControllerType::MBC3 => "MBC3",
            ControllerType::MBC5 => "MBC5",
        };
        write!(f, "{name}")
    }
}

/// Contains the configuration of the cartridge. This includes the controller
/// type, and the number of ROM and RAM banks derived from the header.
#[derive(Copy, Clone, Debug)]
pub struct CartridgeConfig {
    pub controller: ControllerType,
    pub rom_banks: u16,
    pub ram_banks: u16,
}

impl CartridgeConfig {
    pub fn new(controller: ControllerType, rom_size: u8, ram_size: u8) -> GBResult<Self> {
        let ram_banks = match ram_size {
            0x00 => 0,
            0x02 => 1,  // 8 KiB
            0x03 => 4,  // 32 KiB
            0x04 => 16, // 128 KiB
            0x05 => 8,  // 64 KiB
            value => return Err(format!("unsupported RAM size: {value:#04x}").into()),
        };

        if rom_size > 0x08 {
            return Err(format!("unsupported ROM size: {rom_size:#04x}").into());
        }
        // 32 KiB << value expressed in 16 KiB banks
        let rom_banks = 2u16 << rom_size;

        Ok(Self {
            controller,
            rom_banks,
            ram_banks,
        })
    }

    #[inline(always)]
    pub const fn rom_size(&self) -> usize {
        self.rom_banks as usize * ROM_BANK_SIZE
    }

    #[inline(always)]
    pub const fn ram_size(&self) -> usize {
        self.ram_banks as usize * RAM_BANK_SIZE
    }
}

/// Contains the cartridge header information.
/// See https://gbdev.io/pandocs/The_Cartridge_Header.html
#[derive(Clone)]
pub struct CartridgeHeader {
    pub title: String,
    pub config: CartridgeConfig,
}

impl TryFrom<&[u8]> for CartridgeHeader {
    type Error = GBError;
    fn try_from(buf: &[u8]) -> Result<Self, Self::Error> {
        if buf.len() <= CARTRIDGE_GLOBAL_CHECKSUM2 as usize {
            return Err("cartridge is too small to contain a header".into());
        }
        let controller = ControllerType::try_from(buf[CARTRIDGE_TYPE as usize])?;
        let config = CartridgeConfig::new(
            controller,
            buf[CARTRIDGE_ROM_SIZE as usize],
            buf[CARTRIDGE_RAM_SIZE as usize],
        )?;
        let title = CartridgeHeader::parse_title(buf);
        Ok(Self { title, config })
    }
}

impl CartridgeHeader {
    /// Returns the cartridge title from the cartridge header.
    fn parse_title(buf: &[u8]) -> String {
        let title = buf[CARTRIDGE_TITLE_BEGIN as usize..=CARTRIDGE_TITLE_END as usize]
            .iter()
            .filter_map(|b| b.is_ascii_alphanumeric().then_some(char::from(*b)))
            .collect::<String>();
        match title.is_empty() {
            true => "Unnamed".to_string(),
            false => title,
        }
    }
}

impl fmt::Display for CartridgeHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.config.controller)
    }
}

/// Holds the immutable ROM, the mutable external RAM and the active bank
/// controller. All accesses from the bus are routed through the controller.
#[derive(Clone)]
pub struct Cartridge {
    pub header: CartridgeHeader,
    controller: Box<dyn BankController>,
}

impl TryFrom<Arc<[u8]>> for Cartridge {
    type Error = GBError;

    fn try_from(rom: Arc<[u8]>) -> Result<Self, Self::Error> {
        let header = CartridgeHeader::try_from(rom.as_ref())?;
        if rom.len() != header.config.rom_size() {
            return Err(format!(
                "declared ROM size ({} bytes) does not match file length ({} bytes)",
                header.config.rom_size(),
                rom.len()
            )
            .into());
        }
        if let Err(msg) = verify_checksum(rom.as_ref()) {
            log::warn!("{msg}");
        }
        let controller = controller::new(header.config, rom);
        Ok(Self { controller, header })
    }
}

impl TryFrom<&Path> for Cartridge {
    type Error = GBError;

    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        let rom = fs::read(path)?;
        Cartridge::try_from(Arc::from(rom.into_boxed_slice()))
    }
}

impl fmt::Display for Cartridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header)
    }
}

impl SubSystem for Cartridge {
    #[inline]
    fn write(&mut self, address: u16, value: u8) {
        self.controller.write(address, value);
    }

    #[inline]
    fn read(&mut self, address: u16) -> u8 {
        self.controller.read(address)
    }
}

/// Validates the global checksum of the given buffer containing the whole cartridge.
fn verify_checksum(buf: &[u8]) -> Result<(), String> {
    let byte1 = buf[CARTRIDGE_GLOBAL_CHECKSUM1 as usize];
    let byte2 = buf[CARTRIDGE_GLOBAL_CHECKSUM2 as usize];
    let checksum = u16::from(byte1) << 8 | u16::from(byte2);
    let calculated_checksum = calculate_global_checksum(buf);

    if checksum == calculated_checksum {
        return Ok(());
    }

    Err(format!(
        "global checksum mismatch! expected: {calculated_checksum:#06x} got: {checksum:#06x}"
    ))
}

/// Calculates the global checksum by adding all bytes from the given cartridge
/// buffer except the two checksum bytes.
fn calculate_global_checksum(buf: &[u8]) -> u16 {
    buf.iter()
        .enumerate()
        .fold(0, |sum, (address, &byte)| match address as u16 {
            CARTRIDGE_GLOBAL_CHECKSUM1 => sum,
            CARTRIDGE_GLOBAL_CHECKSUM2 => sum,
            _ => sum.wrapping_add(byte as u16),
        })
}

/// Masks a ROM bank number to the number of banks in the cartridge.
#[inline]
pub(crate) const fn rom_bank_mask(rom_banks: u16) -> u16 {
    rom_banks.next_power_of_two() - 1
}
