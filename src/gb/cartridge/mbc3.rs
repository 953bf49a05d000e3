use crate::gb::cartridge::controller::BankController;
use crate::gb::cartridge::{CartridgeConfig, RAM_BANK_SIZE, ROM_BANK_SIZE, rom_bank_mask};
use crate::gb::constants::*;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Mostly the same as for MBC1, a value of 0x0A enables reading and writing
/// to external RAM and to the RTC registers, any other value disables both.
const RAM_RTC_ENABLE_BEGIN: u16 = 0x0000;
const RAM_RTC_ENABLE_END: u16 = 0x1FFF;

/// The whole 7 bits of the ROM bank number are written directly to this
/// address. As for MBC1, writing 0x00 selects bank 0x01 instead.
const ROM_BANK_NUMBER_BEGIN: u16 = 0x2000;
const ROM_BANK_NUMBER_END: u16 = 0x3FFF;

/// Controls what is mapped into memory at 0xA000 - 0xBFFF.
/// 0x00 - 0x03: RAM bank.
/// 0x08 - 0x0C: RTC register.
const RAM_BANK_NUMBER_BEGIN: u16 = 0x4000;
const RAM_BANK_NUMBER_END: u16 = 0x5FFF;

/// When writing 0x00, and then 0x01 to this register, the current time
/// becomes latched into the RTC registers. The latched data does not change
/// until the 0x00 -> 0x01 procedure is repeated.
const LATCH_CLOCK_DATA_BEGIN: u16 = 0x6000;
const LATCH_CLOCK_DATA_END: u16 = 0x7FFF;

bitflags! {
    /// Represents the RTC Day High Register.
    #[derive(Copy, Clone, Default)]
    struct DayHighRegister: u8 {
        const DAY_COUNTER_MSB   = 0b0000_0001;
        const HALT              = 0b0100_0000;
        const DAY_COUNTER_CARRY = 0b1000_0000;
    }
}

/// The RTC registers keep track of play time. This is a stub that latches
/// the host wall clock, there is no battery backed time source.
#[derive(Copy, Clone, Default)]
struct RTCRegisters {
    seconds: u8,
    minutes: u8,
    hours: u8,
    day_low: u8,
    day_high: DayHighRegister,
}

impl RTCRegisters {
    /// Captures the current wall-clock time. The day counter is 9 bits
    /// wide, running past day 511 wraps it and latches the carry flag.
    fn latch(&mut self) {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.seconds = (elapsed % 60) as u8;
        self.minutes = (elapsed / 60 % 60) as u8;
        self.hours = (elapsed / 3600 % 24) as u8;
        let days = elapsed / 86400;
        self.day_low = (days % 512) as u8;
        self.day_high
            .set(DayHighRegister::DAY_COUNTER_MSB, days % 512 & 0x100 != 0);
        self.day_high
            .set(DayHighRegister::DAY_COUNTER_CARRY, days > 0x1FF);
    }
}

/// Determines the currently selected RAM bank or RTC register.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum RAMBankSelection {
    RAMBank(u8),
    Seconds,
    Minutes,
    Hours,
    DayLow,
    DayHigh,
}

#[derive(Copy, Clone, Default, PartialEq, Eq)]
enum RTCLatchState {
    #[default]
    Undefined,
    Pending,
    Latched,
}

/// Beside the ability to access up to 2 MiB ROM (128 banks) and 32 KiB RAM
/// (4 banks), the MBC3 also includes a built-in Real Time Clock.
#[derive(Clone)]
pub struct MBC3 {
    config: CartridgeConfig,
    rom: Arc<[u8]>,
    ram: Vec<u8>,
    rtc: RTCRegisters,
    rom_bank: u8, // 7 bit ROM bank number for 0x4000 - 0x7FFF, never 0
    rtc_latch: RTCLatchState,
    ram_bank_selection: RAMBankSelection,
    ram_rtc_enabled: bool,
}

impl MBC3 {
    pub fn new(config: CartridgeConfig, rom: Arc<[u8]>) -> Self {
        Self {
            ram: vec![0; config.ram_size()],
            rtc: RTCRegisters::default(),
            rom_bank: 1,
            rtc_latch: RTCLatchState::default(),
            ram_bank_selection: RAMBankSelection::RAMBank(0),
            ram_rtc_enabled: false,
            rom,
            config,
        }
    }
}

impl BankController for MBC3 {
    fn read(&mut self, address: u16) -> u8 {
        match address {
            ROM_LOW_BANK_BEGIN..=ROM_LOW_BANK_END => self.rom[address as usize],
            ROM_HIGH_BANK_BEGIN..=ROM_HIGH_BANK_END => {
                let offset = self.rom_bank as usize * ROM_BANK_SIZE;
                self.rom[(offset + (address - ROM_HIGH_BANK_BEGIN) as usize) % self.rom.len()]
            }
            CRAM_BANK_BEGIN..=CRAM_BANK_END => {
                if !self.ram_rtc_enabled {
                    return UNDEFINED_READ;
                }

                match self.ram_bank_selection {
                    RAMBankSelection::RAMBank(bank) => {
                        if self.ram.is_empty() {
                            return UNDEFINED_READ;
                        }
                        let offset = bank as usize * RAM_BANK_SIZE;
                        self.ram[(offset + (address - CRAM_BANK_BEGIN) as usize) % self.ram.len()]
                    }
                    RAMBankSelection::Seconds => self.rtc.seconds,
                    RAMBankSelection::Minutes => self.rtc.minutes,
                    RAMBankSelection::Hours => self.rtc.hours,
                    RAMBankSelection::DayLow => self.rtc.day_low,
                    RAMBankSelection::DayHigh => self.rtc.day_high.bits(),
                }
            }
            _ => panic!("MBC3: Invalid address for read: {address:#06x}"),
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            RAM_RTC_ENABLE_BEGIN..=RAM_RTC_ENABLE_END => {
                self.ram_rtc_enabled = value & 0b1111 == 0b1010;
            }
            ROM_BANK_NUMBER_BEGIN..=ROM_BANK_NUMBER_END => {
                let bank = value & 0b0111_1111;
                self.rom_bank = if bank == 0 { 1 } else { bank };
                self.rom_bank &= rom_bank_mask(self.config.rom_banks) as u8;
            }
            RAM_BANK_NUMBER_BEGIN..=RAM_BANK_NUMBER_END => {
                self.ram_bank_selection = match value {
                    0x00..=0x03 => RAMBankSelection::RAMBank(value),
                    0x08 => RAMBankSelection::Seconds,
                    0x09 => RAMBankSelection::Minutes,
                    0x0A => RAMBankSelection::Hours,
                    0x0B => RAMBankSelection::DayLow,
                    0x0C => RAMBankSelection::DayHigh,
                    _ => return,
                };
            }
            LATCH_CLOCK_DATA_BEGIN..=LATCH_CLOCK_DATA_END => {
                self.rtc_latch = match value {
                    0x00 => RTCLatchState::Pending,
                    0x01 if self.rtc_latch == RTCLatchState::Pending => {
                        self.rtc.latch();
                        RTCLatchState::Latched
                    }
                    _ => RTCLatchState::Undefined,
                };
            }
            CRAM_BANK_BEGIN..=CRAM_BANK_END => {
                if !self.ram_rtc_enabled {
                    return;
                }
                match self.ram_bank_selection {
                    RAMBankSelection::RAMBank(bank) if !self.ram.is_empty() => {
                        let offset = bank as usize * RAM_BANK_SIZE;
                        let index = (offset + (address - CRAM_BANK_BEGIN) as usize) % self.ram.len();
                        self.ram[index] = value;
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gb::cartridge::ControllerType;

    #[test]
    fn test_ram_state() {
        let config = CartridgeConfig::new(ControllerType::MBC3, 0x03, 0x02).unwrap();
        let mut ctrl = MBC3::new(config, Arc::new([0; ROM_BANK_SIZE * 16]));

        let addr = CRAM_BANK_BEGIN + 0x10;
        ctrl.write(addr, 0x42);
        assert_eq!(ctrl.read(addr), 0xFF, "RAM should be disabled");

        ctrl.write(RAM_RTC_ENABLE_BEGIN, 0x0A);
        assert_eq!(ctrl.read(addr), 0x00, "First write should have been ignored");

        ctrl.write(addr, 0x42);
        assert_eq!(ctrl.read(addr), 0x42, "RAM should be enabled");

        ctrl.write(RAM_RTC_ENABLE_BEGIN, 0xFF);
        assert_eq!(ctrl.read(addr), 0xFF, "RAM should be disabled");
    }

    #[test]
    fn test_rom_bank_bits() {
        let config = CartridgeConfig::new(ControllerType::MBC3, 0x06, 0x02).unwrap();
        let mut ctrl = MBC3::new(
            config,
            (0u8..128).flat_map(|i| vec![i; ROM_BANK_SIZE]).collect(),
        );

        ctrl.write(ROM_BANK_NUMBER_BEGIN, 0x55);
        assert_eq!(ctrl.read(ROM_HIGH_BANK_BEGIN), 0x55);

        ctrl.write(ROM_BANK_NUMBER_BEGIN, 0x00);
        assert_eq!(
            ctrl.read(ROM_HIGH_BANK_BEGIN),
            0x01,
            "Bank 0 should alias to bank 1"
        );

        ctrl.write(ROM_BANK_NUMBER_BEGIN, 0xFF);
        assert_eq!(
            ctrl.read(ROM_HIGH_BANK_BEGIN),
            0x7F,
            "Only the first 7 bits should be used"
        );
    }

    #[test]
    fn test_rtc_latch() {
        let config = CartridgeConfig::new(ControllerType::MBC3, 0x00, 0x02).unwrap();
        let mut ctrl = MBC3::new(config, Arc::new([0; ROM_BANK_SIZE * 2]));

        ctrl.write(RAM_RTC_ENABLE_BEGIN, 0x0A);
        ctrl.write(RAM_BANK_NUMBER_BEGIN, 0x08);
        assert_eq!(ctrl.read(CRAM_BANK_BEGIN), 0, "RTC should start unlatched");

        // Writing 0x00 arms the latch, writing 0x01 captures the wall clock
        ctrl.write(LATCH_CLOCK_DATA_BEGIN, 0x00);
        ctrl.write(LATCH_CLOCK_DATA_BEGIN, 0x01);

        ctrl.write(RAM_BANK_NUMBER_BEGIN, 0x08);
        let seconds = ctrl.read(CRAM_BANK_BEGIN);
        ctrl.write(RAM_BANK_NUMBER_BEGIN, 0x09);
        let minutes = ctrl.read(CRAM_BANK_BEGIN);
        ctrl.write(RAM_BANK_NUMBER_BEGIN, 0x0A);
        let hours = ctrl.read(CRAM_BANK_BEGIN);
        assert!(seconds < 60);
        assert!(minutes < 60);
        assert!(hours < 24);

        // The wall clock is decades past day 511, so the 9 bit day
        // counter has wrapped and latched its carry flag.
        ctrl.write(RAM_BANK_NUMBER_BEGIN, 0x0C);
        let day_high = ctrl.read(CRAM_BANK_BEGIN);
        assert!(
            DayHighRegister::from_bits_truncate(day_high)
                .contains(DayHighRegister::DAY_COUNTER_CARRY)
        );
    }

    #[test]
    fn test_ram_banking() {
        let config = CartridgeConfig::new(ControllerType::MBC3, 0x00, 0x03).unwrap();
        let mut ctrl = MBC3::new(config, Arc::new([0; ROM_BANK_SIZE * 2]));

        ctrl.write(RAM_RTC_ENABLE_BEGIN, 0x0A);

        for i in 0u8..4 {
            ctrl.write(RAM_BANK_NUMBER_BEGIN, i);
            assert_eq!(ctrl.ram_bank_selection, RAMBankSelection::RAMBank(i));
            assert_eq!(ctrl.read(CRAM_BANK_BEGIN), 0, "RAM should be initialized to 0");
            ctrl.write(CRAM_BANK_BEGIN, i + 1);
            assert_eq!(ctrl.read(CRAM_BANK_BEGIN), i + 1);
        }

        for i in 0u8..4 {
            ctrl.write(RAM_BANK_NUMBER_BEGIN, i);
            assert_eq!(ctrl.read(CRAM_BANK_BEGIN), i + 1);
        }
    }
}
