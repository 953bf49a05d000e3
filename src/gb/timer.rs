use crate::gb::SubSystem;
use crate::gb::constants::*;
use crate::gb::interrupt::InterruptRegister;

bitflags! {
    /// Represents the timer control register (TAC) at 0xFF07.
    /// The two mode bits select which bit of the internal divider
    /// drives the TIMA increments.
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct TimerControl: u8 {
        const MODE_LOW  = 0b0000_0001;
        const MODE_HIGH = 0b0000_0010;
        const ENABLED   = 0b0000_0100;
    }
}

impl TimerControl {
    #[inline]
    pub const fn is_enabled(&self) -> bool {
        self.contains(TimerControl::ENABLED)
    }

    /// Returns the divider bit that is watched for falling edges.
    #[inline]
    pub const fn divider_bit(&self) -> u16 {
        match self.bits() & 0b11 {
            0b00 => 9,
            0b01 => 3,
            0b10 => 5,
            _ => 7,
        }
    }
}

/// Implements DIV/TIMA/TMA/TAC on top of a single internal 16 bit counter
/// that increments every T-cycle. DIV is the upper byte of that counter,
/// TIMA increments whenever the TAC-selected counter bit falls from 1 to 0.
/// A TIMA overflow reloads TMA and raises the interrupt 4 T-cycles late.
#[derive(Clone, Default)]
pub struct Timer {
    pub divider: u16,
    pub counter: u8,
    pub modulo: u8,
    pub control: TimerControl,
    overflow_delay: u8,
    just_reloaded: bool,
}

impl Timer {
    /// Advances the timer by one M-cycle (4 T-cycles).
    pub fn step(&mut self, int_reg: &mut InterruptRegister) {
        self.just_reloaded = false;
        for _ in 0..4 {
            self.tick(int_reg);
        }
    }

    /// Advances the timer by one T-cycle.
    fn tick(&mut self, int_reg: &mut InterruptRegister) {
        if self.overflow_delay > 0 {
            self.overflow_delay -= 1;
            if self.overflow_delay == 0 {
                self.counter = self.modulo;
                self.just_reloaded = true;
                int_reg.insert(InterruptRegister::TIMER);
            }
        }

        let previous = self.selected_bit();
        self.divider = self.divider.wrapping_add(1);
        if self.control.is_enabled() && previous && !self.selected_bit() {
            self.increment_counter();
        }
    }

    #[inline]
    fn selected_bit(&self) -> bool {
        self.divider >> self.control.divider_bit() & 1 != 0
    }

    fn increment_counter(&mut self) {
        self.counter = self.counter.wrapping_add(1);
        if self.counter == 0 {
            // The reload from TMA and the interrupt happen 4 T-cycles later,
            // until then TIMA reads as 0.
            self.overflow_delay = 4;
        }
    }

    /// The level feeding the TIMA increment logic.
    #[inline]
    fn edge_input(&self) -> bool {
        self.control.is_enabled() && self.selected_bit()
    }

    /// The falling-edge rule also applies to divider resets and control
    /// rewrites: if the edge input was 1 and the change pulls it to 0,
    /// TIMA sees a spurious increment.
    fn check_falling_edge(&mut self, previous: bool) {
        if previous && !self.edge_input() {
            self.increment_counter();
        }
    }
}

impl SubSystem for Timer {
    fn write(&mut self, address: u16, value: u8) {
        match address {
            // Whenever a ROM writes to this register it resets to 0
            TIMER_DIVIDER => {
                let previous = self.edge_input();
                self.divider = 0;
                self.check_falling_edge(previous);
            }
            TIMER_COUNTER => {
                // A write during the reload cycle is ignored, a write during
                // the delay period cancels the pending reload.
                if !self.just_reloaded {
                    self.counter = value;
                    self.overflow_delay = 0;
                }
            }
            TIMER_MODULO => {
                self.modulo = value;
                if self.just_reloaded {
                    self.counter = value;
                }
            }
            TIMER_CTRL => {
                let previous = self.edge_input();
                self.control = TimerControl::from_bits_truncate(value);
                self.check_falling_edge(previous);
            }
            _ => panic!("Attempt to write to unmapped timer register: {address:#06x}"),
        }
    }

    fn read(&mut self, address: u16) -> u8 {
        match address {
            TIMER_DIVIDER => (self.divider >> 8) as u8,
            TIMER_COUNTER => self.counter,
            TIMER_MODULO => self.modulo,
            // Undocumented bits should be 1
            TIMER_CTRL => self.control.bits() | 0b1111_1000,
            _ => panic!("Attempt to read from unmapped timer register: {address:#06x}"),
        }
    }
}
