use crate::gb::Bus;
use crate::gb::cpu::{CPU, ImeState};
use crate::gb::interrupt::InterruptRegister;

const VBLANK_IRQ_ADDRESS: u16 = 0x0040;
const LCD_IRQ_ADDRESS: u16 = 0x0048;
const TIMER_IRQ_ADDRESS: u16 = 0x0050;
const SERIAL_IRQ_ADDRESS: u16 = 0x0058;
const JOYPAD_IRQ_ADDRESS: u16 = 0x0060;

/// Handles pending interrupt requests, called between instructions.
/// The lowest numbered pending interrupt wins and only one request
/// is dispatched per call.
pub fn handle<T: Bus>(cpu: &mut CPU, bus: &mut T) {
    if !bus.has_irq() {
        return;
    }

    // The CPU is always woken up from HALT if there is a pending interrupt
    cpu.is_halted = false;

    if cpu.ime != ImeState::Enabled {
        return;
    }

    let pending = bus.get_ie() & bus.get_if();
    for irq in [
        InterruptRegister::VBLANK,
        InterruptRegister::STAT,
        InterruptRegister::TIMER,
        InterruptRegister::SERIAL,
        InterruptRegister::JOYPAD,
    ] {
        if pending.contains(irq) {
            let mut int_flags = bus.get_if();
            int_flags.remove(irq);
            bus.set_if(int_flags);

            let address = match irq {
                InterruptRegister::VBLANK => VBLANK_IRQ_ADDRESS,
                InterruptRegister::STAT => LCD_IRQ_ADDRESS,
                InterruptRegister::TIMER => TIMER_IRQ_ADDRESS,
                InterruptRegister::SERIAL => SERIAL_IRQ_ADDRESS,
                InterruptRegister::JOYPAD => JOYPAD_IRQ_ADDRESS,
                _ => unreachable!(),
            };
            dispatch(cpu, bus, address);
            return;
        }
    }
}

/// Dispatches a single interrupt request, this takes 5 M-cycles in total:
/// 3 internal delay cycles plus the two stack writes.
#[inline]
fn dispatch<T: Bus>(cpu: &mut CPU, bus: &mut T, address: u16) {
    cpu.ime = ImeState::Disabled;
    bus.cycle();
    bus.cycle();
    bus.cycle();
    // Save the current execution address by pushing it onto the stack
    cpu.push(cpu.r.pc, bus);
    cpu.r.pc = address;
}
