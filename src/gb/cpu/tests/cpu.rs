use crate::gb::cpu::registers::FlagsRegister;
use crate::gb::cpu::tests::assert_flags;
use crate::gb::cpu::{CPU, ImeState};
use crate::gb::interrupt::InterruptRegister;
use crate::gb::tests::MockBus;
use crate::gb::{Bus, GBError};

#[test]
fn test_illegal_opcodes() {
    for opcode in [
        0xd3u8, 0xdb, 0xdd, 0xe3, 0xe4, 0xeb, 0xec, 0xed, 0xf4, 0xfc, 0xfd,
    ] {
        let mut bus = MockBus::new(vec![opcode]);
        let mut cpu = CPU::default();
        match cpu.step(&mut bus) {
            Err(GBError::IllegalOpcode { opcode: byte, pc }) => {
                assert_eq!(byte, opcode);
                assert_eq!(pc, 0);
            }
            _ => panic!("Opcode {opcode:#04x} should be illegal"),
        }
    }
}

#[test]
fn test_add_a_b_overflow() {
    // ADD A, B
    let mut bus = MockBus::new(vec![0x80]);
    let mut cpu = CPU::default();
    cpu.r.a = 0xFF;
    cpu.r.b = 0x01;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0x00);
    assert_eq!(cpu.r.pc, 1);
    assert_flags(cpu.r.f, true, false, true, true);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_add_a_hli_no_overflow() {
    // ADD A, (HL)
    let mut bus = MockBus::new(vec![0x86, 0x42]);
    let mut cpu = CPU::default();
    cpu.r.set_hl(0x01);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(cpu.r.a, 0x42);
    assert_flags(cpu.r.f, false, false, false, false);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_add_a_hli_overflow() {
    // ADD A, (HL)
    let mut bus = MockBus::new(vec![0x86, 0x02]);
    let mut cpu = CPU::default();
    cpu.r.a = 0xff;
    cpu.r.set_hl(0x01);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(cpu.r.a, 0x01);
    assert_flags(cpu.r.f, false, false, true, true);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_add_hl_de_no_overflow() {
    // ADD HL, DE
    let mut bus = MockBus::new(vec![0x19]);
    let mut cpu = CPU::default();
    cpu.r.set_hl(0x01);
    cpu.r.set_de(0x03);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(cpu.r.get_hl(), 0x04);
    assert_flags(cpu.r.f, false, false, false, false);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_add_hl_de_overflow() {
    // ADD HL, DE
    let mut bus = MockBus::new(vec![0x19]);
    let mut cpu = CPU::default();
    cpu.r.set_hl(0xFFFE);
    cpu.r.set_de(0x03);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(cpu.r.get_hl(), 0x0001);
    assert_flags(cpu.r.f, false, false, true, true);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_add_hl_keeps_zero_flag() {
    // ADD HL, DE
    let mut bus = MockBus::new(vec![0x19]);
    let mut cpu = CPU::default();
    cpu.r.f.insert(FlagsRegister::ZERO);
    cpu.r.set_hl(0x01);
    cpu.r.set_de(0x01);
    cpu.step(&mut bus).unwrap();
    assert_flags(cpu.r.f, true, false, false, false);
}

#[test]
fn test_add_sp_s8_overflow_inc() {
    // ADD SP, s8
    let mut bus = MockBus::new(vec![0xe8, 0x01]);
    let mut cpu = CPU::default();
    cpu.r.sp = 0xffff;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 2);
    assert_eq!(cpu.r.sp, 0x0000);
    assert_flags(cpu.r.f, false, false, true, true);
    assert_eq!(bus.cycles, 4);
}

#[test]
fn test_add_sp_s8_overflow_dec() {
    // ADD SP, s8
    let value = -1i8;
    let mut bus = MockBus::new(vec![0xe8, value as u8]);
    let mut cpu = CPU::default();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 2);
    assert_eq!(cpu.r.sp, 0xffff);
    assert_flags(cpu.r.f, false, false, false, false);
    assert_eq!(bus.cycles, 4);
}

#[test]
fn test_adc_a_e_carry_in() {
    // ADC A, E
    let mut bus = MockBus::new(vec![0x8b]);
    let mut cpu = CPU::default();
    cpu.r.a = 0b1111_0001;
    cpu.r.e = 0b0000_0001;
    cpu.r.f.insert(FlagsRegister::CARRY);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(cpu.r.a, 0b1111_0011);
    assert_flags(cpu.r.f, false, false, false, false);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_adc_a_d8() {
    // ADC A, d8
    let mut bus = MockBus::new(vec![0xce, 0x01]);
    let mut cpu = CPU::default();
    cpu.r.a = 0b1111_0001;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 2);
    assert_eq!(cpu.r.a, 0b1111_0010);
    assert_flags(cpu.r.f, false, false, false, false);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_and_a_b_non_zero() {
    // AND B
    let mut bus = MockBus::new(vec![0xa0]);
    let mut cpu = CPU::default();
    cpu.r.a = 0x02;
    cpu.r.b = 0xff;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0x02);
    assert_eq!(cpu.r.pc, 1);
    assert_flags(cpu.r.f, false, false, true, false);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_and_a_b_zero() {
    // AND B
    let mut bus = MockBus::new(vec![0xa0]);
    let mut cpu = CPU::default();
    cpu.r.a = 0x02;
    cpu.r.b = 0x04;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0x00);
    assert_eq!(cpu.r.pc, 1);
    assert_flags(cpu.r.f, true, false, true, false);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_bit_7_h_zero() {
    // BIT 7, H
    let mut bus = MockBus::new(vec![0xcb, 0x7c]);
    let mut cpu = CPU::default();
    cpu.r.h = 0b0111_1111;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 2);
    assert_flags(cpu.r.f, true, false, true, false);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_bit_7_h_non_zero() {
    // BIT 7, H
    let mut bus = MockBus::new(vec![0xcb, 0x7c]);
    let mut cpu = CPU::default();
    cpu.r.h = 0b1101_0000;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 2);
    assert_flags(cpu.r.f, false, false, true, false);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_bit_keeps_carry() {
    // BIT 0, A
    let mut bus = MockBus::new(vec![0xcb, 0x47]);
    let mut cpu = CPU::default();
    cpu.r.a = 0x01;
    cpu.r.f.insert(FlagsRegister::CARRY);
    cpu.step(&mut bus).unwrap();
    assert_flags(cpu.r.f, false, false, true, true);
}

#[test]
fn test_call_a16() {
    // CALL a16
    let mut bus = MockBus::new(vec![0xcd, 0x11, 0x22, 0x33, 0x44]);
    let mut cpu = CPU::default();
    cpu.r.sp = 0x0003;
    cpu.step(&mut bus).unwrap();
    assert_eq!(bus.cycle_read(0x02), 0x00);
    assert_eq!(bus.cycle_read(0x01), 0x03);
    assert_eq!(cpu.r.pc, 0x2211);
    assert_eq!(cpu.r.sp, 0x01);
    assert_eq!(bus.cycles, 8);
}

#[test]
fn test_call_c_a16_no_jump() {
    // CALL C, a16
    let mut bus = MockBus::new(vec![0xdc, 0x11, 0x22]);
    let mut cpu = CPU::default();
    cpu.r.f.remove(FlagsRegister::CARRY);
    cpu.r.sp = 0x03;
    cpu.step(&mut bus).unwrap();
    assert_eq!(bus.cycle_read(0x02), 0x22);
    assert_eq!(bus.cycle_read(0x01), 0x11);
    assert_eq!(cpu.r.pc, 0x03);
    assert_eq!(cpu.r.sp, 0x03);
    assert_eq!(bus.cycles, 5);
}

#[test]
fn test_ccf() {
    // CCF
    let mut bus = MockBus::new(vec![0x3f, 0x3f]);
    let mut cpu = CPU::default();
    cpu.step(&mut bus).unwrap();
    assert_flags(cpu.r.f, false, false, false, true);
    cpu.step(&mut bus).unwrap();
    assert_flags(cpu.r.f, false, false, false, false);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_cp_b() {
    // CP B
    let mut bus = MockBus::new(vec![0xb8]);
    let mut cpu = CPU::default();
    cpu.r.a = 0x02;
    cpu.r.b = 0x01;
    cpu.step(&mut bus).unwrap();
    assert_flags(cpu.r.f, false, true, false, false);
    assert_eq!(cpu.r.a, 0x02, "CP should not modify A");
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_cpl() {
    // CPL
    let mut bus = MockBus::new(vec![0x2f]);
    let mut cpu = CPU::default();
    cpu.r.a = 0b1101_0011;
    cpu.step(&mut bus).unwrap();
    assert_flags(cpu.r.f, false, true, true, false);
    assert_eq!(cpu.r.a, 0b0010_1100);
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_daa_sub_carry() {
    // DAA
    let mut bus = MockBus::new(vec![0x27]);
    let mut cpu = CPU::default();
    cpu.r.a = 0x44;
    cpu.r.f.insert(FlagsRegister::SUBTRACTION);
    cpu.r.f.insert(FlagsRegister::CARRY);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0xe4);
    assert_eq!(cpu.r.pc, 1);
    assert_flags(cpu.r.f, false, true, false, true);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_daa_sub_half_carry() {
    // DAA
    let mut bus = MockBus::new(vec![0x27]);
    let mut cpu = CPU::default();
    cpu.r.a = 0x44;
    cpu.r.f.insert(FlagsRegister::SUBTRACTION);
    cpu.r.f.insert(FlagsRegister::HALF_CARRY);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0x3e);
    assert_eq!(cpu.r.pc, 1);
    assert_flags(cpu.r.f, false, true, false, false);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_daa_non_sub_carry() {
    // DAA
    let mut bus = MockBus::new(vec![0x27]);
    let mut cpu = CPU::default();
    cpu.r.a = 0x44;
    cpu.r.f.insert(FlagsRegister::CARRY);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0xa4);
    assert_eq!(cpu.r.pc, 1);
    assert_flags(cpu.r.f, false, false, false, true);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_daa_non_sub_0xd1() {
    // DAA
    let mut bus = MockBus::new(vec![0x27]);
    let mut cpu = CPU::default();
    cpu.r.a = 0b1101_0001;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0x31, "(0xd1 + 0x60) % 256 should be 0x31");
    assert_eq!(cpu.r.pc, 1);
    assert_flags(cpu.r.f, false, false, false, true);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_daa_non_sub_0x0f() {
    // DAA
    let mut bus = MockBus::new(vec![0x27]);
    let mut cpu = CPU::default();
    cpu.r.a = 0b0000_1111;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0x15, "(0x0f + 0x06) % 256 should be 0x15");
    assert_eq!(cpu.r.pc, 1);
    assert_flags(cpu.r.f, false, false, false, false);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_daa_zero() {
    // DAA
    let mut bus = MockBus::new(vec![0x27]);
    let mut cpu = CPU::default();
    cpu.r.a = 0x00;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0x00);
    assert_eq!(cpu.r.pc, 1);
    assert_flags(cpu.r.f, true, false, false, false);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_di() {
    // DI
    let mut bus = MockBus::new(vec![0xf3]);
    let mut cpu = CPU {
        ime: ImeState::Enabled,
        ..Default::default()
    };
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.ime, ImeState::Disabled);
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_dec_b_no_underflow() {
    // DEC B
    let mut bus = MockBus::new(vec![0x05]);
    let mut cpu = CPU::default();
    cpu.r.b = 0x02;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(cpu.r.b, 0x1);
    assert_flags(cpu.r.f, false, true, false, false);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_dec_b_underflow() {
    // DEC B
    let mut bus = MockBus::new(vec![0x05]);
    let mut cpu = CPU::default();
    cpu.r.b = 0x00;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(cpu.r.b, 0xff);
    assert_flags(cpu.r.f, false, true, true, false);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_dec_b_zero() {
    // DEC B
    let mut bus = MockBus::new(vec![0x05]);
    let mut cpu = CPU::default();
    cpu.r.b = 0x01;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(cpu.r.b, 0x00);
    assert_flags(cpu.r.f, true, true, false, false);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_dec_bc_word() {
    // DEC BC
    let mut bus = MockBus::new(vec![0x0b]);
    let mut cpu = CPU::default();
    cpu.r.set_bc(0x42);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.get_bc(), 0x41);
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_ei_delay() {
    // EI takes effect after the next instruction
    let mut bus = MockBus::new(vec![0xfb, 0x00]);
    let mut cpu = CPU::default();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.ime, ImeState::Pending);
    assert_eq!(cpu.r.pc, 1);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.ime, ImeState::Enabled);
    assert_eq!(cpu.r.pc, 2);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_ei_di_rapid() {
    // Rapid EI/DI should not enable interrupt handling
    let mut bus = MockBus::new(vec![0xfb, 0xf3]);
    bus.set_ie(InterruptRegister::VBLANK);
    bus.set_if(InterruptRegister::VBLANK);
    let mut cpu = CPU::default();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.ime, ImeState::Pending);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.ime, ImeState::Disabled);
    assert_eq!(cpu.r.pc, 2);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_ei_sequence() {
    // A second EI doesn't extend the delay
    let mut bus = MockBus::new(vec![0xfb, 0xfb]);
    let mut cpu = CPU::default();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.ime, ImeState::Pending);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.ime, ImeState::Enabled);
}

#[test]
fn test_halt() {
    // HALT
    let mut bus = MockBus::new(vec![0x76, 0x00]);
    let mut cpu = CPU::default();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 1);
    assert!(cpu.is_halted);

    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 1, "A halted CPU should not advance");
    assert!(cpu.is_halted);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_halt_wakes_without_ime() {
    // HALT resumes on a pending interrupt even with IME disabled
    let mut bus = MockBus::new(vec![0x76, 0x04, 0x00]);
    let mut cpu = CPU::default();
    cpu.step(&mut bus).unwrap();
    assert!(cpu.is_halted);

    bus.set_ie(InterruptRegister::VBLANK);
    bus.set_if(InterruptRegister::VBLANK);
    cpu.step(&mut bus).unwrap();
    assert!(!cpu.is_halted, "CPU should wake up on the pending IRQ");
    assert_eq!(cpu.r.pc, 1, "The wake-up consumes one machine cycle");

    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.b, 0x01, "INC B should execute after the wake-up");
}

#[test]
fn test_halt_bug() {
    // Entering HALT with IME disabled and a pending interrupt suppresses
    // one PC increment:
    // ADDR DATA     INSTRUCTIONS
    // 0000 76       halt
    // 0001 06 04    ld B,4
    //
    // The byte 0x06 is read twice, so the CPU sees this stream instead:
    // 0001 06 06    ld B,6
    // 0002 04       inc B
    let mut bus = MockBus::new(vec![0x76, 0x06, 0x04]);
    bus.set_ie(InterruptRegister::VBLANK);
    bus.set_if(InterruptRegister::VBLANK);

    let mut cpu = CPU::default();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 1);
    assert!(!cpu.is_halted, "The halt should be skipped");

    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 2);
    assert_eq!(cpu.r.b, 0x06, "B should be 6");

    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 3);
    assert_eq!(cpu.r.b, 0x07, "B should be 7");
}

#[test]
fn test_inc_b_no_overflow() {
    // INC B
    let mut bus = MockBus::new(vec![0x04]);
    let mut cpu = CPU::default();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(cpu.r.b, 0x01);
    assert_flags(cpu.r.f, false, false, false, false);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_inc_b_overflow() {
    // INC B
    let mut bus = MockBus::new(vec![0x04]);
    let mut cpu = CPU::default();
    cpu.r.b = 0b1111_1111;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(cpu.r.b, 0b0000_0000);
    assert_flags(cpu.r.f, true, false, true, false);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_inc_b_half_carry() {
    // INC B
    let mut bus = MockBus::new(vec![0x04]);
    let mut cpu = CPU::default();
    cpu.r.b = 0b0000_1111;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(cpu.r.b, 0b0001_0000);
    assert_flags(cpu.r.f, false, false, true, false);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_inc_de() {
    // INC DE
    let mut bus = MockBus::new(vec![0x13]);
    let mut cpu = CPU::default();
    cpu.r.set_de(0x01);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.get_de(), 0x02);
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_inc_hli() {
    // INC (HL)
    let mut bus = MockBus::new(vec![0x34, 0x03]);
    let mut cpu = CPU::default();
    cpu.r.set_hl(0x01);
    cpu.step(&mut bus).unwrap();
    assert_eq!(bus.cycle_read(0x01), 0x04);
    assert_eq!(cpu.r.pc, 1);
    assert_flags(cpu.r.f, false, false, false, false);
    assert_eq!(bus.cycles, 4);
}

#[test]
fn test_jr_s8_neg_offset() {
    // JR s8
    let mut bus = MockBus::new(vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x18, 251]);
    let mut cpu = CPU::default();
    for _ in 0..6 {
        cpu.step(&mut bus).unwrap();
    }
    // At this point 7 bytes have been consumed,
    // pc must be 7 - 5 (offset)
    assert_eq!(cpu.r.pc, 0x02);
    assert_eq!(bus.cycles, 8);
}

#[test]
fn test_jr_s8_pos_offset() {
    // JR s8
    let mut bus = MockBus::new(vec![0x18, 0x03]);
    let mut cpu = CPU::default();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 0x05);
    assert_eq!(bus.cycles, 3);
}

#[test]
fn test_jr_nz_s8_no_jump() {
    // JR NZ, s8
    let mut bus = MockBus::new(vec![0x20, 0x03]);
    let mut cpu = CPU::default();
    cpu.r.f.insert(FlagsRegister::ZERO);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 2);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_jp_a16() {
    // JP a16
    let mut bus = MockBus::new(vec![0xc3, 0x01, 0x02]);
    let mut cpu = CPU::default();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 0x0201);
    assert_eq!(bus.cycles, 4);
}

#[test]
fn test_jp_nc_no_jump() {
    // JP NC, a16
    let mut bus = MockBus::new(vec![0xd2, 0x01, 0x02]);
    let mut cpu = CPU::default();
    cpu.r.f.insert(FlagsRegister::CARRY);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 3);
    assert_eq!(bus.cycles, 3);
}

#[test]
fn test_jp_hl() {
    // JP HL
    let mut bus = MockBus::new(vec![0xe9]);
    let mut cpu = CPU::default();
    cpu.r.set_hl(0x1234);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 0x1234);
    assert_eq!(bus.cycles, 1, "JP HL has no internal delay");
}

#[test]
fn test_ld_c_a() {
    // LD C, A
    let mut bus = MockBus::new(vec![0x4f]);
    let mut cpu = CPU::default();
    cpu.r.a = 0x42;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.c, 0x42);
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_ld_bc_d16() {
    // LD BC, d16
    let mut bus = MockBus::new(vec![0x01, 0x42, 0x00]);
    let mut cpu = CPU::default();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.get_bc(), 0x0042);
    assert_eq!(cpu.r.pc, 3);
    assert_eq!(bus.cycles, 3);
}

#[test]
fn test_ld_sp_hl() {
    // LD SP, HL
    let mut bus = MockBus::new(vec![0xf9]);
    let mut cpu = CPU::default();
    cpu.r.set_hl(0xbeef);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.sp, 0xbeef);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_ld_a_a16() {
    // LD A, (a16)
    let mut bus = MockBus::new(vec![0xFA, 0x05, 0x00, 0x01, 0x02, 0x03]);
    let mut cpu = CPU::default();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0x03);
    assert_eq!(cpu.r.pc, 3);
    assert_eq!(bus.cycles, 4);
}

#[test]
fn test_ld_hli_d8() {
    // LD (HL), d8
    let mut bus = MockBus::new(vec![0x36, 0x42, 0x00]);
    let mut cpu = CPU::default();
    cpu.r.set_hl(0x02);
    cpu.step(&mut bus).unwrap();
    assert_eq!(bus.cycle_read(0x02), 0x42);
    assert_eq!(cpu.r.pc, 2);
    assert_eq!(bus.cycles, 4);
}

#[test]
fn test_ld_hl_plus_a() {
    // LD (HL+), A
    let mut bus = MockBus::new(vec![0x22, 0x00, 0x11]);
    let mut cpu = CPU::default();
    cpu.r.set_hl(0x02);
    cpu.r.a = 0x42;
    cpu.step(&mut bus).unwrap();
    assert_eq!(bus.cycle_read(0x02), 0x42);
    assert_eq!(cpu.r.get_hl(), 0x03);
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(bus.cycles, 3);
}

#[test]
fn test_ld_hl_minus_a() {
    // LD (HL-), A
    let mut bus = MockBus::new(vec![0x32, 0x00, 0x11]);
    let mut cpu = CPU::default();
    cpu.r.set_hl(0x02);
    cpu.r.a = 0x42;
    cpu.step(&mut bus).unwrap();
    assert_eq!(bus.cycle_read(0x02), 0x42);
    assert_eq!(cpu.r.get_hl(), 0x01);
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(bus.cycles, 3);
}

#[test]
fn test_ld_a16_a() {
    // LD (a16), A
    let mut bus = MockBus::new(vec![0xea, 0x05, 0x00, 0x00, 0x00, 0x00]);
    let mut cpu = CPU::default();
    cpu.r.a = 0x42;
    cpu.step(&mut bus).unwrap();
    assert_eq!(bus.cycle_read(0x0005), 0x42);
    assert_eq!(cpu.r.pc, 3);
    assert_eq!(bus.cycles, 5);
}

#[test]
fn test_ld_a_hl_plus() {
    // LD A, (HL+)
    let mut bus = MockBus::new(vec![0x2a, 0x00, 0x11]);
    let mut cpu = CPU::default();
    cpu.r.set_hl(0x02);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0x11);
    assert_eq!(cpu.r.get_hl(), 0x03);
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_ld_a_hl_minus() {
    // LD A, (HL-)
    let mut bus = MockBus::new(vec![0x3a, 0x00, 0x11]);
    let mut cpu = CPU::default();
    cpu.r.set_hl(0x02);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0x11);
    assert_eq!(cpu.r.get_hl(), 0x01);
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_ld_a16_sp() {
    // LD (a16), SP
    let mut bus = MockBus::new(vec![0x08, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00]);
    let mut cpu = CPU::default();
    cpu.r.sp = 0xdead;
    cpu.step(&mut bus).unwrap();
    assert_eq!(bus.cycle_read(0x0005), 0xad);
    assert_eq!(bus.cycle_read(0x0006), 0xde);
    assert_eq!(cpu.r.pc, 3);
    assert_eq!(bus.cycles, 7);
}

#[test]
fn test_ld_hl_sp_s8_pos() {
    // LD HL, SP+s8
    let mut bus = MockBus::new(vec![0xf8, 0x01]);
    let mut cpu = CPU::default();
    cpu.r.sp = 0x0001;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.sp, 0x0001);
    assert_eq!(cpu.r.get_hl(), 0x0002);
    assert_eq!(cpu.r.pc, 2);
    assert_eq!(bus.cycles, 3);
}

#[test]
fn test_ld_hl_sp_s8_neg() {
    // LD HL, SP+s8
    let value = -1i8;
    let mut bus = MockBus::new(vec![0xf8, value as u8]);
    let mut cpu = CPU::default();
    cpu.r.sp = 0x0009;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.sp, 0x0009);
    assert_eq!(cpu.r.get_hl(), 0x0008);
    assert_eq!(cpu.r.pc, 2);
    assert_eq!(bus.cycles, 3);
}

#[test]
fn test_nop() {
    // NOP
    let mut bus = MockBus::new(vec![0x00]);
    let mut cpu = CPU::default();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_or_a_c_non_zero() {
    // OR C
    let mut bus = MockBus::new(vec![0xb1]);
    let mut cpu = CPU::default();
    cpu.r.a = 0x01;
    cpu.r.c = 0x03;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0x03);
    assert_flags(cpu.r.f, false, false, false, false);
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_or_a_c_zero() {
    // OR C
    let mut bus = MockBus::new(vec![0xb1]);
    let mut cpu = CPU::default();
    cpu.step(&mut bus).unwrap();
    assert_flags(cpu.r.f, true, false, false, false);
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_res_4_l() {
    // RES 4, L
    let mut bus = MockBus::new(vec![0xcb, 0xa5]);
    let mut cpu = CPU::default();
    cpu.r.l = 0b1111_1111;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.l, 0b1110_1111);
    assert_eq!(cpu.r.pc, 2);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_ret() {
    // RET
    let mut bus = MockBus::new(vec![0xc9, 0x22, 0x33]);
    let mut cpu = CPU::default();
    cpu.r.sp = 0x0001;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 0x3322);
    assert_eq!(cpu.r.sp, 0x0003);
    assert_eq!(bus.cycles, 4);
}

#[test]
fn test_ret_z_jump() {
    // RET Z
    let mut bus = MockBus::new(vec![0xc8, 0x00, 0x22, 0x33]);
    let mut cpu = CPU::default();
    cpu.r.f.insert(FlagsRegister::ZERO);
    cpu.r.sp = 0x0002;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 0x3322);
    assert_eq!(cpu.r.sp, 0x0004);
    assert_eq!(bus.cycles, 5);
}

#[test]
fn test_ret_z_no_jump() {
    // RET Z
    let mut bus = MockBus::new(vec![0xc8, 0x00, 0x22, 0x33]);
    let mut cpu = CPU::default();
    cpu.r.f.remove(FlagsRegister::ZERO);
    cpu.r.sp = 0x0002;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(cpu.r.sp, 0x0002);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_reti() {
    // RETI
    let mut bus = MockBus::new(vec![0xd9, 0x34, 0x12]);
    let mut cpu = CPU::default();
    cpu.r.sp = 0x0001;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.ime, ImeState::Enabled);
    assert_eq!(cpu.r.pc, 0x1234);
    assert_eq!(bus.cycles, 4);
}

#[test]
fn test_rlca() {
    // RLCA
    let mut bus = MockBus::new(vec![0x07]);
    let mut cpu = CPU::default();
    cpu.r.a = 0b1011_0110;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0b0110_1101);
    assert_eq!(cpu.r.pc, 1);
    assert_flags(cpu.r.f, false, false, false, true);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_rr_c_non_zero() {
    // RR C
    let mut bus = MockBus::new(vec![0xcb, 0x19]);
    let mut cpu = CPU::default();
    cpu.r.c = 0b0110_0011;
    cpu.r.f.insert(FlagsRegister::CARRY);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.c, 0b1011_0001);
    assert_eq!(cpu.r.pc, 2);
    assert_flags(cpu.r.f, false, false, false, true);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_rr_c_zero() {
    // RR C
    let mut bus = MockBus::new(vec![0xcb, 0x19]);
    let mut cpu = CPU::default();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.c, 0x00);
    assert_eq!(cpu.r.pc, 2);
    assert_flags(cpu.r.f, true, false, false, false);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_rl_e_carry_in() {
    // RL E
    let mut bus = MockBus::new(vec![0xcb, 0x13]);
    let mut cpu = CPU::default();
    cpu.r.e = 0b0110_0011;
    cpu.r.f.insert(FlagsRegister::CARRY);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.e, 0b1100_0111);
    assert_eq!(cpu.r.pc, 2);
    assert_flags(cpu.r.f, false, false, false, false);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_rla_clears_zero() {
    // RLA always reports a non-zero result
    let mut bus = MockBus::new(vec![0x17]);
    let mut cpu = CPU::default();
    cpu.r.a = 0b1000_0000;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0);
    assert_flags(cpu.r.f, false, false, false, true);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_rlc_d() {
    // RLC D
    let mut bus = MockBus::new(vec![0xcb, 0x02]);
    let mut cpu = CPU::default();
    cpu.r.d = 0b0110_0011;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.d, 0b1100_0110);
    assert_eq!(cpu.r.pc, 2);
    assert_flags(cpu.r.f, false, false, false, false);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_rra() {
    // RRA
    let mut bus = MockBus::new(vec![0x1F]);
    let mut cpu = CPU::default();
    cpu.r.a = 0b0110_0011;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0b0011_0001);
    assert_eq!(cpu.r.pc, 1);
    assert_flags(cpu.r.f, false, false, false, true);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_rrc_l() {
    // RRC L
    let mut bus = MockBus::new(vec![0xcb, 0x0d]);
    let mut cpu = CPU::default();
    cpu.r.l = 0b0110_0011;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.l, 0b1011_0001);
    assert_eq!(cpu.r.pc, 2);
    assert_flags(cpu.r.f, false, false, false, true);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_rrca() {
    // RRCA
    let mut bus = MockBus::new(vec![0x0f]);
    let mut cpu = CPU::default();
    cpu.r.a = 0b0110_0011;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0b1011_0001);
    assert_eq!(cpu.r.pc, 1);
    assert_flags(cpu.r.f, false, false, false, true);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_rst_00h() {
    // Expected execution:
    // op: 0x00 -> NOP - 1 cycle
    // op: 0xC7 -> RST 00h - 4 cycles
    // op: 0x04 -> INC B - 1 cycle
    // op: 0xC9 -> RET - 4 cycles
    // op: 0x0C -> INC C - 1 cycle
    let mut bus = MockBus::new(vec![0x04, 0xc9, 0x00, 0xC7, 0x0C, 0x00, 0x00, 0x00]);
    let mut cpu = CPU::default();

    cpu.r.pc = 0x02;
    cpu.r.sp = 0x07;

    for _ in 0..5 {
        cpu.step(&mut bus).unwrap();
    }
    assert_eq!(cpu.r.b, 0x01);
    assert_eq!(cpu.r.c, 0x01);
    assert_eq!(cpu.r.pc, 0x05);
    assert_eq!(bus.cycles, 11);
}

#[test]
fn test_sbc_a_d8_carry_in() {
    // SBC A, d8
    let mut bus = MockBus::new(vec![0xde, 0x04]);
    let mut cpu = CPU::default();
    cpu.r.a = 0b0000_0001;
    cpu.r.f.insert(FlagsRegister::CARRY);
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0b1111_1100);
    assert_eq!(cpu.r.pc, 2);
    assert_flags(cpu.r.f, false, true, true, true);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_sbc_a_d8_no_carry_in() {
    // SBC A, d8
    let mut bus = MockBus::new(vec![0xde, 0x04]);
    let mut cpu = CPU::default();
    cpu.r.a = 0b0001_0000;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0b0000_1100);
    assert_eq!(cpu.r.pc, 2);
    assert_flags(cpu.r.f, false, true, true, false);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_scf() {
    // SCF
    let mut bus = MockBus::new(vec![0x37]);
    let mut cpu = CPU::default();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 1);
    assert_flags(cpu.r.f, false, false, false, true);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_set_7_hli() {
    // SET 7, (HL)
    let mut bus = MockBus::new(vec![0xcb, 0xfe, 0b0000_0010]);
    let mut cpu = CPU::default();
    cpu.r.set_hl(0x02);
    cpu.step(&mut bus).unwrap();
    assert_eq!(bus.cycle_read(0x02), 0b1000_0010);
    assert_eq!(cpu.r.pc, 2);
    assert_eq!(bus.cycles, 5);
}

#[test]
fn test_sla_a() {
    // SLA A
    let mut bus = MockBus::new(vec![0xcb, 0x27]);
    let mut cpu = CPU::default();
    cpu.r.a = 0b0110_0011;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0b1100_0110);
    assert_eq!(cpu.r.pc, 2);
    assert_flags(cpu.r.f, false, false, false, false);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_sra_e_keeps_msb() {
    // SRA E
    let mut bus = MockBus::new(vec![0xcb, 0x2b]);
    let mut cpu = CPU::default();
    cpu.r.e = 0b1110_0011;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.e, 0b1111_0001);
    assert_eq!(cpu.r.pc, 2);
    assert_flags(cpu.r.f, false, false, false, true);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_srl_b() {
    // SRL B
    let mut bus = MockBus::new(vec![0xcb, 0x38]);
    let mut cpu = CPU::default();
    cpu.r.b = 0b0110_0011;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.b, 0b0011_0001);
    assert_eq!(cpu.r.pc, 2);
    assert_flags(cpu.r.f, false, false, false, true);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_stop() {
    // STOP behaves like HALT on the DMG
    let mut bus = MockBus::new(vec![0x10, 0x00]);
    let mut cpu = CPU::default();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.pc, 1);
    assert!(cpu.is_halted);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_sub_h_non_zero() {
    // SUB H
    let mut bus = MockBus::new(vec![0x94]);
    let mut cpu = CPU::default();
    cpu.r.a = 0x02;
    cpu.r.h = 0x01;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0x01);
    assert_eq!(cpu.r.pc, 1);
    assert_flags(cpu.r.f, false, true, false, false);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_sub_h_zero() {
    // SUB H
    let mut bus = MockBus::new(vec![0x94]);
    let mut cpu = CPU::default();
    cpu.r.a = 0x02;
    cpu.r.h = 0x02;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0x00);
    assert_eq!(cpu.r.pc, 1);
    assert_flags(cpu.r.f, true, true, false, false);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_swap_a_non_zero() {
    // SWAP A
    let mut bus = MockBus::new(vec![0xcb, 0x37]);
    let mut cpu = CPU::default();
    cpu.r.a = 0b1011_1010;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0b1010_1011);
    assert_eq!(cpu.r.pc, 2);
    assert_flags(cpu.r.f, false, false, false, false);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_swap_a_zero() {
    // SWAP A
    let mut bus = MockBus::new(vec![0xcb, 0x37]);
    let mut cpu = CPU::default();
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0);
    assert_eq!(cpu.r.pc, 2);
    assert_flags(cpu.r.f, true, false, false, false);
    assert_eq!(bus.cycles, 2);
}

#[test]
fn test_pop_hl() {
    // POP HL
    let mut bus = MockBus::new(vec![0xe1, 0x11, 0x22]);
    let mut cpu = CPU::default();
    cpu.r.sp = 0x0001;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.get_hl(), 0x2211);
    assert_eq!(cpu.r.sp, 0x0003);
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(bus.cycles, 3);
}

#[test]
fn test_pop_af_masks_low_nibble() {
    // POP AF
    let mut bus = MockBus::new(vec![0xf1, 0xff, 0x22]);
    let mut cpu = CPU::default();
    cpu.r.sp = 0x0001;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.get_af(), 0x22F0);
    assert_eq!(bus.cycles, 3);
}

#[test]
fn test_push_af() {
    // PUSH AF
    let mut bus = MockBus::new(vec![0xf5, 0x00, 0x00, 0x00]);
    let mut cpu = CPU::default();
    cpu.r.set_af(0xff);
    cpu.r.sp = 0x03;
    cpu.step(&mut bus).unwrap();
    assert_eq!(bus.cycle_read(0x01), 0xf0);
    assert_eq!(bus.cycle_read(0x02), 0x00);
    assert_eq!(cpu.r.pc, 1);
    assert_eq!(bus.cycles, 6);
}

#[test]
fn test_xor_a_c_non_zero() {
    // XOR C
    let mut bus = MockBus::new(vec![0xa9]);
    let mut cpu = CPU::default();
    cpu.r.a = 0x42;
    cpu.r.c = 0x90;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0xd2);
    assert_eq!(cpu.r.pc, 1);
    assert_flags(cpu.r.f, false, false, false, false);
    assert_eq!(bus.cycles, 1);
}

#[test]
fn test_xor_a_c_zero() {
    // XOR C
    let mut bus = MockBus::new(vec![0xa9]);
    let mut cpu = CPU::default();
    cpu.r.a = 0x90;
    cpu.r.c = 0x90;
    cpu.step(&mut bus).unwrap();
    assert_eq!(cpu.r.a, 0x00);
    assert_eq!(cpu.r.pc, 1);
    assert_flags(cpu.r.f, true, false, false, false);
    assert_eq!(bus.cycles, 1);
}
