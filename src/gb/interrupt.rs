bitflags! {
    /// Represents interrupt registers IE at 0xFFFF and IF at 0xFF0F.
    /// Components that can raise an interrupt get a `&mut InterruptRegister`
    /// to the pending flags and insert their bit.
    #[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
    pub struct InterruptRegister: u8 {
        const VBLANK = 0b00000001; // V-Blank Interrupt
        const STAT   = 0b00000010; // LCD STAT Interrupt
        const TIMER  = 0b00000100; // Timer Overflow Interrupt
        const SERIAL = 0b00001000; // Serial Transfer Completion Interrupt
        const JOYPAD = 0b00010000; // Joypad Input Interrupt
    }
}
