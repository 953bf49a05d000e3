pub mod channel;

use crate::gb::apu::channel::{AudioTimer, Channel};
use crate::gb::constants::{AUDIO_REGISTERS_END, AUDIO_REGISTERS_START, UNDEFINED_READ};
use crate::gb::{CPU_CLOCK_SPEED, SubSystem, utils};

/// This register controls CH1's period sweep functionality (NR10).
pub const AUDIO_CHANNEL_1_SWEEP: u16 = 0xFF10;

/// This register controls both the channel's length timer and duty cycle
/// (the ratio of the time spent low vs. high) (NR11).
pub const AUDIO_CHANNEL_1_LENGTH: u16 = 0xFF11;

/// This register controls the digital amplitude of the "high" part of the
/// pulse, and the envelope applied to that setting (NR12).
pub const AUDIO_CHANNEL_1_VOLUME: u16 = 0xFF12;

/// This register stores the low 8 bits of the channel's 11-bit frequency.
/// The upper 3 bits are stored in the low 3 bits of NR14.
pub const AUDIO_CHANNEL_1_PERIOD_LOW: u16 = 0xFF13;

pub const AUDIO_CHANNEL_1_PERIOD_HIGH: u16 = 0xFF14;

/// This sound channel works exactly like channel 1,
/// except that it lacks the period sweep.
pub const AUDIO_CHANNEL_2_LENGTH: u16 = 0xFF16;
pub const AUDIO_CHANNEL_2_VOLUME: u16 = 0xFF17;
pub const AUDIO_CHANNEL_2_PERIOD_LOW: u16 = 0xFF18;
pub const AUDIO_CHANNEL_2_PERIOD_HIGH: u16 = 0xFF19;

/// This register controls CH3's DAC. Like other channels,
/// turning the DAC off immediately turns the channel off as well (NR30).
pub const AUDIO_CHANNEL_3_DAC_ENABLE: u16 = 0xFF1A;

pub const AUDIO_CHANNEL_3_LENGTH: u16 = 0xFF1B;

/// This channel lacks the envelope functionality of the other three
/// channels and has a much coarser volume control (NR32).
pub const AUDIO_CHANNEL_3_VOLUME: u16 = 0xFF1C;

pub const AUDIO_CHANNEL_3_PERIOD_LOW: u16 = 0xFF1D;
pub const AUDIO_CHANNEL_3_PERIOD_HIGH: u16 = 0xFF1E;

pub const AUDIO_CHANNEL_4_LENGTH: u16 = 0xFF20;
pub const AUDIO_CHANNEL_4_VOLUME: u16 = 0xFF21;

/// This register controls the polynomial counter driving the LFSR (NR43).
pub const AUDIO_CHANNEL_4_FREQ: u16 = 0xFF22;

pub const AUDIO_CHANNEL_4_CONTROL: u16 = 0xFF23;

pub const AUDIO_MASTER_VOLUME: u16 = 0xFF24;
pub const AUDIO_SOUND_PANNING: u16 = 0xFF25;
pub const AUDIO_MASTER_CONTROL: u16 = 0xFF26;

/// Wave RAM is 16 bytes long; each byte holds two 4-bit samples.
pub const AUDIO_WAVE_PATTERN_START: u16 = 0xFF30;
pub const AUDIO_WAVE_PATTERN_END: u16 = 0xFF3F;

/// Output sample rate of the mixer.
pub const AUDIO_SAMPLE_RATE: u32 = 44100;

/// The frame sequencer advances at 512 Hz.
const FRAME_SEQUENCER_PERIOD: u32 = CPU_CLOCK_SPEED / 512;

/// The Audio Processing Unit: four generator channels driven by a 512 Hz
/// frame sequencer, mixed into a float sample buffer the host drains.
pub struct APU {
    enabled: bool,
    nr50: u8,
    nr51: u8,
    frame_sequencer: AudioTimer,
    sequencer_step: u8,
    sample_timer: AudioTimer,
    channel1: Channel,
    channel2: Channel,
    channel3: Channel,
    channel4: Channel,
    samples: Vec<f32>,
}

impl Default for APU {
    fn default() -> Self {
        let mut frame_sequencer = AudioTimer::default();
        frame_sequencer.restart(FRAME_SEQUENCER_PERIOD);
        let mut sample_timer = AudioTimer::default();
        sample_timer.restart(CPU_CLOCK_SPEED / AUDIO_SAMPLE_RATE);
        Self {
            enabled: false,
            nr50: 0,
            nr51: 0,
            frame_sequencer,
            sequencer_step: 0,
            sample_timer,
            channel1: Channel::sweep_square(),
            channel2: Channel::square(),
            channel3: Channel::wave(),
            channel4: Channel::noise(),
            samples: Vec::new(),
        }
    }
}

impl APU {
    /// Advances the APU by one M-cycle (4 T-cycles).
    pub fn step(&mut self) {
        for _ in 0..4 {
            self.tick();
        }
    }

    /// Advances the APU by one T-cycle.
    fn tick(&mut self) {
        if self.frame_sequencer.tick() {
            match self.sequencer_step {
                0 | 4 => self.tick_lengths(),
                2 | 6 => {
                    self.channel1.tick_sweep();
                    self.tick_lengths();
                }
                7 => {
                    self.channel1.tick_envelope();
                    self.channel2.tick_envelope();
                    self.channel4.tick_envelope();
                }
                _ => {}
            }
            self.sequencer_step = (self.sequencer_step + 1) % 8;
        }

        self.channel1.tick_frequency();
        self.channel2.tick_frequency();
        self.channel3.tick_frequency();
        self.channel4.tick_frequency();

        if self.sample_timer.tick() {
            self.collect_sample();
        }
    }

    fn tick_lengths(&mut self) {
        self.channel1.tick_length();
        self.channel2.tick_length();
        self.channel3.tick_length();
        self.channel4.tick_length();
    }

    /// Sums up all channels that are routed to at least one output
    /// terminal in NR51.
    fn collect_sample(&mut self) {
        let mut sample = 0.0;
        for (channel, routing) in [
            (&self.channel1, 0b0001_0001),
            (&self.channel2, 0b0010_0010),
            (&self.channel3, 0b0100_0100),
            (&self.channel4, 0b1000_1000),
        ] {
            if self.nr51 & routing != 0 {
                sample += channel.output();
            }
        }
        self.samples.push(sample);
    }

    /// Hands out all samples collected since the last call.
    pub fn drain_samples(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.samples)
    }

    /// Direct access to the channels, primarily for inspection.
    pub const fn channels(&self) -> [&Channel; 4] {
        [&self.channel1, &self.channel2, &self.channel3, &self.channel4]
    }

    /// Writing bit 7 of NR52 powers the whole APU on or off.
    /// Powering off silences and resets every channel.
    fn write_master_control(&mut self, value: u8) {
        let enable = utils::bit(value, 7);
        if enable && !self.enabled {
            self.sequencer_step = 0;
            self.channel1.power_on();
            self.channel2.power_on();
            self.channel3.power_on();
            self.channel4.power_on();
        }
        if !enable && self.enabled {
            self.channel1.power_off();
            self.channel2.power_off();
            self.channel3.power_off();
            self.channel4.power_off();
            self.nr50 = 0;
            self.nr51 = 0;
        }
        self.enabled = enable;
    }

    /// NR52 reads the power state and the per-channel status bits.
    fn read_master_control(&self) -> u8 {
        (self.enabled as u8) << 7
            | 0b0111_0000
            | (self.channel4.is_enabled() as u8) << 3
            | (self.channel3.is_enabled() as u8) << 2
            | (self.channel2.is_enabled() as u8) << 1
            | self.channel1.is_enabled() as u8
    }
}

impl SubSystem for APU {
    fn write(&mut self, address: u16, value: u8) {
        match address {
            AUDIO_CHANNEL_1_SWEEP => self.channel1.write(0, value),
            AUDIO_CHANNEL_1_LENGTH => self.channel1.write(1, value),
            AUDIO_CHANNEL_1_VOLUME => self.channel1.write(2, value),
            AUDIO_CHANNEL_1_PERIOD_LOW => self.channel1.write(3, value),
            AUDIO_CHANNEL_1_PERIOD_HIGH => self.channel1.write(4, value),
            0xFF15 => {} // undocumented
            AUDIO_CHANNEL_2_LENGTH => self.channel2.write(1, value),
            AUDIO_CHANNEL_2_VOLUME => self.channel2.write(2, value),
            AUDIO_CHANNEL_2_PERIOD_LOW => self.channel2.write(3, value),
            AUDIO_CHANNEL_2_PERIOD_HIGH => self.channel2.write(4, value),
            AUDIO_CHANNEL_3_DAC_ENABLE => self.channel3.write(0, value),
            AUDIO_CHANNEL_3_LENGTH => self.channel3.write(1, value),
            AUDIO_CHANNEL_3_VOLUME => self.channel3.write(2, value),
            AUDIO_CHANNEL_3_PERIOD_LOW => self.channel3.write(3, value),
            AUDIO_CHANNEL_3_PERIOD_HIGH => self.channel3.write(4, value),
            0xFF1F => {} // undocumented
            AUDIO_CHANNEL_4_LENGTH => self.channel4.write(1, value),
            AUDIO_CHANNEL_4_VOLUME => self.channel4.write(2, value),
            AUDIO_CHANNEL_4_FREQ => self.channel4.write(3, value),
            AUDIO_CHANNEL_4_CONTROL => self.channel4.write(4, value),
            AUDIO_MASTER_VOLUME => {
                if self.enabled {
                    self.nr50 = value;
                }
            }
            AUDIO_SOUND_PANNING => {
                if self.enabled {
                    self.nr51 = value;
                }
            }
            AUDIO_MASTER_CONTROL => self.write_master_control(value),
            0xFF27..=0xFF2F => {} // undocumented
            AUDIO_WAVE_PATTERN_START..=AUDIO_WAVE_PATTERN_END => self
                .channel3
                .write_wave_ram((address - AUDIO_WAVE_PATTERN_START) as u8, value),
            _ => panic!("Attempt to write to unmapped audio register: {address:#06x}"),
        }
    }

    fn read(&mut self, address: u16) -> u8 {
        debug_assert!((AUDIO_REGISTERS_START..=AUDIO_REGISTERS_END).contains(&address));
        match address {
            // Undocumented bits should be 1
            AUDIO_CHANNEL_1_SWEEP => self.channel1.read(0) | 0b1000_0000,
            AUDIO_CHANNEL_1_LENGTH => self.channel1.read(1) | 0b0011_1111,
            AUDIO_CHANNEL_1_VOLUME => self.channel1.read(2),
            AUDIO_CHANNEL_1_PERIOD_LOW => UNDEFINED_READ, // write-only
            AUDIO_CHANNEL_1_PERIOD_HIGH => self.channel1.read(4) | 0b1011_1111,
            0xFF15 => UNDEFINED_READ, // undocumented
            AUDIO_CHANNEL_2_LENGTH => self.channel2.read(1) | 0b0011_1111,
            AUDIO_CHANNEL_2_VOLUME => self.channel2.read(2),
            AUDIO_CHANNEL_2_PERIOD_LOW => UNDEFINED_READ, // write-only
            AUDIO_CHANNEL_2_PERIOD_HIGH => self.channel2.read(4) | 0b1011_1111,
            AUDIO_CHANNEL_3_DAC_ENABLE => self.channel3.read(0) | 0b0111_1111,
            AUDIO_CHANNEL_3_LENGTH => UNDEFINED_READ, // write-only
            AUDIO_CHANNEL_3_VOLUME => self.channel3.read(2) | 0b1001_1111,
            AUDIO_CHANNEL_3_PERIOD_LOW => UNDEFINED_READ, // write-only
            AUDIO_CHANNEL_3_PERIOD_HIGH => self.channel3.read(4) | 0b1011_1111,
            0xFF1F => UNDEFINED_READ,                 // undocumented
            AUDIO_CHANNEL_4_LENGTH => UNDEFINED_READ, // write-only
            AUDIO_CHANNEL_4_VOLUME => self.channel4.read(2),
            AUDIO_CHANNEL_4_FREQ => self.channel4.read(3),
            AUDIO_CHANNEL_4_CONTROL => self.channel4.read(4) | 0b1011_1111,
            AUDIO_MASTER_VOLUME => self.nr50,
            AUDIO_SOUND_PANNING => self.nr51,
            AUDIO_MASTER_CONTROL => self.read_master_control(),
            0xFF27..=0xFF2F => UNDEFINED_READ, // undocumented
            AUDIO_WAVE_PATTERN_START..=AUDIO_WAVE_PATTERN_END => self
                .channel3
                .read_wave_ram((address - AUDIO_WAVE_PATTERN_START) as u8),
            _ => panic!("Attempt to read from unmapped audio register: {address:#06x}"),
        }
    }
}
