pub mod buffer;
pub mod fetcher;
pub mod misc;
pub mod registers;

use crate::gb::constants::*;
use crate::gb::interrupt::InterruptRegister;
use crate::gb::ppu::buffer::FrameBuffer;
use crate::gb::ppu::fetcher::{BackgroundFetcher, FetcherMode, SpriteFetcher, SpriteFetcherState};
use crate::gb::ppu::misc::{ColorIndex, Pixel, PixelSource, Sprite};
use crate::gb::ppu::registers::{LCDControl, LCDState, PPUMode, Registers};
use crate::gb::{SCREEN_HEIGHT, SCREEN_WIDTH, SubSystem, VERTICAL_BLANK_SCAN_LINE_MAX};
use std::mem;

/// Duration of one full scanline.
pub const SCANLINE_DOTS: u16 = 456;

/// Duration of the OAM scan, independent of the number of sprites found.
pub const OAM_SCAN_DOTS: u16 = 80;

/// At most 10 sprites survive the OAM scan of one scanline.
pub const MAX_SPRITES_PER_SCANLINE: usize = 10;

/// The pixel output position starts each scanline at -7 so the window
/// trigger and sub-tile scrolling work for WX values below 7.
const PIXEL_OUTPUT_START: i16 = -7;

/// The Pixel Processing Unit. It owns VRAM and OAM outright, the memory map
/// reaches them only through the `SubSystem` interface which enforces the
/// mode based access rules.
pub struct PPU {
    pub r: Registers,
    vram: [u8; VRAM_SIZE],
    oam: [u8; OAM_SIZE],
    scanline_cycles: u16,
    scanline_x: i16,
    pixels_to_discard: u8,
    discarded_pixels: u8,
    sprites: Vec<Sprite>,
    bg_fetcher: BackgroundFetcher,
    sprite_fetcher: SpriteFetcher,
    stat_line: LCDState,
    wy_triggered: bool,
    window_line: u8,
    frame: FrameBuffer,
    front: FrameBuffer,
    frame_ready: bool,
}

impl Default for PPU {
    fn default() -> Self {
        Self {
            r: Registers::default(),
            vram: [0u8; VRAM_SIZE],
            oam: [0u8; OAM_SIZE],
            scanline_cycles: 0,
            scanline_x: PIXEL_OUTPUT_START,
            pixels_to_discard: 0,
            discarded_pixels: 0,
            sprites: Vec::with_capacity(MAX_SPRITES_PER_SCANLINE),
            bg_fetcher: BackgroundFetcher::new(),
            sprite_fetcher: SpriteFetcher::new(),
            stat_line: LCDState::empty(),
            wy_triggered: false,
            window_line: 0,
            frame: FrameBuffer::default(),
            front: FrameBuffer::default(),
            frame_ready: false,
        }
    }
}

impl PPU {
    /// Advances the PPU by one M-cycle (4 dots).
    pub fn step(&mut self, int_reg: &mut InterruptRegister) {
        for _ in 0..4 {
            self.tick(int_reg);
        }
    }

    /// Advances the PPU by a single dot.
    fn tick(&mut self, int_reg: &mut InterruptRegister) {
        if !self.r.lcd_control.contains(LCDControl::LCD_EN) {
            return;
        }

        match self.r.lcd_stat.mode() {
            PPUMode::OAMScan => self.oam_scan_tick(int_reg),
            PPUMode::PixelTransfer => self.pixel_transfer_tick(int_reg),
            PPUMode::HBlank => self.hblank_tick(int_reg),
            PPUMode::VBlank => self.vblank_tick(int_reg),
        }

        // The scanline may have changed, keep the LYC=LY flag
        // and its interrupt source up to date.
        self.refresh_lyc(int_reg);
    }

    /// Mode 2: one sprite is examined every 2 dots, the first 10 sprites
    /// covering the current scanline win.
    fn oam_scan_tick(&mut self, int_reg: &mut InterruptRegister) {
        self.scanline_cycles += 1;
        if self.scanline_cycles % 2 == 0 {
            let index = (self.scanline_cycles / 2 - 1) as u8;
            if self.sprites.len() < MAX_SPRITES_PER_SCANLINE {
                let sprite = self.sprite_at(index);
                let ly = i16::from(self.r.ly);
                if ly >= sprite.y && ly < sprite.y + i16::from(self.r.lcd_control.obj_height()) {
                    self.sprites.push(sprite);
                }
            }
        }

        if self.scanline_cycles >= OAM_SCAN_DOTS {
            self.set_stat_source(LCDState::OAM_INT, false, int_reg);
            self.enter_pixel_transfer();
        }
    }

    /// Mode 3: both fetchers run and the mixer pushes one pixel per dot.
    fn pixel_transfer_tick(&mut self, int_reg: &mut InterruptRegister) {
        // The negative output prefix costs no dots, but the window trigger
        // has to be evaluated for every position.
        loop {
            self.check_window_activation();
            if self.scanline_x >= 0 {
                break;
            }
            self.scanline_x += 1;
        }
        self.scanline_cycles += 1;

        let obj_enabled = self.r.lcd_control.contains(LCDControl::OBJ_EN);
        if obj_enabled {
            let previous_state = self.sprite_fetcher.state;
            self.sprite_fetcher.x = self.scanline_x;
            self.sprite_fetcher
                .step(&mut self.bg_fetcher, &self.vram, &self.r);
            // A sprite fetch in progress stalls the rest of the pipeline
            if previous_state != SpriteFetcherState::Idle
                || self.sprite_fetcher.state != SpriteFetcherState::Idle
            {
                return;
            }
        }

        let sprite_available = obj_enabled && !self.sprite_fetcher.fifo.is_empty();

        if self.r.lcd_control.contains(LCDControl::BG_EN) {
            self.bg_fetcher.step(&self.vram, &self.r);
            if self.bg_fetcher.fifo.len() > 8 {
                let mut pixel = self.bg_fetcher.fifo.pop_front().unwrap_or_default();

                // Discard SCX & 7 background pixels for the fine scroll
                if self.bg_fetcher.mode == FetcherMode::Background
                    && self.discarded_pixels < self.pixels_to_discard
                {
                    self.discarded_pixels += 1;
                    return;
                }

                if sprite_available {
                    if let Some(sprite_pixel) = self.sprite_fetcher.fifo.pop_front() {
                        // The sprite wins over background color 0 and over
                        // any background pixel if its priority flag allows.
                        if sprite_pixel.color != ColorIndex::Zero
                            && (pixel.color == ColorIndex::Zero || !sprite_pixel.bg_over_sprite)
                        {
                            pixel = sprite_pixel;
                        }
                    }
                }
                self.render_pixel(pixel);
            }
        } else {
            // With the background disabled only sprite pixels are drawn
            let pixel = match sprite_available {
                true => self.sprite_fetcher.fifo.pop_front().unwrap_or_default(),
                false => Pixel::default(),
            };
            self.render_pixel(pixel);
        }

        if self.scanline_x >= i16::from(SCREEN_WIDTH) {
            self.enter_hblank(int_reg);
        }
    }

    /// Mode 0: wait out the rest of the 456 dot scanline.
    fn hblank_tick(&mut self, int_reg: &mut InterruptRegister) {
        self.scanline_cycles += 1;
        if self.scanline_cycles >= SCANLINE_DOTS {
            self.scanline_cycles = 0;
            self.scanline_x = PIXEL_OUTPUT_START;
            self.r.ly += 1;
            self.set_stat_source(LCDState::H_BLANK_INT, false, int_reg);

            match self.r.ly >= SCREEN_HEIGHT {
                true => self.enter_vblank(int_reg),
                false => self.enter_oam_scan(int_reg),
            }
        }
    }

    /// Mode 1: ten idle scanlines, then LY wraps and the next frame starts.
    fn vblank_tick(&mut self, int_reg: &mut InterruptRegister) {
        self.scanline_cycles += 1;
        if self.scanline_cycles >= SCANLINE_DOTS {
            self.scanline_cycles = 0;
            self.r.ly += 1;
            if self.r.ly > VERTICAL_BLANK_SCAN_LINE_MAX {
                self.r.ly = 0;
                self.wy_triggered = false;
                self.window_line = 0;
                self.bg_fetcher.reset();
                self.sprite_fetcher.reset();
                self.set_stat_source(LCDState::V_BLANK_INT, false, int_reg);
                self.enter_oam_scan(int_reg);
            }
        }
    }

    fn enter_oam_scan(&mut self, int_reg: &mut InterruptRegister) {
        // The WY match is latched once per frame, the window stays armed
        // even if WY changes afterwards.
        if !self.wy_triggered {
            self.wy_triggered = self.r.wy == self.r.ly;
        }
        self.pixels_to_discard = self.r.scx & 0b111;
        self.discarded_pixels = 0;
        self.sprites.clear();
        self.r.lcd_stat.set_mode(PPUMode::OAMScan);
        self.set_stat_source(LCDState::OAM_INT, true, int_reg);
    }

    fn enter_pixel_transfer(&mut self) {
        self.bg_fetcher.reset();
        self.bg_fetcher.y = self.r.ly;
        self.sprite_fetcher.reset();
        self.sprite_fetcher.sprites = self.sprites.clone();
        self.sprite_fetcher.y = self.r.ly;
        self.r.lcd_stat.set_mode(PPUMode::PixelTransfer);
    }

    fn enter_hblank(&mut self, int_reg: &mut InterruptRegister) {
        self.r.lcd_stat.set_mode(PPUMode::HBlank);
        self.set_stat_source(LCDState::H_BLANK_INT, true, int_reg);
    }

    fn enter_vblank(&mut self, int_reg: &mut InterruptRegister) {
        self.r.lcd_stat.set_mode(PPUMode::VBlank);
        self.set_stat_source(LCDState::V_BLANK_INT, true, int_reg);
        // The dedicated VBlank interrupt fires independently of STAT
        int_reg.insert(InterruptRegister::VBLANK);

        mem::swap(&mut self.front, &mut self.frame);
        self.frame.clear();
        self.frame_ready = true;
    }

    /// Resets the background fetcher into window mode once all window
    /// conditions hold. The window line counter only advances on lines
    /// where the window actually renders.
    fn check_window_activation(&mut self) {
        let wx_triggered = self.scanline_x + 7 == i16::from(self.r.wx);
        if self.bg_fetcher.mode != FetcherMode::Window
            && wx_triggered
            && self.wy_triggered
            && self.r.lcd_control.contains(LCDControl::WIN_EN)
        {
            self.bg_fetcher.reset();
            self.bg_fetcher.y = self.window_line;
            self.bg_fetcher.mode = FetcherMode::Window;
            self.window_line += 1;
        }
    }

    /// Resolves the pixel through its palette and writes it to the
    /// working frame.
    fn render_pixel(&mut self, pixel: Pixel) {
        let palette = match pixel.source {
            PixelSource::Background => self.r.bg_palette,
            PixelSource::Object0 => self.r.obj_palette0,
            PixelSource::Object1 => self.r.obj_palette1,
        };
        self.frame
            .write_pixel(self.scanline_x as u8, self.r.ly, palette.colorize(pixel.color));
        self.scanline_x += 1;
    }

    /// The STAT interrupt sources are OR-ed into a single line, an interrupt
    /// fires only on a 0 to 1 transition of that line. A source only drives
    /// the line while it is enabled in STAT.
    fn set_stat_source(&mut self, source: LCDState, level: bool, int_reg: &mut InterruptRegister) {
        if !self.r.lcd_stat.contains(source) {
            return;
        }
        if self.stat_line.is_empty() && level {
            int_reg.insert(InterruptRegister::STAT);
        }
        self.stat_line.set(source, level);
    }

    fn refresh_lyc(&mut self, int_reg: &mut InterruptRegister) {
        let matches = self.r.ly == self.r.lyc;
        self.r.lcd_stat.set(LCDState::LYC_STAT, matches);
        self.set_stat_source(LCDState::LY_INT, matches, int_reg);
    }

    /// Decodes the sprite entry at the given OAM index.
    fn sprite_at(&self, index: u8) -> Sprite {
        let offset = usize::from(index) * 4;
        let bytes = [
            self.oam[offset],
            self.oam[offset + 1],
            self.oam[offset + 2],
            self.oam[offset + 3],
        ];
        Sprite::from_oam(bytes, index, self.r.lcd_control.obj_height() == 16)
    }

    /// Turning off the LCD resets the scanline state and blanks both frames.
    fn power_off(&mut self) {
        self.r.lcd_stat.set_mode(PPUMode::HBlank);
        self.r.lcd_stat.remove(LCDState::LYC_STAT);
        self.r.ly = 0;
        self.scanline_cycles = 0;
        self.scanline_x = PIXEL_OUTPUT_START;
        self.sprites.clear();
        self.bg_fetcher.reset();
        self.sprite_fetcher.reset();
        self.stat_line = LCDState::empty();
        self.wy_triggered = false;
        self.window_line = 0;
        self.frame.clear();
        self.front.clear();
    }

    /// The LCD restarts at the top of the frame in OAM scan.
    fn power_on(&mut self) {
        self.scanline_cycles = 0;
        self.scanline_x = PIXEL_OUTPUT_START;
        self.sprites.clear();
        self.pixels_to_discard = self.r.scx & 0b111;
        self.discarded_pixels = 0;
        self.wy_triggered = self.r.wy == self.r.ly;
        self.r.lcd_stat.set_mode(PPUMode::OAMScan);
    }

    /// The CPU cannot reach VRAM while the pixel pipeline reads from it.
    #[inline]
    fn vram_blocked(&self) -> bool {
        self.r.lcd_control.contains(LCDControl::LCD_EN)
            && self.r.lcd_stat.mode() == PPUMode::PixelTransfer
    }

    /// The CPU cannot reach OAM during OAM scan, pixel transfer or while
    /// an OAM DMA transfer is running.
    #[inline]
    fn oam_blocked(&self) -> bool {
        if self.r.oam_dma.is_running() {
            return true;
        }
        self.r.lcd_control.contains(LCDControl::LCD_EN)
            && matches!(
                self.r.lcd_stat.mode(),
                PPUMode::OAMScan | PPUMode::PixelTransfer
            )
    }

    /// Unrestricted VRAM read for the DMA engine.
    #[inline]
    pub(crate) fn vram_read_raw(&self, address: u16) -> u8 {
        self.vram[(address - VRAM_BEGIN) as usize]
    }

    /// Unrestricted OAM write for the DMA engine.
    #[inline]
    pub(crate) fn dma_write_oam(&mut self, offset: u8, value: u8) {
        self.oam[usize::from(offset)] = value;
    }

    /// Returns the last completed frame.
    #[inline]
    pub fn front_buffer(&self) -> &FrameBuffer {
        &self.front
    }

    /// Returns the frame currently being drawn.
    #[inline]
    pub fn working_buffer(&self) -> &FrameBuffer {
        &self.frame
    }

    /// Consumes the frame-ready flag set on VBlank entry.
    #[inline]
    pub fn take_frame_ready(&mut self) -> bool {
        mem::take(&mut self.frame_ready)
    }
}

impl SubSystem for PPU {
    fn write(&mut self, address: u16, value: u8) {
        match address {
            VRAM_BEGIN..=VRAM_END => {
                if !self.vram_blocked() {
                    self.vram[(address - VRAM_BEGIN) as usize] = value;
                }
            }
            OAM_BEGIN..=OAM_END => {
                if !self.oam_blocked() {
                    self.oam[(address - OAM_BEGIN) as usize] = value;
                }
            }
            PPU_LCDC => {
                let was_enabled = self.r.lcd_control.contains(LCDControl::LCD_EN);
                self.r.lcd_control = LCDControl::from_bits_retain(value);
                let enabled = self.r.lcd_control.contains(LCDControl::LCD_EN);
                if was_enabled && !enabled {
                    self.power_off();
                }
                if !was_enabled && enabled {
                    self.power_on();
                }
            }
            // The mode and LYC flag bits are read-only
            PPU_STAT => {
                let writable = value & 0b0111_1000;
                let current = self.r.lcd_stat.bits() & 0b0000_0111;
                self.r.lcd_stat = LCDState::from_bits_retain(writable | current);
            }
            PPU_SCY => self.r.scy = value,
            PPU_SCX => self.r.scx = value,
            // LY is read-only
            PPU_LY => {}
            PPU_LYC => self.r.lyc = value,
            PPU_DMA => self.r.oam_dma.request(value),
            PPU_BGP => self.r.bg_palette = value.into(),
            PPU_OBP0 => self.r.obj_palette0 = value.into(),
            PPU_OBP1 => self.r.obj_palette1 = value.into(),
            PPU_WY => self.r.wy = value,
            PPU_WX => self.r.wx = value,
            _ => panic!("Attempt to write to unmapped PPU register: {address:#06x}"),
        }
    }

    fn read(&mut self, address: u16) -> u8 {
        match address {
            VRAM_BEGIN..=VRAM_END => match self.vram_blocked() {
                true => UNDEFINED_READ,
                false => self.vram[(address - VRAM_BEGIN) as usize],
            },
            OAM_BEGIN..=OAM_END => match self.oam_blocked() {
                true => UNDEFINED_READ,
                false => self.oam[(address - OAM_BEGIN) as usize],
            },
            PPU_LCDC => self.r.lcd_control.bits(),
            // Undocumented bits should be 1
            PPU_STAT => self.r.lcd_stat.bits() | 0b1000_0000,
            PPU_SCY => self.r.scy,
            PPU_SCX => self.r.scx,
            PPU_LY => self.r.ly,
            PPU_LYC => self.r.lyc,
            PPU_DMA => self.r.oam_dma.source,
            PPU_BGP => self.r.bg_palette.into(),
            PPU_OBP0 => self.r.obj_palette0.into(),
            PPU_OBP1 => self.r.obj_palette1.into(),
            PPU_WY => self.r.wy,
            PPU_WX => self.r.wx,
            _ => panic!("Attempt to read from unmapped PPU register: {address:#06x}"),
        }
    }
}

/// Extracts the 2-bit color of a single pixel from the two bytes of a tile
/// row. Bits are numbered from 0 (rightmost pixel) to 7 (leftmost pixel).
#[inline]
pub fn pixel_from_line(low: u8, high: u8, bit: u8) -> ColorIndex {
    ColorIndex::from((low >> bit & 1) | (high >> bit & 1) << 1)
}
