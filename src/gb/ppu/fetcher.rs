use crate::gb::SCREEN_WIDTH;
use crate::gb::constants::VRAM_BEGIN;
use crate::gb::ppu::misc::{ColorIndex, Pixel, Sprite};
use crate::gb::ppu::pixel_from_line;
use crate::gb::ppu::registers::Registers;
use std::collections::VecDeque;

/// Width of a tile row in pixels.
const TILE_WIDTH: usize = 8;

/// Selects the tile map source the background fetcher reads from.
#[derive(Copy, Clone, PartialEq, Eq)]
pub enum FetcherMode {
    Background,
    Window,
}

/// The five states of the background fetcher, each taking 2 dots except
/// the push, which repeats until the FIFO has room.
#[derive(Copy, Clone, PartialEq, Eq)]
enum FetcherState {
    FetchTileIndex,
    FetchTileLow,
    FetchTileHigh,
    Sleep,
    Push,
}

/// Fetches background or window pixels, 8 at a time, into its FIFO.
/// It runs at half the dot clock, every state takes two dots.
pub struct BackgroundFetcher {
    pub fifo: VecDeque<Pixel>,
    pub mode: FetcherMode,
    state: FetcherState,
    state_cycles: u8,
    // Pixels pushed on the current scanline, the low 3 bits select
    // the horizontal position inside the current tile row.
    x: u8,
    // Scanline being fetched: LY for the background,
    // the internal window line counter for the window.
    pub y: u8,
    tile_index: u8,
    tile_low: u8,
    tile_high: u8,
}

impl BackgroundFetcher {
    pub fn new() -> Self {
        Self {
            fifo: VecDeque::with_capacity(2 * TILE_WIDTH),
            mode: FetcherMode::Background,
            state: FetcherState::FetchTileIndex,
            state_cycles: 0,
            x: 0,
            y: 0,
            tile_index: 0,
            tile_low: 0,
            tile_high: 0,
        }
    }

    /// Restarts the fetch from the first tile of the row in background mode.
    /// The FIFO is cleared, it may still contain leftover pixels from the
    /// end of the previous scanline.
    pub fn reset(&mut self) {
        self.fifo.clear();
        self.mode = FetcherMode::Background;
        self.state = FetcherState::FetchTileIndex;
        self.state_cycles = 0;
        self.x = 0;
        self.y = 0;
        self.tile_index = 0;
        self.tile_low = 0;
        self.tile_high = 0;
    }

    /// Advances the fetcher by one dot.
    pub fn step(&mut self, vram: &[u8], r: &Registers) {
        self.state_cycles += 1;
        match self.state {
            FetcherState::FetchTileIndex => {
                if self.state_cycles < 2 {
                    return;
                }
                let (tile_x, map_area) = match self.mode {
                    FetcherMode::Background => (
                        r.scx.wrapping_add(self.x) / 8 & 0x1F,
                        r.lcd_control.bg_tile_map_area(),
                    ),
                    FetcherMode::Window => (self.x / 8, r.lcd_control.window_tile_map_area()),
                };
                let tile_y = self.adjusted_y(r) / 8;
                let map_address = map_area + u16::from(tile_y) * 32 + u16::from(tile_x);
                self.tile_index = vram[(map_address - VRAM_BEGIN) as usize];
                self.switch_state(FetcherState::FetchTileLow);
            }
            FetcherState::FetchTileLow => {
                if self.state_cycles < 2 {
                    return;
                }
                self.tile_low = vram[(self.tile_data_address(r) - VRAM_BEGIN) as usize];
                self.switch_state(FetcherState::FetchTileHigh);
            }
            FetcherState::FetchTileHigh => {
                if self.state_cycles < 2 {
                    return;
                }
                self.tile_high = vram[(self.tile_data_address(r) + 1 - VRAM_BEGIN) as usize];
                self.switch_state(FetcherState::Sleep);
            }
            FetcherState::Sleep => {
                if self.state_cycles < 2 {
                    return;
                }
                self.switch_state(FetcherState::Push);
            }
            FetcherState::Push => {
                // Pixels can only be pushed while less than 9 are queued
                if self.fifo.len() > TILE_WIDTH {
                    return;
                }
                // The most significant bit holds the leftmost pixel
                for bit in (0..8).rev() {
                    let color = pixel_from_line(self.tile_low, self.tile_high, bit);
                    self.fifo.push_back(Pixel::background(color));
                }
                self.x = self.x.wrapping_add(8);
                self.switch_state(FetcherState::FetchTileIndex);
            }
        }
    }

    #[inline]
    fn switch_state(&mut self, state: FetcherState) {
        self.state = state;
        self.state_cycles = 0;
    }

    /// The vertical position inside the 256 pixel tile map space.
    #[inline]
    fn adjusted_y(&self, r: &Registers) -> u8 {
        match self.mode {
            FetcherMode::Background => self.y.wrapping_add(r.scy),
            FetcherMode::Window => self.y,
        }
    }

    #[inline]
    fn tile_data_address(&self, r: &Registers) -> u16 {
        r.lcd_control
            .tile_data_address(self.tile_index, self.adjusted_y(r) % 8)
    }
}

/// The sprite fetcher states. Unlike the background fetcher the state
/// advances every dot, and transitions out of `Idle` happen for free.
#[derive(Copy, Clone, PartialEq, Eq)]
pub enum SpriteFetcherState {
    Idle,
    AdvanceBackground,
    FetchTileLow,
    Push,
}

/// Merges sprite pixels into its FIFO once the current output position
/// reaches a sprite that was collected during OAM scan. While fetching,
/// the rest of the pixel pipeline is stalled.
pub struct SpriteFetcher {
    pub fifo: VecDeque<Pixel>,
    pub state: SpriteFetcherState,
    pub sprites: Vec<Sprite>,
    pub x: i16,
    pub y: u8,
    current: usize,
    tile_low: u8,
}

impl SpriteFetcher {
    pub fn new() -> Self {
        Self {
            fifo: VecDeque::with_capacity(TILE_WIDTH),
            state: SpriteFetcherState::Idle,
            sprites: Vec::new(),
            x: 0,
            y: 0,
            current: 0,
            tile_low: 0,
        }
    }

    pub fn reset(&mut self) {
        self.fifo.clear();
        self.state = SpriteFetcherState::Idle;
        self.sprites.clear();
        self.x = 0;
        self.y = 0;
        self.current = 0;
        self.tile_low = 0;
    }

    /// Advances the fetcher by one dot. The background fetcher is borrowed
    /// because a sprite fetch first fills its queue up to a full tile row.
    pub fn step(&mut self, bg: &mut BackgroundFetcher, vram: &[u8], r: &Registers) {
        loop {
            match self.state {
                SpriteFetcherState::Idle => {
                    let x = self.x;
                    match self.sprites.iter().position(|s| Self::covers(s, x)) {
                        Some(index) => {
                            self.current = index;
                            self.state = match bg.fifo.len() < TILE_WIDTH {
                                true => SpriteFetcherState::AdvanceBackground,
                                false => SpriteFetcherState::FetchTileLow,
                            };
                            // The new state starts executing this dot
                            continue;
                        }
                        None => return,
                    }
                }
                SpriteFetcherState::AdvanceBackground => {
                    if bg.fifo.len() < TILE_WIDTH {
                        bg.step(vram, r);
                        if bg.fifo.len() >= TILE_WIDTH {
                            self.state = SpriteFetcherState::FetchTileLow;
                        }
                        return;
                    }
                    self.state = SpriteFetcherState::FetchTileLow;
                    continue;
                }
                SpriteFetcherState::FetchTileLow => {
                    self.tile_low = vram[(self.tile_address(r) - VRAM_BEGIN) as usize];
                    self.state = SpriteFetcherState::Push;
                    return;
                }
                SpriteFetcherState::Push => {
                    self.push_pixels(vram, r);
                    self.state = SpriteFetcherState::Idle;
                    return;
                }
            }
        }
    }

    /// A sprite is fetched once the output position reaches its X position,
    /// or right at the line start for sprites hanging off the left edge.
    fn covers(sprite: &Sprite, x: i16) -> bool {
        (x >= 0 && x < i16::from(SCREEN_WIDTH) && sprite.x == x)
            || (x == 0 && sprite.x < 0 && sprite.x > -(TILE_WIDTH as i16))
    }

    /// Address of the 2-byte sprite tile row for the current scanline,
    /// respecting vertical flip and the 8x16 sprite mode.
    fn tile_address(&self, r: &Registers) -> u16 {
        let sprite = &self.sprites[self.current];
        let height = r.lcd_control.obj_height();

        let mut tile_index = sprite.tile_index;
        let mut row = (i16::from(self.y) - sprite.y) as u8;
        if sprite.y_flip {
            row = height - 1 - row;
        }
        // The lower half of an 8x16 sprite lives in the next tile
        if row >= 8 {
            tile_index = tile_index.wrapping_add(1);
        }
        0x8000 + u16::from(tile_index) * 16 + u16::from(row % 8) * 2
    }

    /// Merges the 8 pixels of the fetched sprite row into the FIFO.
    /// An existing pixel survives if the new one is transparent, otherwise
    /// the smaller sprite X wins and OAM order breaks ties.
    fn push_pixels(&mut self, vram: &[u8], r: &Registers) {
        let sprite = self.sprites[self.current];
        let tile_high = vram[(self.tile_address(r) + 1 - VRAM_BEGIN) as usize];

        // Pad the queue with transparent pixels of the lowest priority
        while self.fifo.len() < TILE_WIDTH {
            self.fifo.push_back(Pixel::default());
        }

        for px in (0..TILE_WIDTH as i16).rev() {
            // Drop pixels that fall off the left edge of the screen
            if sprite.x + (7 - px) < 0 {
                self.fifo.pop_front();
                continue;
            }

            let bit = match sprite.x_flip {
                true => 7 - px,
                false => px,
            };
            let new_pixel = Pixel {
                color: pixel_from_line(self.tile_low, tile_high, bit as u8),
                source: sprite.palette,
                bg_over_sprite: sprite.bg_over_sprite,
                sprite_x: sprite.x,
                oam_index: sprite.oam_index,
            };

            let existing = self.fifo.pop_front().unwrap_or_default();
            let wins = new_pixel.color != ColorIndex::Zero
                && (new_pixel.sprite_x < existing.sprite_x
                    || (new_pixel.sprite_x == existing.sprite_x
                        && new_pixel.oam_index < existing.oam_index));
            self.fifo.push_back(match wins {
                true => new_pixel,
                false => existing,
            });
        }

        // Make sure the sprite is not fetched again on this scanline
        self.sprites.remove(self.current);
    }
}
