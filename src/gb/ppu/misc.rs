use crate::gb::SCREEN_WIDTH;
use crate::gb::utils;

/// Number of sprite entries in OAM.
pub const OAM_SPRITE_COUNT: u8 = 40;

/// Defines a Palette to colorize a pixel,
/// used by the bgp, obp0 and obp1 registers.
#[derive(Default, Copy, Clone)]
pub struct Palette {
    map: [ColoredPixel; 4],
}

impl Palette {
    #[inline]
    pub fn colorize(&self, color: ColorIndex) -> ColoredPixel {
        self.map[u8::from(color) as usize]
    }
}

impl From<u8> for Palette {
    /// Every two bits in the palette data byte represent a colour.
    /// Bits 7-6 map to colour id 11, bits 5-4 map to colour id 10,
    /// bits 3-2 map to colour id 01 and bits 1-0 map to colour id 00.
    #[inline]
    fn from(value: u8) -> Self {
        Self {
            map: [
                ColoredPixel::from(value & 0b11),
                ColoredPixel::from(value >> 2 & 0b11),
                ColoredPixel::from(value >> 4 & 0b11),
                ColoredPixel::from(value >> 6 & 0b11),
            ],
        }
    }
}

impl From<Palette> for u8 {
    #[inline]
    fn from(palette: Palette) -> u8 {
        u8::from(palette.map[0])
            | u8::from(palette.map[1]) << 2
            | u8::from(palette.map[2]) << 4
            | u8::from(palette.map[3]) << 6
    }
}

/// Represents a non-colorized 2-bit color index.
#[derive(Default, Copy, Clone, PartialEq, Eq, Debug)]
pub enum ColorIndex {
    #[default]
    Zero,
    One,
    Two,
    Three,
}

impl From<ColorIndex> for u8 {
    #[inline]
    fn from(value: ColorIndex) -> u8 {
        match value {
            ColorIndex::Zero => 0b00,
            ColorIndex::One => 0b01,
            ColorIndex::Two => 0b10,
            ColorIndex::Three => 0b11,
        }
    }
}

impl From<u8> for ColorIndex {
    #[inline]
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0b00 => ColorIndex::Zero,
            0b01 => ColorIndex::One,
            0b10 => ColorIndex::Two,
            _ => ColorIndex::Three,
        }
    }
}

/// Defines a colorized pixel created from a `ColorIndex` with a `Palette`.
#[derive(Default, Copy, Clone, PartialEq, Eq, Debug)]
pub enum ColoredPixel {
    #[default]
    White,
    LightGrey,
    DarkGrey,
    Black,
}

impl From<ColoredPixel> for u8 {
    #[inline]
    fn from(value: ColoredPixel) -> u8 {
        match value {
            ColoredPixel::White => 0b00,
            ColoredPixel::LightGrey => 0b01,
            ColoredPixel::DarkGrey => 0b10,
            ColoredPixel::Black => 0b11,
        }
    }
}

impl From<u8> for ColoredPixel {
    #[inline]
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0b00 => ColoredPixel::White,
            0b01 => ColoredPixel::LightGrey,
            0b10 => ColoredPixel::DarkGrey,
            _ => ColoredPixel::Black,
        }
    }
}

/// Selects the palette register a pixel is resolved through.
#[derive(Default, Copy, Clone, PartialEq, Eq, Debug)]
pub enum PixelSource {
    #[default]
    Background,
    Object0,
    Object1,
}

/// A single pixel travelling through one of the two FIFOs.
/// The sprite fields are only meaningful for object pixels and are used
/// to break priority ties while merging.
#[derive(Copy, Clone, Debug)]
pub struct Pixel {
    pub color: ColorIndex,
    pub source: PixelSource,
    // If false, this pixel is always drawn over background and window
    // pixels. Otherwise background colors 1-3 win.
    pub bg_over_sprite: bool,
    // The pixel belonging to the sprite with the smaller X position wins.
    pub sprite_x: i16,
    // OAM order breaks ties between sprites with the same X position.
    pub oam_index: u8,
}

impl Default for Pixel {
    /// A transparent pixel with the lowest possible sprite priority.
    fn default() -> Self {
        Self {
            color: ColorIndex::Zero,
            source: PixelSource::Background,
            bg_over_sprite: true,
            sprite_x: i16::from(SCREEN_WIDTH),
            oam_index: OAM_SPRITE_COUNT,
        }
    }
}

impl Pixel {
    /// Creates a background or window pixel.
    #[inline]
    pub fn background(color: ColorIndex) -> Self {
        Self {
            color,
            ..Default::default()
        }
    }
}

/// A sprite entry decoded from its 4 bytes in OAM.
#[derive(Copy, Clone, Debug)]
pub struct Sprite {
    // Horizontal position on the screen, OAM stores it plus 8.
    pub x: i16,
    // Vertical position on the screen, OAM stores it plus 16.
    pub y: i16,
    // In 8x16 mode this points at the top tile, the LSB is ignored.
    pub tile_index: u8,
    pub x_flip: bool,
    pub y_flip: bool,
    pub palette: PixelSource,
    pub bg_over_sprite: bool,
    pub oam_index: u8,
}

impl Sprite {
    /// Decodes a sprite from its OAM entry.
    pub fn from_oam(bytes: [u8; 4], oam_index: u8, tall: bool) -> Self {
        let flags = bytes[3];
        Self {
            y: i16::from(bytes[0]) - 16,
            x: i16::from(bytes[1]) - 8,
            tile_index: match tall {
                true => bytes[2] & 0xFE,
                false => bytes[2],
            },
            x_flip: utils::bit(flags, 5),
            y_flip: utils::bit(flags, 6),
            palette: match utils::bit(flags, 4) {
                true => PixelSource::Object1,
                false => PixelSource::Object0,
            },
            bg_over_sprite: utils::bit(flags, 7),
            oam_index,
        }
    }
}
