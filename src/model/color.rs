use serde::{Deserialize, Serialize};

/// RGBA colour of a performance pad (hot cue or loop)
///
/// The alpha channel is typically not used by players and is written at
/// full brightness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PadColor {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl PadColor {
    /// Construct a colour from its channels.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// The eight pad colours conventionally used by Engine hardware and
/// desktop software, in pad order.
pub mod standard_pad_colors {
    use super::PadColor;

    /// Colour of pad 1.
    pub const PAD_1: PadColor = PadColor::new(0xEA, 0xC5, 0x32, 0xFF);
    /// Colour of pad 2.
    pub const PAD_2: PadColor = PadColor::new(0xEA, 0x8F, 0x32, 0xFF);
    /// Colour of pad 3.
    pub const PAD_3: PadColor = PadColor::new(0xB8, 0x55, 0xBF, 0xFF);
    /// Colour of pad 4.
    pub const PAD_4: PadColor = PadColor::new(0xBA, 0x2A, 0x41, 0xFF);
    /// Colour of pad 5.
    pub const PAD_5: PadColor = PadColor::new(0x86, 0xC6, 0x4B, 0xFF);
    /// Colour of pad 6.
    pub const PAD_6: PadColor = PadColor::new(0x20, 0xC6, 0x7C, 0xFF);
    /// Colour of pad 7.
    pub const PAD_7: PadColor = PadColor::new(0x00, 0xA8, 0xB1, 0xFF);
    /// Colour of pad 8.
    pub const PAD_8: PadColor = PadColor::new(0x15, 0x8E, 0xE2, 0xFF);

    /// All eight pad colours, in pad order.
    pub const PADS: [PadColor; 8] =
        [PAD_1, PAD_2, PAD_3, PAD_4, PAD_5, PAD_6, PAD_7, PAD_8];
}
