//! ARGB color with an HDR multiplier

/// Scale factor between 8-bit color space and the floating point range used
/// by HDR layers. Post effects multiply at sample time and divide at
/// composite time with this same constant so blend math is identical for
/// 8-bit and floating-point sources.
pub const HDR_COLOR_RANGE: f32 = 4.0;

/// A 32-bit ARGB color plus an HDR brightness multiplier.
///
/// The multiplier is 1.0 for standard-range colors and only takes effect on
/// HDR layers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    argb: u32,
    hdr: f32,
}

impl Color {
    pub const TRANSPARENT: Color = Color::from_argb(0);
    pub const BLACK: Color = Color::from_argb(0xff00_0000);
    pub const WHITE: Color = Color::from_argb(0xffff_ffff);

    pub const fn from_argb(argb: u32) -> Self {
        Self { argb, hdr: 1.0 }
    }

    pub const fn with_hdr(mut self, hdr: f32) -> Self {
        self.hdr = hdr;
        self
    }

    pub const fn argb(&self) -> u32 {
        self.argb
    }

    pub const fn hdr(&self) -> f32 {
        self.hdr
    }

    pub const fn alpha(&self) -> u8 {
        (self.argb >> 24) as u8
    }

    pub const fn red(&self) -> u8 {
        (self.argb >> 16) as u8
    }

    pub const fn green(&self) -> u8 {
        (self.argb >> 8) as u8
    }

    pub const fn blue(&self) -> u8 {
        self.argb as u8
    }

    /// Channel bytes in RGBA order, as written to a framebuffer
    pub const fn rgba_bytes(&self) -> [u8; 4] {
        [self.red(), self.green(), self.blue(), self.alpha()]
    }

    /// Normalized RGBA components with the HDR multiplier applied to RGB
    pub fn rgba_f32(&self) -> [f32; 4] {
        [
            self.red() as f32 / 255.0 * self.hdr,
            self.green() as f32 / 255.0 * self.hdr,
            self.blue() as f32 / 255.0 * self.hdr,
            self.alpha() as f32 / 255.0,
        ]
    }

    pub fn with_alpha(self, alpha: u8) -> Self {
        Self {
            argb: (self.argb & 0x00ff_ffff) | ((alpha as u32) << 24),
            hdr: self.hdr,
        }
    }

    /// Per-channel linear interpolation, rounded to the nearest byte.
    ///
    /// Channels interpolate independently; `t` outside [0, 1] is clamped.
    pub fn lerp(from: Color, to: Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        let channel = |a: u8, b: u8| -> u32 {
            (a as f32 + (b as f32 - a as f32) * t).round() as u32
        };
        let argb = (channel(from.alpha(), to.alpha()) << 24)
            | (channel(from.red(), to.red()) << 16)
            | (channel(from.green(), to.green()) << 8)
            | channel(from.blue(), to.blue());
        Color {
            argb,
            hdr: from.hdr + (to.hdr - from.hdr) * t,
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::TRANSPARENT
    }
}

impl From<u32> for Color {
    fn from(argb: u32) -> Self {
        Color::from_argb(argb)
    }
}
