//! Panel geometry and the packed monochrome framebuffer.
//!
//! The buffer layout is MONO_HLSB: row-major, one bit per pixel, eight
//! pixels per byte with the most significant bit leftmost. Byte `i` of row
//! `j` lives at offset `i + j * width / 8`, which is exactly the order the
//! RAM burst wants.

use crate::{buffer_len, Error};

#[cfg(feature = "graphics")]
use embedded_graphics::{
    pixelcolor::BinaryColor,
    prelude::{OriginDimensions, Size},
    Pixel,
};

/// Native width of the 2.9" panel in pixels (source lines).
pub const EPD_2IN9_WIDTH: u16 = 128;
/// Native height of the 2.9" panel in pixels (gate lines).
pub const EPD_2IN9_HEIGHT: u16 = 296;
/// Framebuffer length of the 2.9" panel in either orientation.
pub const EPD_2IN9_BUFFER_LEN: usize =
    buffer_len(EPD_2IN9_WIDTH as usize, EPD_2IN9_HEIGHT as usize);

/// The 2.9" panel framebuffer, 4736 bytes.
pub type FrameBuffer2in9 = FrameBuffer<EPD_2IN9_BUFFER_LEN>;

/// How the caller addresses the panel. `Landscape` swaps width and height
/// at construction; everything downstream sees the swapped values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Panel dimensions after orientation is applied.
///
/// `gates` keeps the native gate-line count, which driver-output-control
/// needs regardless of orientation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    width: u16,
    height: u16,
    gates: u16,
}

impl Geometry {
    /// Build a geometry from native panel dimensions. Both must be
    /// non-zero multiples of 8; panel RAM rows are byte aligned and the
    /// low 3 bits of any horizontal coordinate are dropped on the wire.
    pub fn new(width: u16, height: u16, orientation: Orientation) -> Result<Self, Error> {
        if width == 0 || height == 0 || width % 8 != 0 || height % 8 != 0 {
            return Err(Error::BadGeometry);
        }
        let (w, h) = match orientation {
            Orientation::Portrait => (width, height),
            Orientation::Landscape => (height, width),
        };
        Ok(Geometry {
            width: w,
            height: h,
            gates: height,
        })
    }

    /// The 2.9" panel, 128 x 296 native.
    pub fn epd_2in9(orientation: Orientation) -> Self {
        match orientation {
            Orientation::Portrait => Geometry {
                width: EPD_2IN9_WIDTH,
                height: EPD_2IN9_HEIGHT,
                gates: EPD_2IN9_HEIGHT,
            },
            Orientation::Landscape => Geometry {
                width: EPD_2IN9_HEIGHT,
                height: EPD_2IN9_WIDTH,
                gates: EPD_2IN9_HEIGHT,
            },
        }
    }

    /// Width in pixels, orientation applied.
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Height in pixels, orientation applied.
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Native gate-line count, orientation independent.
    pub fn gates(&self) -> u16 {
        self.gates
    }

    /// Packed bytes per row.
    pub fn bytes_per_row(&self) -> usize {
        self.width as usize / 8
    }

    /// Total framebuffer length in bytes.
    pub fn buffer_len(&self) -> usize {
        self.bytes_per_row() * self.height as usize
    }
}

/// Panel ink. A set bit in the packed buffer is white, a cleared bit black.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    Black,
    White,
}

impl Color {
    /// The byte a solid row of this color packs to.
    pub fn byte_value(self) -> u8 {
        match self {
            Color::Black => 0x00,
            Color::White => 0xFF,
        }
    }
}

/// Packed 1-bit framebuffer, sized at the type level and checked against
/// its geometry at construction. The driver only ever reads it; painting
/// is the caller's business, through [`set_pixel`](Self::set_pixel),
/// [`as_mut_bytes`](Self::as_mut_bytes) or the `embedded-graphics`
/// `DrawTarget` impl.
#[derive(Clone)]
pub struct FrameBuffer<const N: usize> {
    buf: [u8; N],
    geometry: Geometry,
}

impl<const N: usize> FrameBuffer<N> {
    /// Create a white framebuffer for `geometry`. Fails with
    /// [`Error::BufferSize`] if `N` does not match the geometry.
    pub fn new(geometry: Geometry) -> Result<Self, Error> {
        if geometry.buffer_len() != N {
            return Err(Error::BufferSize {
                expected: geometry.buffer_len(),
                got: N,
            });
        }
        Ok(FrameBuffer {
            buf: [0xFF; N],
            geometry,
        })
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Raw packed bytes in RAM-burst order.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Mutable view for callers that rasterize externally.
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Flood the buffer with one color.
    pub fn fill(&mut self, color: Color) {
        self.buf.fill(color.byte_value());
    }

    /// Paint a single pixel. Out-of-range coordinates are ignored.
    pub fn set_pixel(&mut self, x: u16, y: u16, color: Color) {
        if x >= self.geometry.width || y >= self.geometry.height {
            return;
        }
        let byte_offset = y as usize * self.geometry.bytes_per_row() + x as usize / 8;
        let mask = 0x80 >> (x % 8);
        match color {
            Color::White => self.buf[byte_offset] |= mask,
            Color::Black => self.buf[byte_offset] &= !mask,
        }
    }

    /// Read a pixel back. Out-of-range coordinates read white.
    pub fn pixel(&self, x: u16, y: u16) -> Color {
        if x >= self.geometry.width || y >= self.geometry.height {
            return Color::White;
        }
        let byte_offset = y as usize * self.geometry.bytes_per_row() + x as usize / 8;
        if self.buf[byte_offset] & (0x80 >> (x % 8)) != 0 {
            Color::White
        } else {
            Color::Black
        }
    }
}

#[cfg(feature = "graphics")]
impl<const N: usize> OriginDimensions for FrameBuffer<N> {
    fn size(&self) -> Size {
        Size::new(self.geometry.width as u32, self.geometry.height as u32)
    }
}

/// `BinaryColor::On` draws black ink, `Off` restores white, following the
/// `use BinaryColor::On as Black` convention of the e-paper crates.
#[cfg(feature = "graphics")]
impl<const N: usize> embedded_graphics::draw_target::DrawTarget for FrameBuffer<N> {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let ink = if color.is_on() {
                Color::Black
            } else {
                Color::White
            };
            self.set_pixel(point.x as u16, point.y as u16, ink);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_rejects_unaligned_dimensions() {
        assert_eq!(
            Geometry::new(130, 296, Orientation::Portrait),
            Err(Error::BadGeometry)
        );
        assert_eq!(
            Geometry::new(128, 300, Orientation::Portrait),
            Err(Error::BadGeometry)
        );
        assert_eq!(
            Geometry::new(0, 296, Orientation::Portrait),
            Err(Error::BadGeometry)
        );
    }

    #[test]
    fn landscape_swaps_dimensions_but_keeps_gates() {
        let g = Geometry::epd_2in9(Orientation::Landscape);
        assert_eq!(g.width(), 296);
        assert_eq!(g.height(), 128);
        assert_eq!(g.gates(), 296);
        assert_eq!(g.buffer_len(), 4736);

        let p = Geometry::epd_2in9(Orientation::Portrait);
        assert_eq!(p.width(), 128);
        assert_eq!(p.height(), 296);
        assert_eq!(p.gates(), 296);
        assert_eq!(p.buffer_len(), 4736);
    }

    #[test]
    fn buffer_length_matches_geometry() {
        let g = Geometry::epd_2in9(Orientation::Portrait);
        assert_eq!(g.buffer_len(), EPD_2IN9_BUFFER_LEN);

        let fb = FrameBuffer2in9::new(g).unwrap();
        assert_eq!(fb.as_bytes().len(), 4736);
    }

    #[test]
    fn mismatched_const_size_is_rejected() {
        let g = Geometry::epd_2in9(Orientation::Portrait);
        let r = FrameBuffer::<16>::new(g);
        assert_eq!(
            r.err(),
            Some(Error::BufferSize {
                expected: 4736,
                got: 16
            })
        );
    }

    #[test]
    fn starts_white() {
        let g = Geometry::epd_2in9(Orientation::Portrait);
        let fb = FrameBuffer2in9::new(g).unwrap();
        assert!(fb.as_bytes().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn set_pixel_bit_placement() {
        let g = Geometry::epd_2in9(Orientation::Portrait);
        let mut fb = FrameBuffer2in9::new(g).unwrap();

        fb.set_pixel(0, 0, Color::Black);
        assert_eq!(fb.as_bytes()[0], 0x7F);

        fb.set_pixel(7, 0, Color::Black);
        assert_eq!(fb.as_bytes()[0], 0x7E);

        // Byte i of row j lands at i + j * width/8.
        fb.set_pixel(8, 2, Color::Black);
        assert_eq!(fb.as_bytes()[2 * 16 + 1], 0x7F);

        fb.set_pixel(0, 0, Color::White);
        assert_eq!(fb.as_bytes()[0], 0xFE);
    }

    #[test]
    fn pixel_reads_back() {
        let g = Geometry::epd_2in9(Orientation::Portrait);
        let mut fb = FrameBuffer2in9::new(g).unwrap();
        assert_eq!(fb.pixel(3, 5), Color::White);
        fb.set_pixel(3, 5, Color::Black);
        assert_eq!(fb.pixel(3, 5), Color::Black);
    }

    #[test]
    fn out_of_range_paint_is_ignored() {
        let g = Geometry::epd_2in9(Orientation::Portrait);
        let mut fb = FrameBuffer2in9::new(g).unwrap();
        fb.set_pixel(128, 0, Color::Black);
        fb.set_pixel(0, 296, Color::Black);
        assert!(fb.as_bytes().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn fill_packs_solid_bytes() {
        let g = Geometry::epd_2in9(Orientation::Portrait);
        let mut fb = FrameBuffer2in9::new(g).unwrap();
        fb.fill(Color::Black);
        assert!(fb.as_bytes().iter().all(|&b| b == 0x00));
    }

    #[cfg(feature = "graphics")]
    #[test]
    fn draw_target_maps_on_to_black() {
        use embedded_graphics::prelude::*;

        let g = Geometry::epd_2in9(Orientation::Portrait);
        let mut fb = FrameBuffer2in9::new(g).unwrap();

        Pixel(Point::new(1, 0), BinaryColor::On)
            .draw(&mut fb)
            .unwrap();
        assert_eq!(fb.pixel(1, 0), Color::Black);

        Pixel(Point::new(1, 0), BinaryColor::Off)
            .draw(&mut fb)
            .unwrap();
        assert_eq!(fb.pixel(1, 0), Color::White);

        assert_eq!(fb.size(), Size::new(128, 296));
    }
}
