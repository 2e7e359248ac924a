//! SPI driver for the Waveshare 2.9" e-Paper display (SSD1680-class controller).
//!
//! - Built on [`embedded-hal`] 0.2 blocking traits.
//! - Optional [`embedded-graphics`] `DrawTarget` support behind the
//!   default-on `graphics` feature.
//!
//! The panel is driven over a write-only synchronous serial link with
//! separate chip-select and data/command lines, plus a reset output and a
//! busy input. Every byte is individually framed by chip-select. The panel
//! offers two refresh paths: a full refresh using the controller's factory
//! waveform (slow, flickering, reliable) and a partial refresh driven by a
//! vendor 153-byte waveform table (fast, prone to ghosting, needs an
//! occasional full or base refresh to reset contrast).
//!
//! # Example
//!
//! ```rust, ignore
//! use epd2in9ws::prelude::*;
//!
//! let interface = EpdInterface::new(spi, cs, dc, rst, busy);
//! let geometry = Geometry::epd_2in9(Orientation::Portrait);
//! let mut epd = Epd2in9::new(interface, geometry);
//! let mut frame = FrameBuffer2in9::new(geometry)?;
//!
//! epd.prepare_display(&mut delay)?;
//! epd.clear(Color::White, &mut delay)?;
//!
//! frame.set_pixel(10, 20, Color::Black);
//! epd.display_image(Some(&frame), &mut delay)?;
//!
//! epd.power_down(&mut delay)?;
//! ```
//!
//! [`embedded-graphics`]: https://docs.rs/embedded-graphics/
//! [`embedded-hal`]: https://docs.rs/embedded-hal

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod command;
pub mod driver;
pub mod framebuffer;
pub mod interface;

pub use driver::{BusyPolicy, Epd2in9};
pub use framebuffer::{Color, FrameBuffer, FrameBuffer2in9, Geometry, Orientation};
pub use interface::{DisplayInterface, EpdInterface};

/// Everything needed to drive a panel.
pub mod prelude {
    pub use crate::driver::{BusyPolicy, Epd2in9};
    pub use crate::framebuffer::{Color, FrameBuffer, FrameBuffer2in9, Geometry, Orientation};
    pub use crate::interface::{DisplayInterface, EpdInterface};
    pub use crate::{Error, SPI_CLOCK_HZ, SPI_MODE};
}

use embedded_hal::spi::{Mode, Phase, Polarity};

/// SPI mode 0 (CPOL = 0, CPHA = 0), 8 bits per word, MSB first.
pub const SPI_MODE: Mode = Mode {
    phase: Phase::CaptureOnFirstTransition,
    polarity: Polarity::IdleLow,
};

/// Nominal SPI clock rate. The controller is happy at 4 MHz; configure the
/// SPI peripheral accordingly, the driver itself has no say in the rate.
pub const SPI_CLOCK_HZ: u32 = 4_000_000;

/// Computes the needed framebuffer length in bytes for a panel that is
/// `width` x `height` pixels. Both dimensions must be byte aligned; the
/// panel RAM has no notion of a ragged row.
pub const fn buffer_len(width: usize, height: usize) -> usize {
    width / 8 * height
}

/// Errors surfaced by the driver.
///
/// The protocol is write-only: the panel never acknowledges a transfer, so
/// `Transport` reports host-side failures (SPI or control-line writes) and
/// `SyncTimeout` is the only way a wedged panel becomes observable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// An SPI write or a control-line toggle failed. Fatal; the panel state
    /// is unknown afterwards.
    Transport,
    /// The busy line stayed asserted past the configured polling budget.
    SyncTimeout,
    /// A refresh was requested without an image.
    MissingImage,
    /// Width or height is not a multiple of 8.
    BadGeometry,
    /// The framebuffer length does not match its geometry.
    BufferSize {
        /// Bytes the geometry calls for.
        expected: usize,
        /// Bytes actually supplied.
        got: usize,
    },
    /// The framebuffer was rasterized for a different geometry than the
    /// driver's.
    GeometryMismatch,
    /// The operation is not valid in the panel's current power state.
    InvalidState,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Transport => write!(f, "SPI or control-line write failed"),
            Error::SyncTimeout => write!(f, "busy line did not settle in time"),
            Error::MissingImage => write!(f, "no image supplied"),
            Error::BadGeometry => write!(f, "width and height must be multiples of 8"),
            Error::BufferSize { expected, got } => {
                write!(f, "buffer holds {} bytes, geometry needs {}", got, expected)
            }
            Error::GeometryMismatch => write!(f, "framebuffer geometry differs from panel"),
            Error::InvalidState => write!(f, "operation invalid in current power state"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn buffer_len_is_byte_packed() {
        assert_eq!(buffer_len(128, 296), 4736);
        assert_eq!(buffer_len(296, 128), 4736);
        assert_eq!(buffer_len(8, 1), 1);
    }

    #[test]
    fn error_display_format() {
        assert_eq!(Error::MissingImage.to_string(), "no image supplied");
        assert_eq!(
            Error::BufferSize {
                expected: 4736,
                got: 16
            }
            .to_string(),
            "buffer holds 16 bytes, geometry needs 4736"
        );
    }
}
