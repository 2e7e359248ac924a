//! The display interface: command/data framing over SPI plus the reset and
//! busy control lines.

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::digital::v2::{InputPin, OutputPin};

use crate::Error;

/// Trait implemented by transports to provide the core wire operations.
///
/// Every panel interaction is exactly one command byte optionally followed
/// by data bytes. The transport owns the three control outputs and the busy
/// input; nothing else may drive them.
pub trait DisplayInterface {
    fn send_command_data(&mut self, command: u8, data: &[u8]) -> Result<(), Error> {
        self.send_command(command)?;
        self.send_data(data)?;
        Ok(())
    }

    /// Send a command byte to the controller.
    fn send_command(&mut self, command: u8) -> Result<(), Error>;

    /// Send data for a command.
    fn send_data(&mut self, data: &[u8]) -> Result<(), Error>;

    /// Send data via iter. Returns the number of bytes written.
    fn send_data_from_iter<'a, I>(&mut self, iter: I) -> Result<usize, Error>
    where
        I: IntoIterator<Item = &'a u8>;

    /// Sample the busy line. `true` while the controller is mid-operation.
    fn is_busy(&mut self) -> bool;

    /// Pulse the reset line: high for `high_us`, low for `low_us`, then
    /// high again and settle for `settle_us`.
    fn reset<D>(&mut self, delay: &mut D, high_us: u32, low_us: u32, settle_us: u32)
    where
        D: DelayUs<u32>;

    /// Drive the reset line low and leave it there, cutting panel power.
    fn power_off(&mut self);
}

/// SPI display interface with dedicated chip-select.
///
/// Chip-select framing is symmetric around each individual byte; the
/// controller does not accept multi-byte bursts under one assertion.
pub struct EpdInterface<SPI, CS, DC, RST, BUSY> {
    spi: SPI,
    cs: CS,
    dc: DC,
    rst: RST,
    busy: BUSY,
}

impl<SPI, CS, DC, RST, BUSY> EpdInterface<SPI, CS, DC, RST, BUSY>
where
    SPI: embedded_hal::blocking::spi::Write<u8>,
    CS: OutputPin,
    DC: OutputPin,
    RST: OutputPin,
    BUSY: InputPin,
{
    pub fn new(spi: SPI, cs: CS, dc: DC, rst: RST, busy: BUSY) -> Self {
        EpdInterface {
            spi,
            cs,
            dc,
            rst,
            busy,
        }
    }

    /// Consume the display interface and return the underlying peripheral
    /// driver and GPIO pins used by it.
    pub fn release(self) -> (SPI, CS, DC, RST, BUSY) {
        (self.spi, self.cs, self.dc, self.rst, self.busy)
    }

    /// Transfer one byte inside its own chip-select frame. D/C must already
    /// be at the right level.
    fn write_byte(&mut self, byte: u8) -> Result<(), Error> {
        self.cs.set_low().map_err(|_| Error::Transport)?;

        let ret = self.spi.write(&[byte]).map_err(|_| Error::Transport);

        // Deassert even when the write failed.
        self.cs.set_high().ok();

        ret
    }
}

impl<SPI, CS, DC, RST, BUSY> DisplayInterface for EpdInterface<SPI, CS, DC, RST, BUSY>
where
    SPI: embedded_hal::blocking::spi::Write<u8>,
    CS: OutputPin,
    DC: OutputPin,
    RST: OutputPin,
    BUSY: InputPin,
{
    fn send_command(&mut self, command: u8) -> Result<(), Error> {
        // 1 = data, 0 = command
        self.dc.set_low().map_err(|_| Error::Transport)?;
        self.write_byte(command)
    }

    fn send_data(&mut self, data: &[u8]) -> Result<(), Error> {
        self.dc.set_high().map_err(|_| Error::Transport)?;
        for &byte in data {
            self.write_byte(byte)?;
        }
        Ok(())
    }

    fn send_data_from_iter<'a, I>(&mut self, iter: I) -> Result<usize, Error>
    where
        I: IntoIterator<Item = &'a u8>,
    {
        self.dc.set_high().map_err(|_| Error::Transport)?;

        let mut n = 0;
        for &byte in iter {
            self.write_byte(byte)?;
            n += 1;
        }

        Ok(n)
    }

    fn is_busy(&mut self) -> bool {
        // Pulled up: 0 = idle, 1 = busy.
        self.busy.is_high().unwrap_or(false)
    }

    fn reset<D>(&mut self, delay: &mut D, high_us: u32, low_us: u32, settle_us: u32)
    where
        D: DelayUs<u32>,
    {
        let _ = self.rst.set_high();
        delay.delay_us(high_us);

        let _ = self.rst.set_low();
        delay.delay_us(low_us);

        let _ = self.rst.set_high();
        delay.delay_us(settle_us);
    }

    fn power_off(&mut self) {
        let _ = self.rst.set_low();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use embedded_hal_mock::delay::MockNoop;
    use embedded_hal_mock::pin::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };
    use embedded_hal_mock::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    fn interface(
        spi: &[SpiTransaction],
        cs: &[PinTransaction],
        dc: &[PinTransaction],
        rst: &[PinTransaction],
    ) -> EpdInterface<SpiMock, PinMock, PinMock, PinMock, PinMock> {
        EpdInterface::new(
            SpiMock::new(spi),
            PinMock::new(cs),
            PinMock::new(dc),
            PinMock::new(rst),
            PinMock::new(&[]),
        )
    }

    fn finish(iface: EpdInterface<SpiMock, PinMock, PinMock, PinMock, PinMock>) {
        let (mut spi, mut cs, mut dc, mut rst, mut busy) = iface.release();
        spi.done();
        cs.done();
        dc.done();
        rst.done();
        busy.done();
    }

    #[test]
    fn command_framing() {
        let mut iface = interface(
            &[SpiTransaction::write(vec![0x12])],
            &[
                PinTransaction::set(PinState::Low),
                PinTransaction::set(PinState::High),
            ],
            &[PinTransaction::set(PinState::Low)],
            &[],
        );

        iface.send_command(0x12).unwrap();
        finish(iface);
    }

    #[test]
    fn data_bytes_are_individually_framed() {
        let mut iface = interface(
            &[
                SpiTransaction::write(vec![0xAA]),
                SpiTransaction::write(vec![0x55]),
            ],
            &[
                PinTransaction::set(PinState::Low),
                PinTransaction::set(PinState::High),
                PinTransaction::set(PinState::Low),
                PinTransaction::set(PinState::High),
            ],
            &[PinTransaction::set(PinState::High)],
            &[],
        );

        iface.send_data(&[0xAA, 0x55]).unwrap();
        finish(iface);
    }

    #[test]
    fn command_data_sets_both_dc_levels() {
        let mut iface = interface(
            &[
                SpiTransaction::write(vec![0x3C]),
                SpiTransaction::write(vec![0x80]),
            ],
            &[
                PinTransaction::set(PinState::Low),
                PinTransaction::set(PinState::High),
                PinTransaction::set(PinState::Low),
                PinTransaction::set(PinState::High),
            ],
            &[
                PinTransaction::set(PinState::Low),
                PinTransaction::set(PinState::High),
            ],
            &[],
        );

        iface.send_command_data(0x3C, &[0x80]).unwrap();
        finish(iface);
    }

    #[test]
    fn data_from_iter_counts_bytes() {
        let mut iface = interface(
            &[
                SpiTransaction::write(vec![0xFF]),
                SpiTransaction::write(vec![0xFF]),
                SpiTransaction::write(vec![0xFF]),
            ],
            &[
                PinTransaction::set(PinState::Low),
                PinTransaction::set(PinState::High),
                PinTransaction::set(PinState::Low),
                PinTransaction::set(PinState::High),
                PinTransaction::set(PinState::Low),
                PinTransaction::set(PinState::High),
            ],
            &[PinTransaction::set(PinState::High)],
            &[],
        );

        let n = iface
            .send_data_from_iter(core::iter::repeat(&0xFF).take(3))
            .unwrap();
        assert_eq!(n, 3);
        finish(iface);
    }

    #[test]
    fn reset_pulses_high_low_high() {
        let mut iface = interface(
            &[],
            &[],
            &[],
            &[
                PinTransaction::set(PinState::High),
                PinTransaction::set(PinState::Low),
                PinTransaction::set(PinState::High),
            ],
        );

        iface.reset(&mut MockNoop::new(), 50_000, 2_000, 50_000);
        finish(iface);
    }

    #[test]
    fn power_off_holds_reset_low() {
        let mut iface = interface(&[], &[], &[], &[PinTransaction::set(PinState::Low)]);

        iface.power_off();
        finish(iface);
    }
}
