//! The refresh state machine for the 2.9" panel.
//!
//! The controller exposes two RAM banks and two update sequences. A full
//! refresh streams the framebuffer into bank A and runs the factory
//! waveform (selector 0xF7). A partial refresh first loads the vendor
//! waveform table, then diffs bank A against the baseline held in bank B
//! (selector 0x0F). [`Epd2in9::display_base`] writes both banks so a later
//! partial refresh has a correct baseline.
//!
//! Macro-states run uninitialized -> active -> deep sleep. Deep sleep is
//! terminal until [`Epd2in9::prepare_display`] pulses the reset line again.

use core::iter;

use embedded_hal::blocking::delay::DelayUs;
use log::{debug, trace};

use crate::command::Command;
use crate::framebuffer::{Color, FrameBuffer, Geometry};
use crate::interface::DisplayInterface;
use crate::Error;

/// Hardware reset pulse, high/low/high. The panel wants generous settling
/// around the low phase at power-on.
const HARD_RESET_SETTLE_US: u32 = 50_000;
const HARD_RESET_LOW_US: u32 = 2_000;

/// The short pulse that precedes a partial refresh. Re-syncs the
/// controller without a full power-on reset.
const SOFT_RESET_LOW_US: u32 = 2_000;
const SOFT_RESET_SETTLE_US: u32 = 2_000;

/// Dwell after the deep-sleep command before cutting the reset rail.
const DEEP_SLEEP_SETTLE_US: u32 = 2_000_000;

/// Update-sequence selectors for DisplayUpdateControl2.
const UPDATE_SEQUENCE_FULL: u8 = 0xF7;
const UPDATE_SEQUENCE_PARTIAL: u8 = 0x0F;
const UPDATE_SEQUENCE_LOAD_LUT: u8 = 0xC0;

/// Busy-poll interval of the vendor reference sequence.
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 10;
/// A full refresh of this panel takes around 2 s; 10 s leaves margin
/// without letting a stuck busy line hang the caller forever.
pub const DEFAULT_BUSY_TIMEOUT_MS: u32 = 10_000;

/// Vendor waveform table for partial refresh. Loaded wholesale via 0x32
/// before every partial refresh; full refresh never touches it.
#[rustfmt::skip]
pub const WF_PARTIAL_2IN9: [u8; 153] = [
    0x00, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x80, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x40, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x0A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x00, 0x00, 0x00,
];

/// How [`Epd2in9`] polls the busy line.
///
/// The protocol is open-loop, so a stuck busy input is the only observable
/// failure the panel can produce. Rather than looping forever the driver
/// gives up after `timeout_ms` and returns [`Error::SyncTimeout`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusyPolicy {
    /// Sleep between samples of the busy line, in milliseconds.
    pub poll_interval_ms: u32,
    /// Total budget before giving up, in milliseconds.
    pub timeout_ms: u32,
}

impl Default for BusyPolicy {
    fn default() -> Self {
        BusyPolicy {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PowerState {
    Uninitialized,
    Active,
    Asleep,
}

/// Driver for the Waveshare 2.9" panel.
///
/// Owns the bus interface and the three macro-states; the framebuffer is a
/// separate value the caller paints and passes in by reference. All
/// operations are blocking and must be serialized by the caller; the
/// driver takes no locks.
pub struct Epd2in9<DI> {
    pub interface: DI,
    geometry: Geometry,
    policy: BusyPolicy,
    state: PowerState,
}

impl<DI: DisplayInterface> Epd2in9<DI> {
    /// Wrap an interface. The panel stays untouched until
    /// [`prepare_display`](Self::prepare_display).
    pub fn new(interface: DI, geometry: Geometry) -> Self {
        Epd2in9 {
            interface,
            geometry,
            policy: BusyPolicy::default(),
            state: PowerState::Uninitialized,
        }
    }

    /// Replace the default busy-polling policy.
    pub fn with_busy_policy(mut self, policy: BusyPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Consume the driver and hand back the interface.
    pub fn release(self) -> DI {
        self.interface
    }

    /// Hardware reset and init sequence. Must complete before any refresh
    /// call; also the only way back from deep sleep.
    pub fn prepare_display<D>(&mut self, delay: &mut D) -> Result<(), Error>
    where
        D: DelayUs<u32>,
    {
        debug!("preparing display");
        self.interface
            .reset(delay, HARD_RESET_SETTLE_US, HARD_RESET_LOW_US, HARD_RESET_SETTLE_US);
        self.wait_free(delay)?;

        self.command(Command::SwReset)?;
        self.wait_free(delay)?;

        let gates = self.geometry.gates() - 1;
        self.command_data(
            Command::DriverOutputControl,
            &[(gates & 0xFF) as u8, (gates >> 8) as u8, 0x00],
        )?;

        // Y increment, X increment, counter advances along X
        self.command_data(Command::DataEntryModeSetting, &[0x03])?;

        self.set_window(0, 0, self.geometry.width() - 1, self.geometry.height() - 1)?;

        self.command_data(Command::DisplayUpdateControl1, &[0x00, 0x80])?;

        self.set_cursor(0, 0, delay)?;
        self.wait_free(delay)?;

        self.state = PowerState::Active;
        Ok(())
    }

    /// Full refresh: stream the framebuffer into bank A and run the
    /// factory waveform. Slow and flickering, but resets contrast.
    pub fn display_image<D, const N: usize>(
        &mut self,
        image: Option<&FrameBuffer<N>>,
        delay: &mut D,
    ) -> Result<(), Error>
    where
        D: DelayUs<u32>,
    {
        let image = self.check_image(image)?;
        self.require_active()?;
        debug!("full refresh");

        self.command(Command::WriteRam)?;
        self.interface.send_data(image.as_bytes())?;

        self.activate(false, delay)
    }

    /// Write the framebuffer to both RAM banks and run a full refresh.
    ///
    /// The identical second burst into bank B makes "old" equal "new", so
    /// the next partial refresh diffs against a correct baseline.
    pub fn display_base<D, const N: usize>(
        &mut self,
        image: Option<&FrameBuffer<N>>,
        delay: &mut D,
    ) -> Result<(), Error>
    where
        D: DelayUs<u32>,
    {
        let image = self.check_image(image)?;
        self.require_active()?;
        debug!("base refresh");

        self.command(Command::WriteRam)?;
        self.interface.send_data(image.as_bytes())?;

        self.command(Command::WriteRamBase)?;
        self.interface.send_data(image.as_bytes())?;

        self.activate(false, delay)
    }

    /// Partial refresh: load the vendor waveform table and update without
    /// the full flicker. Ghosts accumulate; run
    /// [`display_base`](Self::display_base) or a full refresh occasionally.
    ///
    /// The vendor sequence writes selector 0xC0 before the LUT-load
    /// activation and 0x0F for the refresh itself; both writes are kept in
    /// that order.
    pub fn display_partial<D, const N: usize>(
        &mut self,
        image: Option<&FrameBuffer<N>>,
        delay: &mut D,
    ) -> Result<(), Error>
    where
        D: DelayUs<u32>,
    {
        let image = self.check_image(image)?;
        self.require_active()?;
        debug!("partial refresh");

        self.interface
            .reset(delay, 0, SOFT_RESET_LOW_US, SOFT_RESET_SETTLE_US);

        self.send_lut(delay)?;

        self.command_data(
            Command::DisplayOptionControl,
            &[0x00, 0x00, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x00, 0x00],
        )?;
        self.command_data(Command::BorderWaveformControl, &[0x80])?;

        // Power the analog stage so the freshly loaded LUT takes effect.
        self.command_data(Command::DisplayUpdateControl2, &[UPDATE_SEQUENCE_LOAD_LUT])?;
        self.command(Command::MasterActivation)?;
        self.wait_free(delay)?;

        self.set_window(0, 0, self.geometry.width() - 1, self.geometry.height() - 1)?;
        self.set_cursor(0, 0, delay)?;

        self.command(Command::WriteRam)?;
        self.interface.send_data(image.as_bytes())?;

        self.activate(true, delay)
    }

    /// Blank the panel to a solid color without a framebuffer.
    pub fn clear<D>(&mut self, color: Color, delay: &mut D) -> Result<(), Error>
    where
        D: DelayUs<u32>,
    {
        self.require_active()?;
        debug!("clearing panel");

        let byte = color.byte_value();
        self.command(Command::WriteRam)?;
        self.interface
            .send_data_from_iter(iter::repeat(&byte).take(self.geometry.buffer_len()))?;

        self.activate(false, delay)
    }

    /// Enter deep sleep and cut the reset rail. Terminal: only
    /// [`prepare_display`](Self::prepare_display) brings the panel back.
    pub fn power_down<D>(&mut self, delay: &mut D) -> Result<(), Error>
    where
        D: DelayUs<u32>,
    {
        self.require_active()?;
        debug!("entering deep sleep");

        self.command_data(Command::DeepSleepMode, &[0x01])?;
        delay.delay_us(DEEP_SLEEP_SETTLE_US);
        self.interface.power_off();

        self.state = PowerState::Asleep;
        Ok(())
    }

    fn command(&mut self, command: Command) -> Result<(), Error> {
        self.interface.send_command(command as u8)
    }

    fn command_data(&mut self, command: Command, data: &[u8]) -> Result<(), Error> {
        self.interface.send_command_data(command as u8, data)
    }

    fn require_active(&self) -> Result<(), Error> {
        if self.state == PowerState::Active {
            Ok(())
        } else {
            Err(Error::InvalidState)
        }
    }

    fn check_image<'a, const N: usize>(
        &self,
        image: Option<&'a FrameBuffer<N>>,
    ) -> Result<&'a FrameBuffer<N>, Error> {
        let image = image.ok_or(Error::MissingImage)?;
        if image.geometry() != self.geometry {
            return Err(Error::GeometryMismatch);
        }
        Ok(image)
    }

    /// Poll the busy line until it reads idle, per the configured policy.
    fn wait_free<D>(&mut self, delay: &mut D) -> Result<(), Error>
    where
        D: DelayUs<u32>,
    {
        let step = self.policy.poll_interval_ms.max(1);
        let mut waited_ms = 0;
        while self.interface.is_busy() {
            if waited_ms >= self.policy.timeout_ms {
                return Err(Error::SyncTimeout);
            }
            delay.delay_us(step * 1_000);
            waited_ms += step;
        }
        Ok(())
    }

    /// Configure the RAM write window. X coordinates are transmitted in
    /// byte units; the low 3 bits drop off. Geometry can be pipelined, so
    /// no busy wait here.
    fn set_window(&mut self, x_start: u16, y_start: u16, x_end: u16, y_end: u16) -> Result<(), Error> {
        trace!("window x {}-{} y {}-{}", x_start, x_end, y_start, y_end);
        self.command_data(
            Command::SetRamXAddressStartEndPosition,
            &[(x_start >> 3) as u8, (x_end >> 3) as u8],
        )?;
        self.command_data(
            Command::SetRamYAddressStartEndPosition,
            &[
                (y_start & 0xFF) as u8,
                (y_start >> 8) as u8,
                (y_end & 0xFF) as u8,
                (y_end >> 8) as u8,
            ],
        )
    }

    /// Place the RAM write cursor. This is the synchronization point
    /// before a burst, so it ends on a busy wait.
    fn set_cursor<D>(&mut self, x: u16, y: u16, delay: &mut D) -> Result<(), Error>
    where
        D: DelayUs<u32>,
    {
        trace!("cursor {},{}", x, y);
        self.command_data(Command::SetRamXAddressCounter, &[(x & 0xFF) as u8])?;
        self.command_data(
            Command::SetRamYAddressCounter,
            &[(y & 0xFF) as u8, (y >> 8) as u8],
        )?;
        self.wait_free(delay)
    }

    fn send_lut<D>(&mut self, delay: &mut D) -> Result<(), Error>
    where
        D: DelayUs<u32>,
    {
        self.command(Command::WriteLutRegister)?;
        self.interface.send_data(&WF_PARTIAL_2IN9)?;
        self.wait_free(delay)
    }

    /// Trigger the update sequence selected by `partial` and block until
    /// the panel settles.
    fn activate<D>(&mut self, partial: bool, delay: &mut D) -> Result<(), Error>
    where
        D: DelayUs<u32>,
    {
        let sequence = if partial {
            UPDATE_SEQUENCE_PARTIAL
        } else {
            UPDATE_SEQUENCE_FULL
        };
        self.command_data(Command::DisplayUpdateControl2, &[sequence])?;
        self.command(Command::MasterActivation)?;
        self.wait_free(delay)
    }
}
