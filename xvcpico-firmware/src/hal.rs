//! Hardware abstraction for the JTAG lines.
//!
//! The shifting code only ever needs to drive TCK, TMS and TDI together, sample TDO and wait.
//! [`GpioJtag`] provides this on top of `embedded-hal` pins for real boards.
use embedded_hal::{
    delay::DelayNs,
    digital::{Error as _, ErrorKind, InputPin, OutputPin, PinState},
};

pub use xvcpico_wire::Signals;

/// Line levels applied at reset: clock low, TMS high, TDI low.
pub const IDLE_SIGNALS: Signals = Signals::new(false, true, false);

pub trait JtagPins {
    type Error: core::fmt::Debug;

    /// Drives TCK, TMS and TDI to the given levels.
    fn set_signals(&mut self, signals: Signals) -> Result<(), Self::Error>;

    /// Samples TDO.
    fn read_signal(&mut self) -> Result<bool, Self::Error>;

    /// Waits for `cycles` delay units.
    fn delay_cycles(&mut self, cycles: u32);
}

/// JTAG lines backed by four GPIO pins and a delay provider.
pub struct GpioJtag<Tck, Tms, Tdi, Tdo, Delay>
where
    Tck: OutputPin,
    Tms: OutputPin,
    Tdi: OutputPin,
    Tdo: InputPin,
    Delay: DelayNs,
{
    tck: Tck,
    tms: Tms,
    tdi: Tdi,
    tdo: Tdo,
    delay: Delay,
    cycle_ns: u32,
}

impl<Tck, Tms, Tdi, Tdo, Delay> GpioJtag<Tck, Tms, Tdi, Tdo, Delay>
where
    Tck: OutputPin,
    Tms: OutputPin,
    Tdi: OutputPin,
    Tdo: InputPin,
    Delay: DelayNs,
{
    /// `cycle_ns` is the length of one delay unit in nanoseconds.
    pub fn new(tck: Tck, tms: Tms, tdi: Tdi, tdo: Tdo, delay: Delay, cycle_ns: u32) -> Self {
        GpioJtag {
            tck,
            tms,
            tdi,
            tdo,
            delay,
            cycle_ns,
        }
    }

    pub fn release(self) -> (Tck, Tms, Tdi, Tdo, Delay) {
        (self.tck, self.tms, self.tdi, self.tdo, self.delay)
    }
}

impl<Tck, Tms, Tdi, Tdo, Delay> JtagPins for GpioJtag<Tck, Tms, Tdi, Tdo, Delay>
where
    Tck: OutputPin,
    Tms: OutputPin,
    Tdi: OutputPin,
    Tdo: InputPin,
    Delay: DelayNs,
{
    type Error = ErrorKind;

    fn set_signals(&mut self, signals: Signals) -> Result<(), ErrorKind> {
        // Data lines first so they are settled when the clock moves.
        self.tms
            .set_state(PinState::from(signals.tms))
            .map_err(|e| e.kind())?;
        self.tdi
            .set_state(PinState::from(signals.tdi))
            .map_err(|e| e.kind())?;
        self.tck
            .set_state(PinState::from(signals.tck))
            .map_err(|e| e.kind())
    }

    fn read_signal(&mut self) -> Result<bool, ErrorKind> {
        self.tdo.is_high().map_err(|e| e.kind())
    }

    fn delay_cycles(&mut self, cycles: u32) {
        self.delay.delay_ns(cycles.saturating_mul(self.cycle_ns));
    }
}
