//! Software stand-in for a target: TDO follows one of the driven lines.
use core::convert::Infallible;

use crate::hal::{JtagPins, Signals};

/// Which driven line TDO reflects.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LoopbackSource {
    Tdi,
    Tms,
}

#[derive(Clone, Debug)]
pub struct LoopbackPins {
    source: LoopbackSource,
    signals: Signals,
    rising_edges: u32,
    writes: u32,
    delayed: u64,
}

impl LoopbackPins {
    pub fn new(source: LoopbackSource) -> LoopbackPins {
        LoopbackPins {
            source,
            signals: Signals::default(),
            rising_edges: 0,
            writes: 0,
            delayed: 0,
        }
    }

    /// Levels currently driven.
    pub fn signals(&self) -> Signals {
        self.signals
    }

    /// Number of low to high transitions seen on TCK.
    pub fn rising_edges(&self) -> u32 {
        self.rising_edges
    }

    /// Number of `set_signals` calls.
    pub fn writes(&self) -> u32 {
        self.writes
    }

    /// Sum of all requested delay cycles.
    pub fn delayed(&self) -> u64 {
        self.delayed
    }
}

impl JtagPins for LoopbackPins {
    type Error = Infallible;

    fn set_signals(&mut self, signals: Signals) -> Result<(), Infallible> {
        if signals.tck && !self.signals.tck {
            self.rising_edges += 1;
        }
        self.signals = signals;
        self.writes += 1;
        Ok(())
    }

    fn read_signal(&mut self) -> Result<bool, Infallible> {
        Ok(match self.source {
            LoopbackSource::Tdi => self.signals.tdi,
            LoopbackSource::Tms => self.signals.tms,
        })
    }

    fn delay_cycles(&mut self, cycles: u32) {
        self.delayed += u64::from(cycles);
    }
}
