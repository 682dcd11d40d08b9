//! Seam between the firmware core and the board's USB device stack.
use xvcpico_wire::PACKET_SIZE;

/// The vendor-class interface the host bridge talks to.
pub trait VendorEndpoint {
    /// Gives the USB device stack a chance to run. Must not be called while a received packet
    /// is still waiting to be read, otherwise the stack may merge it with the next one.
    fn poll(&mut self);

    /// Whether an OUT packet is waiting.
    fn available(&mut self) -> bool;

    /// Moves one OUT packet into `buf` and returns its length.
    fn read_packet(&mut self, buf: &mut [u8; PACKET_SIZE]) -> usize;

    /// Queues `data` on the IN endpoint and flushes it to the host.
    fn write_packet(&mut self, data: &[u8]);
}

/// Destination of the TDO bytes of a shifted chunk.
pub trait TdoSink {
    fn send_tdo(&mut self, tdo: &[u8]);
}

impl<T: VendorEndpoint> TdoSink for T {
    fn send_tdo(&mut self, tdo: &[u8]) {
        self.write_packet(tdo)
    }
}
