//! Slot handoff for boards that receive USB packets on one core and shift on another.
//!
//! The queue storage doubles as the slot array: a slot is busy from `enqueue` on the receiving
//! side until `dequeue` on the processing side, and the processing side parses the packet in
//! place through `peek`. Nothing else is shared between the two sides.
//!
//! ```ignore
//! static mut QUEUE: SlotQueue = SlotQueue::new();
//!
//! let (mut receiver, mut processor) = handoff::split(unsafe { &mut *addr_of_mut!(QUEUE) });
//! // core 0
//! loop { receiver.poll(&mut usb); }
//! // core 1
//! loop { processor.process_next(&mut parser, &mut pins, &mut tdo_sink)?; }
//! ```
use heapless::spsc::{Consumer, Producer, Queue};
use xvcpico_wire::PACKET_SIZE;

use crate::{
    hal::JtagPins,
    parser::{CommandParser, PacketOutcome},
    scheduler::SLOT_COUNT,
    usb::{TdoSink, VendorEndpoint},
};

/// A `heapless` queue of `N` holds `N - 1` elements.
pub const QUEUE_DEPTH: usize = SLOT_COUNT + 1;

pub type SlotQueue = Queue<Packet, QUEUE_DEPTH>;

#[derive(Clone, Debug)]
pub struct Packet {
    len: u8,
    data: [u8; PACKET_SIZE],
}

impl Packet {
    const EMPTY: Packet = Packet {
        len: 0,
        data: [0; PACKET_SIZE],
    };

    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

/// Splits the queue into its receiving and processing ends.
pub fn split(queue: &mut SlotQueue) -> (Receiver<'_>, Processor<'_>) {
    let (producer, consumer) = queue.split();
    (Receiver { producer }, Processor { consumer })
}

/// Moves packets from the USB stack into free slots.
pub struct Receiver<'q> {
    producer: Producer<'q, Packet, QUEUE_DEPTH>,
}

impl Receiver<'_> {
    /// Stores at most one packet. Returns whether a packet was taken from the USB stack.
    pub fn poll<U: VendorEndpoint>(&mut self, usb: &mut U) -> bool {
        if !self.producer.ready() {
            return false;
        }
        usb.poll();
        if !usb.available() {
            return false;
        }
        let mut packet = Packet::EMPTY;
        let len = usb.read_packet(&mut packet.data);
        if len == 0 {
            return false;
        }
        packet.len = len.min(PACKET_SIZE) as u8;
        self.producer.enqueue(packet).is_ok()
    }

    pub fn is_full(&self) -> bool {
        !self.producer.ready()
    }
}

/// Feeds busy slots to the command parser.
pub struct Processor<'q> {
    consumer: Consumer<'q, Packet, QUEUE_DEPTH>,
}

impl Processor<'_> {
    /// Parses the oldest busy slot, if any, and frees it.
    pub fn process_next<P, S>(
        &mut self,
        parser: &mut CommandParser,
        pins: &mut P,
        sink: &mut S,
    ) -> Result<Option<PacketOutcome>, P::Error>
    where
        P: JtagPins,
        S: TdoSink,
    {
        let Some(packet) = self.consumer.peek() else {
            return Ok(None);
        };
        let outcome = parser.handle_packet(packet.bytes(), pins, sink);
        self.consumer.dequeue();
        outcome.map(Some)
    }

    pub fn pending(&self) -> usize {
        self.consumer.len()
    }
}
