//! Receive slots between the USB stack and the command parser.
//!
//! A packet is copied into the slot at the write cursor as soon as the USB stack reports it and
//! the slot is marked busy; the parser consumes busy slots at the read cursor in arrival order.
//! The USB stack is only polled while the slot at the write cursor is free, so a full ring
//! leaves further packets queued in the stack instead of overwriting anything.
use core::fmt::Display;

use xvcpico_wire::PACKET_SIZE;

/// Number of receive slots.
pub const SLOT_COUNT: usize = 4;

#[derive(Clone, Debug)]
pub struct Slot {
    busy: bool,
    len: u8,
    buffer: [u8; PACKET_SIZE],
}

impl Slot {
    const EMPTY: Slot = Slot {
        busy: false,
        len: 0,
        buffer: [0; PACKET_SIZE],
    };

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Bytes of the stored packet.
    pub fn packet(&self) -> &[u8] {
        &self.buffer[..self.len as usize]
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SlotError {
    /// The slot at the write cursor still holds an unprocessed packet.
    Busy,
    /// The slot at the read cursor holds no packet.
    Free,
    /// A packet must have between 1 and [`PACKET_SIZE`] bytes.
    Length(usize),
}

impl Display for SlotError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SlotError::Busy => write!(f, "Slot is still busy"),
            SlotError::Free => write!(f, "Slot holds no packet"),
            SlotError::Length(len) => write!(f, "Invalid packet length {}", len),
        }
    }
}

impl core::error::Error for SlotError {}

#[derive(Clone, Debug)]
pub struct SlotRing<const N: usize = SLOT_COUNT> {
    slots: [Slot; N],
    write_cursor: usize,
    read_cursor: usize,
}

impl<const N: usize> Default for SlotRing<N> {
    fn default() -> Self {
        SlotRing::new()
    }
}

impl<const N: usize> SlotRing<N> {
    pub const fn new() -> SlotRing<N> {
        SlotRing {
            slots: [Slot::EMPTY; N],
            write_cursor: 0,
            read_cursor: 0,
        }
    }

    /// Buffer of the slot at the write cursor, if that slot is free.
    pub fn try_acquire_for_write(&mut self) -> Option<&mut [u8; PACKET_SIZE]> {
        let slot = &mut self.slots[self.write_cursor];
        if slot.busy {
            None
        } else {
            Some(&mut slot.buffer)
        }
    }

    /// Hands the first `len` bytes written to the acquired buffer over to the reader.
    pub fn commit_write(&mut self, len: usize) -> Result<(), SlotError> {
        if len == 0 || len > PACKET_SIZE {
            return Err(SlotError::Length(len));
        }
        let slot = &mut self.slots[self.write_cursor];
        if slot.busy {
            return Err(SlotError::Busy);
        }
        slot.len = len as u8;
        slot.busy = true;
        self.write_cursor = (self.write_cursor + 1) % N;
        Ok(())
    }

    /// The oldest unprocessed packet.
    pub fn try_acquire_for_read(&self) -> Option<&[u8]> {
        let slot = &self.slots[self.read_cursor];
        if slot.busy { Some(slot.packet()) } else { None }
    }

    /// Frees the slot at the read cursor.
    pub fn commit_read(&mut self) -> Result<(), SlotError> {
        let slot = &mut self.slots[self.read_cursor];
        if !slot.busy {
            return Err(SlotError::Free);
        }
        slot.busy = false;
        self.read_cursor = (self.read_cursor + 1) % N;
        Ok(())
    }

    pub fn busy_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.busy).count()
    }

    pub fn is_full(&self) -> bool {
        self.slots[self.write_cursor].busy
    }

    pub fn slot(&self, index: usize) -> &Slot {
        &self.slots[index]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn push(ring: &mut SlotRing, fill: u8, len: usize) -> Result<(), SlotError> {
        match ring.try_acquire_for_write() {
            Some(buf) => {
                buf[..len].fill(fill);
                ring.commit_write(len)
            }
            None => Err(SlotError::Busy),
        }
    }

    #[test]
    fn fifo_order() {
        let mut ring = SlotRing::<SLOT_COUNT>::new();
        push(&mut ring, 1, 3).unwrap();
        push(&mut ring, 2, 5).unwrap();
        assert_eq!(ring.try_acquire_for_read(), Some(&[1u8; 3][..]));
        ring.commit_read().unwrap();
        assert_eq!(ring.try_acquire_for_read(), Some(&[2u8; 5][..]));
        ring.commit_read().unwrap();
        assert_eq!(ring.try_acquire_for_read(), None);
    }

    #[test]
    fn full_ring_applies_back_pressure() {
        let mut ring = SlotRing::<SLOT_COUNT>::new();
        for i in 0..SLOT_COUNT {
            push(&mut ring, i as u8 + 1, PACKET_SIZE).unwrap();
        }
        assert!(ring.is_full());
        assert!(ring.try_acquire_for_write().is_none());
        assert_eq!(ring.commit_write(8), Err(SlotError::Busy));
        for i in 0..SLOT_COUNT {
            assert_eq!(ring.slot(i).packet(), &[i as u8 + 1; PACKET_SIZE][..]);
        }

        ring.commit_read().unwrap();
        push(&mut ring, 0xEE, 2).unwrap();
        assert_eq!(ring.slot(0).packet(), &[0xEE, 0xEE]);
        assert_eq!(ring.busy_count(), SLOT_COUNT);
    }

    #[test]
    fn cursors_wrap() {
        let mut ring = SlotRing::<2>::new();
        for round in 0..5u8 {
            push_n(&mut ring, round);
            assert_eq!(ring.try_acquire_for_read(), Some(&[round][..]));
            ring.commit_read().unwrap();
        }

        fn push_n(ring: &mut SlotRing<2>, value: u8) {
            let buf = ring.try_acquire_for_write().unwrap();
            buf[0] = value;
            ring.commit_write(1).unwrap();
        }
    }

    #[test]
    fn rejects_invalid_commits() {
        let mut ring = SlotRing::<SLOT_COUNT>::new();
        assert_eq!(ring.commit_read(), Err(SlotError::Free));
        assert_eq!(ring.commit_write(0), Err(SlotError::Length(0)));
        assert_eq!(
            ring.commit_write(PACKET_SIZE + 1),
            Err(SlotError::Length(PACKET_SIZE + 1))
        );
        assert_eq!(ring.busy_count(), 0);
    }
}
