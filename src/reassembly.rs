//! Reassembly of fragmented handshake messages.
//!
//! Messages are admitted strictly in `message_seq` order, so at most one
//! message is being reassembled at a time.

use crate::message::{Body, Handshake, Header, MessageType};

/// Collects the fragments of one handshake message.
#[derive(Debug)]
pub(crate) struct FragmentBuffer {
    msg_type: MessageType,
    message_seq: u16,
    length: u32,
    data: Vec<u8>,
    /// Received (offset, length) ranges, sorted by offset.
    ranges: Vec<(u32, u32)>,
}

impl FragmentBuffer {
    pub fn new(header: &Header) -> FragmentBuffer {
        FragmentBuffer {
            msg_type: header.msg_type,
            message_seq: header.message_seq,
            length: header.length,
            data: vec![0; header.length as usize],
            ranges: Vec::new(),
        }
    }

    /// Absorb one fragment. Fragments that contradict the first one seen
    /// (different type or total length) and duplicates are dropped.
    pub fn add(&mut self, header: &Header, fragment: &[u8]) {
        if header.msg_type != self.msg_type
            || header.message_seq != self.message_seq
            || header.length != self.length
        {
            debug!(
                "Dropping fragment with mismatching header: {:?} vs {:?} seq {}",
                header.msg_type, self.msg_type, header.message_seq
            );
            return;
        }

        let offset = header.fragment_offset;
        let len = fragment.len() as u32;
        if header.fragment_length != len || offset + len > self.length {
            debug!("Dropping fragment exceeding message bounds");
            return;
        }

        // A retransmitted fragment starts at an offset we already have.
        if self.ranges.iter().any(|&(o, _)| o == offset) {
            trace!("Dropping duplicate fragment at offset {}", offset);
            return;
        }

        self.data[offset as usize..(offset + len) as usize].copy_from_slice(fragment);

        let at = self.ranges.partition_point(|&(o, _)| o < offset);
        self.ranges.insert(at, (offset, len));
    }

    /// Whether the received ranges cover the whole message contiguously.
    pub fn is_complete(&self) -> bool {
        let mut covered = 0u32;
        for &(offset, len) in &self.ranges {
            if offset > covered {
                return false;
            }
            covered = covered.max(offset + len);
        }
        covered == self.length
    }

    /// The reassembled message as a single complete fragment.
    pub fn assemble(&self) -> Handshake {
        debug_assert!(self.is_complete());
        Handshake {
            header: Header {
                msg_type: self.msg_type,
                length: self.length,
                message_seq: self.message_seq,
                fragment_offset: 0,
                fragment_length: self.length,
            },
            body: Body::Fragment(self.data.clone()),
        }
    }

    pub fn message_seq(&self) -> u16 {
        self.message_seq
    }
}
