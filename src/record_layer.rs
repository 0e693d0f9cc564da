//! Record protection state: epochs, per-epoch sequence numbers and the
//! active/pending ciphers on each side.

use std::collections::HashMap;

use crate::crypto::{AeadCipher, KeyBlock, MasterSecret};
use crate::error::Error;
use crate::message::{
    CipherSuite, ContentType, DTLSRecord, Handshake, ProtocolVersion, MAX_SEQUENCE_NUMBER,
};

/// Whether the current epoch is a Role::Client or Role::Server write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Client,
    Server,
}

/// How records of an epoch are protected.
#[derive(Debug)]
enum Protection {
    /// Epoch 0, or the NULL cipher suite.
    Plain,
    Aead(AeadCipher),
}

#[derive(Debug)]
pub(crate) struct RecordLayer {
    version: ProtocolVersion,
    write_epoch: u16,
    read_epoch: u16,
    /// Next outgoing sequence number, per write epoch.
    next_seq: HashMap<u16, u64>,
    write: Protection,
    read: Protection,
    pending_write: Option<Protection>,
    pending_read: Option<Protection>,
}

impl RecordLayer {
    pub fn new() -> RecordLayer {
        RecordLayer {
            version: ProtocolVersion::DTLS1_2,
            write_epoch: 0,
            read_epoch: 0,
            next_seq: HashMap::new(),
            write: Protection::Plain,
            read: Protection::Plain,
            pending_write: None,
            pending_read: None,
        }
    }

    pub fn write_epoch(&self) -> u16 {
        self.write_epoch
    }

    pub fn read_epoch(&self) -> u16 {
        self.read_epoch
    }

    fn next_sequence(&mut self) -> Result<u64, Error> {
        let seq = self.next_seq.entry(self.write_epoch).or_insert(0);
        if *seq > MAX_SEQUENCE_NUMBER {
            return Err(Error::SequenceExhausted);
        }
        let current = *seq;
        *seq += 1;
        Ok(current)
    }

    /// Derive the key block and install the pending ciphers for the next
    /// epoch on both directions.
    pub fn install_pending(
        &mut self,
        master: &MasterSecret,
        client_random: &[u8; 32],
        server_random: &[u8; 32],
        suite: CipherSuite,
        role: Role,
    ) -> Result<(), Error> {
        let block = KeyBlock::derive(master, client_random, server_random, suite)?;

        let (write, read) = match suite.cipher_type() {
            crate::message::CipherType::Null => (Protection::Plain, Protection::Plain),
            crate::message::CipherType::Aead => {
                let client =
                    AeadCipher::new(&block.client_write_key, &block.client_write_iv)?;
                let server =
                    AeadCipher::new(&block.server_write_key, &block.server_write_iv)?;
                match role {
                    Role::Client => (Protection::Aead(client), Protection::Aead(server)),
                    Role::Server => (Protection::Aead(server), Protection::Aead(client)),
                }
            }
        };

        self.pending_write = Some(write);
        self.pending_read = Some(read);
        Ok(())
    }

    /// Our ChangeCipherSpec went out. Every following write uses the next
    /// epoch, starting at sequence 0.
    pub fn promote_write(&mut self) -> Result<(), Error> {
        let pending = self
            .pending_write
            .take()
            .ok_or_else(|| Error::Crypto("no pending write cipher".into()))?;
        self.write = pending;
        self.write_epoch += 1;
        debug!("Write epoch is now {}", self.write_epoch);
        Ok(())
    }

    pub fn has_pending_read(&self) -> bool {
        self.pending_read.is_some()
    }

    /// The peer's ChangeCipherSpec arrived.
    pub fn promote_read(&mut self) -> Result<(), Error> {
        let pending = self
            .pending_read
            .take()
            .ok_or_else(|| Error::Crypto("no pending read cipher".into()))?;
        self.read = pending;
        self.read_epoch += 1;
        debug!("Read epoch is now {}", self.read_epoch);
        Ok(())
    }

    /// Stamp a payload with the current write epoch and next sequence
    /// number and protect it under the active write cipher.
    pub fn protect(
        &mut self,
        content_type: ContentType,
        payload: &[u8],
    ) -> Result<DTLSRecord, Error> {
        let epoch = self.write_epoch;
        let sequence_number = self.next_sequence()?;

        let fragment = match &self.write {
            Protection::Plain => payload.to_vec(),
            Protection::Aead(cipher) => {
                cipher.encrypt(epoch, sequence_number, content_type, self.version, payload)?
            }
        };

        Ok(DTLSRecord {
            content_type,
            version: self.version,
            epoch,
            sequence_number,
            fragment,
        })
    }

    pub fn wrap_handshake(&mut self, handshake: &Handshake) -> Result<DTLSRecord, Error> {
        let mut payload = Vec::with_capacity(handshake.wire_length());
        handshake.serialize(&mut payload);
        self.protect(ContentType::Handshake, &payload)
    }

    /// Recover the plaintext fragment of a record in the current read
    /// epoch.
    pub fn unprotect(&self, record: &DTLSRecord) -> Result<Vec<u8>, Error> {
        match &self.read {
            Protection::Plain => Ok(record.fragment.clone()),
            Protection::Aead(cipher) => cipher.decrypt(
                record.epoch,
                record.sequence_number,
                record.content_type,
                record.version,
                &record.fragment,
            ),
        }
    }
}
