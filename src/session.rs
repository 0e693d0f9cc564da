use crate::crypto::MasterSecret;
use crate::message::{CipherSuite, SessionId};

/// The resumable outcome of a completed handshake.
///
/// A server caches these by session id, a client by peer address. An
/// abbreviated handshake re-derives fresh write keys from the cached
/// master secret and new randoms.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    cipher_suite: CipherSuite,
    master: MasterSecret,
}

impl Session {
    pub(crate) fn new(id: SessionId, cipher_suite: CipherSuite, master: MasterSecret) -> Session {
        Session {
            id,
            cipher_suite,
            master,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn cipher_suite(&self) -> CipherSuite {
        self.cipher_suite
    }

    pub(crate) fn master(&self) -> &MasterSecret {
        &self.master
    }

    /// Empty session ids are never resumable.
    pub fn is_resumable(&self) -> bool {
        !self.id.is_empty()
    }
}
