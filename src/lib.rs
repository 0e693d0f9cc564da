#![forbid(unsafe_code)]
#![warn(clippy::all)]

//! DTLS 1.2 handshake and record layer core over unreliable datagrams.
//!
//! scute negotiates a secure session per peer address and protects
//! application data under the negotiated keys. It is sans-IO: the crate
//! never opens sockets and never spawns timers. The caller feeds datagrams
//! in with [`Endpoint::handle_datagram`], drives time with
//! [`Endpoint::handle_timeout`] and moves outgoing datagrams with
//! [`Endpoint::poll_transmit`].
//!
//! Supported cipher suites are `TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8`,
//! `TLS_PSK_WITH_AES_128_CCM_8` and the NULL suite (testing only).

#[macro_use]
extern crate log;

mod config;
pub use config::{Config, ConfigBuilder};

mod error;
pub use error::Error;

mod endpoint;
pub use endpoint::{Datagram, Endpoint, Event};

pub mod message;

pub mod crypto;
pub use crypto::{LocalKey, PskStore, SinglePsk, TablePskStore, TrustAnyKey, TrustStore};

mod flight;
mod record_layer;
mod rng;
mod session;
mod timer;
mod util;

pub use session::Session;

pub(crate) mod handshake;
pub use handshake::HandshakeState;

pub(crate) mod reassembly;

pub use rng::SeededRng;
