use std::net::SocketAddr;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::Error;
use crate::message::{ClientHello, Cookie};
use crate::rng::SeededRng;

const COOKIE_LEN: usize = 20;

/// Stateless cookie exchange (RFC 6347 4.2.1).
///
/// The cookie is an HMAC over the peer address and the ClientHello
/// parameters that must be repeated unchanged in the retry, keyed with a
/// per-endpoint secret. The server keeps no per-peer state until a valid
/// cookie comes back.
pub struct CookieGenerator {
    secret: [u8; 32],
}

impl CookieGenerator {
    pub fn new(rng: &mut SeededRng) -> CookieGenerator {
        let mut secret = [0u8; 32];
        rng.fill(&mut secret);
        CookieGenerator { secret }
    }

    pub fn generate(&self, peer: SocketAddr, hello: &ClientHello) -> Result<Cookie, Error> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.secret)
            .map_err(|e| Error::Crypto(e.to_string()))?;

        match peer.ip() {
            std::net::IpAddr::V4(ip) => mac.update(&ip.octets()),
            std::net::IpAddr::V6(ip) => mac.update(&ip.octets()),
        }
        mac.update(&peer.port().to_be_bytes());

        mac.update(&hello.client_version.as_u16().to_be_bytes());
        mac.update(&hello.random.bytes());
        mac.update(&hello.session_id);
        for suite in &hello.cipher_suites {
            mac.update(&suite.as_u16().to_be_bytes());
        }
        for method in &hello.compression_methods {
            mac.update(&[method.as_u8()]);
        }

        let digest = mac.finalize().into_bytes();
        // unwrap() is ok because COOKIE_LEN is within Cookie's bounds.
        Ok(Cookie::try_new(&digest[..COOKIE_LEN]).unwrap())
    }

    /// Whether the cookie in `hello` is one we handed this peer for these
    /// exact hello parameters.
    pub fn verify(&self, peer: SocketAddr, hello: &ClientHello) -> Result<bool, Error> {
        if hello.cookie.is_empty() {
            return Ok(false);
        }
        let expected = self.generate(peer, hello)?;
        Ok(expected == hello.cookie)
    }
}

impl std::fmt::Debug for CookieGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CookieGenerator(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{CipherSuite, Random, SessionId};
    use tinyvec::ArrayVec;

    fn hello(rng: &mut SeededRng) -> ClientHello {
        let mut cipher_suites = ArrayVec::default();
        cipher_suites.push(CipherSuite::ECDHE_ECDSA_AES128_CCM_8);
        ClientHello::new(Random::new(rng), SessionId::empty(), cipher_suites)
    }

    #[test]
    fn retry_with_issued_cookie_verifies() {
        let mut rng = SeededRng::new(Some(1));
        let gen = CookieGenerator::new(&mut rng);
        let peer: SocketAddr = "10.0.0.1:5684".parse().unwrap();

        let mut hello = hello(&mut rng);
        assert!(!gen.verify(peer, &hello).unwrap());

        hello.cookie = gen.generate(peer, &hello).unwrap();
        assert!(gen.verify(peer, &hello).unwrap());
    }

    #[test]
    fn cookie_is_bound_to_peer_address() {
        let mut rng = SeededRng::new(Some(2));
        let gen = CookieGenerator::new(&mut rng);
        let peer: SocketAddr = "10.0.0.1:5684".parse().unwrap();
        let other: SocketAddr = "10.0.0.2:5684".parse().unwrap();

        let mut hello = hello(&mut rng);
        hello.cookie = gen.generate(peer, &hello).unwrap();
        assert!(!gen.verify(other, &hello).unwrap());
    }

    #[test]
    fn cookie_is_bound_to_hello_parameters() {
        let mut rng = SeededRng::new(Some(3));
        let gen = CookieGenerator::new(&mut rng);
        let peer: SocketAddr = "10.0.0.1:5684".parse().unwrap();

        let mut hello = hello(&mut rng);
        hello.cookie = gen.generate(peer, &hello).unwrap();
        hello.random = Random::new(&mut rng);
        assert!(!gen.verify(peer, &hello).unwrap());
    }
}
