use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::{be_u16, be_u8};
use nom::{Err, IResult};
use std::ops::Deref;
use std::{fmt, hash};

use crate::SeededRng;

pub struct InvalidLength(&'static str, usize, usize, usize);

impl fmt::Debug for InvalidLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl std::error::Error for InvalidLength {}

impl fmt::Display for InvalidLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Incorrect {} length: {} <= {} <= {}",
            self.0, self.1, self.3, self.2
        )
    }
}

macro_rules! var_array {
    ($name:ident, $min:expr, $max:expr, $len_parser:ident, $len_width:expr) => {
        /// Length-prefixed opaque byte string with a bounded capacity.
        #[derive(Clone, Copy)]
        pub struct $name([u8; $max], usize);

        impl $name {
            pub fn empty() -> Self {
                $name([0; $max], 0)
            }

            pub fn try_new(data: &[u8]) -> Result<Self, InvalidLength> {
                #[allow(unused_comparisons)]
                if data.len() < $min || data.len() > $max {
                    return Err(InvalidLength(stringify!($name), $min, $max, data.len()));
                }
                let mut array = [0; $max];
                array[..data.len()].copy_from_slice(data);
                Ok($name(array, data.len()))
            }

            pub fn random(len: usize, rng: &mut SeededRng) -> $name {
                assert!(len >= $min);
                assert!(len <= $max);
                let mut arr = [0; $max];
                rng.fill(&mut arr[..len]);
                Self(arr, len)
            }

            pub fn is_empty(&self) -> bool {
                self.1 == 0
            }

            pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
                let (input, len) = $len_parser(input)?;
                let len = len as usize;
                #[allow(unused_comparisons)]
                if len < $min || len > $max {
                    return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
                }
                let (input, data) = take(len)(input)?;
                // unwrap() is ok because we check the size above.
                let instance = Self::try_new(data).unwrap();
                Ok((input, instance))
            }

            pub fn serialize(&self, output: &mut Vec<u8>) {
                let len = self.1;
                // The length prefix is 1 or 2 bytes wide.
                if $len_width == 2 {
                    output.extend_from_slice(&(len as u16).to_be_bytes());
                } else {
                    output.push(len as u8);
                }
                output.extend_from_slice(&self.0[..len]);
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:02x?})", stringify!($name), &self.0[..self.1])
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.deref() == other.deref()
            }
        }

        impl Eq for $name {}

        impl hash::Hash for $name {
            fn hash<H: hash::Hasher>(&self, state: &mut H) {
                self.deref().hash(state)
            }
        }

        impl Deref for $name {
            type Target = [u8];

            fn deref(&self) -> &Self::Target {
                &self.0[..self.1]
            }
        }

        impl<'a> TryFrom<&'a [u8]> for $name {
            type Error = InvalidLength;

            fn try_from(value: &'a [u8]) -> Result<Self, Self::Error> {
                Self::try_new(value)
            }
        }

        impl<'a> TryFrom<&'a str> for $name {
            type Error = InvalidLength;

            fn try_from(value: &'a str) -> Result<Self, Self::Error> {
                Self::try_new(value.as_bytes())
            }
        }
    };
}

var_array!(SessionId, 0, 32, be_u8, 1);
var_array!(Cookie, 0, 255, be_u8, 1);
var_array!(PskIdentity, 0, 128, be_u16, 2);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_roundtrip() {
        let id = SessionId::try_new(&[0xAA, 0xBB, 0xCC]).unwrap();

        let mut out = Vec::new();
        id.serialize(&mut out);
        assert_eq!(out, &[0x03, 0xAA, 0xBB, 0xCC]);

        let (rest, parsed) = SessionId::parse(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, id);
    }

    #[test]
    fn session_id_too_long() {
        assert!(SessionId::try_new(&[0u8; 33]).is_err());
    }

    #[test]
    fn psk_identity_uses_u16_prefix() {
        let id = PskIdentity::try_new(b"client-1").unwrap();

        let mut out = Vec::new();
        id.serialize(&mut out);
        assert_eq!(&out[..2], &[0x00, 0x08]);
        assert_eq!(&out[2..], b"client-1");

        let (rest, parsed) = PskIdentity::parse(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, id);
    }

    #[test]
    fn empty_cookie_roundtrip() {
        let cookie = Cookie::empty();
        assert!(cookie.is_empty());

        let mut out = Vec::new();
        cookie.serialize(&mut out);
        assert_eq!(out, &[0x00]);
    }
}
