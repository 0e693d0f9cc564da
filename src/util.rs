use nom::bytes::complete::take;
use nom::error::{ErrorKind, ParseError};
use nom::{Err, IResult, InputLength, Parser};

/// Parse a big-endian 48-bit unsigned integer (DTLS sequence numbers).
pub fn be_u48(input: &[u8]) -> IResult<&[u8], u64> {
    let (input, bytes) = take(6_usize)(input)?;
    let mut value = 0u64;
    for b in bytes {
        value = (value << 8) | *b as u64;
    }
    Ok((input, value))
}

/// Append a big-endian 24-bit length (TLS `uint24`).
pub fn serialize_u24(value: usize, output: &mut Vec<u8>) {
    debug_assert!(value < (1 << 24));
    output.extend_from_slice(&(value as u32).to_be_bytes()[1..]);
}

/// Repeated application of `f` until the input is exhausted, at least once.
///
/// Unlike `nom::multi::many1` this collects into any `Extend` target and
/// insists that the whole input is consumed, which is what length-prefixed
/// TLS vectors need.
pub fn exact_list<'a, O, E, F, C>(mut f: F) -> impl FnMut(&'a [u8]) -> IResult<&'a [u8], C, E>
where
    F: Parser<&'a [u8], O, E>,
    E: ParseError<&'a [u8]>,
    C: Default + Extend<O>,
{
    move |mut i: &'a [u8]| {
        if i.is_empty() {
            return Err(Err::Error(E::from_error_kind(i, ErrorKind::Many1)));
        }
        let mut acc = C::default();
        while !i.is_empty() {
            let len = i.input_len();
            let (i1, o) = f.parse(i)?;
            // infinite loop check: the parser must always consume
            if i1.input_len() == len {
                return Err(Err::Error(E::from_error_kind(i, ErrorKind::Many1)));
            }
            acc.extend(Some(o));
            i = i1;
        }
        Ok((i, acc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn be_u48_parses_full_width() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0xFF];
        let (rest, v) = be_u48(&data).unwrap();
        assert_eq!(v, 0x0102_0304_0506);
        assert_eq!(rest, &[0xFF]);
    }

    #[test]
    fn be_u48_too_short() {
        assert!(be_u48(&[0x01, 0x02]).is_err());
    }
}
