use nom::bytes::complete::take;
use nom::IResult;

/// Finished carries 12 bytes of PRF output over the handshake transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finished {
    pub verify_data: [u8; 12],
}

impl Finished {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Finished> {
        let (input, data) = take(12_usize)(input)?;
        let mut verify_data = [0; 12];
        verify_data.copy_from_slice(data);
        Ok((input, Finished { verify_data }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.verify_data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let finished = Finished {
            verify_data: [7; 12],
        };

        let mut serialized = Vec::new();
        finished.serialize(&mut serialized);
        assert_eq!(serialized.len(), 12);

        let (rest, parsed) = Finished::parse(&serialized).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, finished);
    }

    #[test]
    fn too_short() {
        assert!(Finished::parse(&[0; 11]).is_err());
    }
}
