use anyhow::bail;
use bytes::{Buf, BufMut};

pub const PROTOCOL_VERSION: u8 = 0;

/// Server to client over TCP right after accept, echoed verbatim by the client over UDP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenMsg {
    pub token: i64,
}

impl TokenMsg {
    pub const SERIALIZED_LEN: usize = 9;

    pub fn ser(&self, buf: &mut impl BufMut) {
        buf.put_u8(PROTOCOL_VERSION);
        buf.put_i64(self.token);
    }

    pub fn deser(buf: &mut impl Buf) -> anyhow::Result<Self> {
        let version = buf.try_get_u8()?;
        if version != PROTOCOL_VERSION {
            bail!("unsupported protocol version {}", version);
        }
        let token = buf.try_get_i64()?;
        Ok(TokenMsg { token })
    }

    /// A datagram is a token echo only if it has exactly the token message's length
    pub fn from_datagram(datagram: &[u8]) -> Option<TokenMsg> {
        if datagram.len() != Self::SERIALIZED_LEN {
            return None;
        }
        Self::deser(&mut &datagram[..]).ok()
    }
}

/// Server to client over UDP, acknowledging the token echo. It is padded with zeroes because
///  some NATs and anti-DDoS appliances drop UDP packets shorter than 12 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelloMsg {
    pub token: i64,
}

impl HelloMsg {
    pub const SERIALIZED_LEN: usize = 12;

    pub fn ser(&self, buf: &mut impl BufMut) {
        buf.put_i64(self.token);
        buf.put_bytes(0, Self::SERIALIZED_LEN - size_of::<i64>());
    }

    pub fn deser(buf: &mut impl Buf) -> anyhow::Result<Self> {
        if buf.remaining() < Self::SERIALIZED_LEN {
            bail!("hello message has {} bytes, expected at least {}", buf.remaining(), Self::SERIALIZED_LEN);
        }
        let token = buf.try_get_i64()?;
        Ok(HelloMsg { token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::zero(0, vec![0, 0, 0, 0, 0, 0, 0, 0, 0])]
    #[case::positive(0x0102030405060708, vec![0, 1, 2, 3, 4, 5, 6, 7, 8])]
    #[case::negative(-1, vec![0, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff])]
    fn test_token_ser(#[case] token: i64, #[case] expected: Vec<u8>) {
        let mut buf = Vec::new();
        TokenMsg { token }.ser(&mut buf);
        assert_eq!(buf, expected);

        assert_eq!(TokenMsg::deser(&mut buf.as_slice()).unwrap(), TokenMsg { token });
        assert_eq!(TokenMsg::from_datagram(&buf), Some(TokenMsg { token }));
    }

    #[rstest]
    #[case::empty(vec![])]
    #[case::short(vec![0, 1, 2, 3, 4, 5, 6, 7])]
    #[case::long(vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9])]
    #[case::wrong_version(vec![1, 1, 2, 3, 4, 5, 6, 7, 8])]
    fn test_token_from_invalid_datagram(#[case] datagram: Vec<u8>) {
        assert_eq!(TokenMsg::from_datagram(&datagram), None);
    }

    #[test]
    fn test_hello_ser() {
        let mut buf = Vec::new();
        HelloMsg { token: 0x0102030405060708 }.ser(&mut buf);
        assert_eq!(buf, vec![1, 2, 3, 4, 5, 6, 7, 8, 0, 0, 0, 0]);

        assert_eq!(HelloMsg::deser(&mut buf.as_slice()).unwrap(), HelloMsg { token: 0x0102030405060708 });
    }

    #[rstest]
    #[case::empty(vec![])]
    #[case::token_only(vec![1, 2, 3, 4, 5, 6, 7, 8])]
    #[case::one_short(vec![1, 2, 3, 4, 5, 6, 7, 8, 0, 0, 0])]
    fn test_hello_too_short(#[case] data: Vec<u8>) {
        assert!(HelloMsg::deser(&mut data.as_slice()).is_err());
    }
}
