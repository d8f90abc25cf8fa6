use md4::{digest::generic_array::GenericArray, digest::OutputSizeUser, Digest as Md4Digest, Md4};

/// UTF-16LE encodes a password.
#[inline]
fn utf16_le(password: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(password.len() * 2);

    for unit in password.encode_utf16() {
        buf.extend_from_slice(&unit.to_le_bytes());
    }

    buf
}

/// Hashes a password using NTLM.
#[inline]
pub fn ntlm(password: &str) -> GenericArray<u8, <Md4 as OutputSizeUser>::OutputSize> {
    Md4::digest(utf16_le(password))
}

#[cfg(test)]
mod tests {
    use super::{ntlm, utf16_le};

    #[test]
    fn test_utf16_le() {
        assert_eq!(vec![b'a', 0, b'b', 0], utf16_le("ab"));
        // U+00E9 is a single UTF-16 unit but two UTF-8 bytes
        assert_eq!(vec![0xe9, 0], utf16_le("é"));
    }

    #[test]
    fn test_ntlm() {
        let expected = [
            0x88u8, 0x46, 0xF7, 0xEA, 0xEE, 0x8F, 0xB1, 0x17, 0xAD, 0x06, 0xBD, 0xD8, 0x30, 0xB7,
            0x58, 0x6C,
        ];
        assert_eq!(expected, ntlm("password").as_slice());
    }

    #[test]
    fn test_ntlm_empty() {
        assert_eq!(
            "31d6cfe0d16ae931b73c59d7e0c089c0",
            hex::encode(ntlm("").as_slice())
        );
    }
}
