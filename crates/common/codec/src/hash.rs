use alloy_primitives::{Address, B256};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

pub fn sha256(data: &[u8]) -> B256 {
    B256::from_slice(&Sha256::digest(data))
}

/// SHA-256 over the concatenation of `parts` without materializing the
/// joined buffer.
pub fn sha256_concat<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> B256 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    B256::from_slice(&hasher.finalize())
}

/// Derive the 20-byte contract address as `RIPEMD160(SHA256(contract_hash))`.
pub fn contract_address(contract_hash: &[u8]) -> Address {
    let sha = Sha256::digest(contract_hash);
    let ripe = Ripemd160::digest(sha);
    Address::from_slice(&ripe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_concat_matches_joined_hash() {
        let joined = sha256(b"hello world");
        let parts = sha256_concat([b"hello".as_slice(), b" ".as_slice(), b"world".as_slice()]);
        assert_eq!(joined, parts);
    }

    #[test]
    fn test_contract_address_is_20_bytes_and_stable() {
        let hash = [0x01u8; 32];
        let address = contract_address(&hash);
        assert_eq!(address, contract_address(&hash));
        assert_ne!(address, Address::ZERO);
        assert_ne!(address, contract_address(&[0x02u8; 32]));
    }
}
