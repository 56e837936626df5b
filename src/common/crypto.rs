use ethereum_types::{Address, H256, U256};
use rlp::RlpStream;
use sha3::{Digest, Keccak256};

pub fn keccak256(data: &[u8]) -> H256 {
    H256::from_slice(&Keccak256::digest(data))
}

/// CREATE address: the low 20 bytes of `keccak256(rlp([sender, nonce]))`.
pub fn contract_address(sender: &Address, nonce: u64) -> Address {
    let mut s = RlpStream::new_list(2);
    s.append(sender);
    s.append(&nonce);
    let hash = Keccak256::digest(s.out());
    Address::from_slice(&hash[12..])
}

/// CREATE2 address: the low 20 bytes of
/// `keccak256(0xff ++ sender ++ salt ++ keccak256(init_code))`.
pub fn create2_address(sender: &Address, salt: U256, init_code: &[u8]) -> Address {
    let mut buf = Vec::with_capacity(1 + 20 + 32 + 32);
    buf.push(0xff);
    buf.extend_from_slice(sender.as_bytes());
    buf.extend_from_slice(&salt.to_big_endian());
    buf.extend_from_slice(keccak256(init_code).as_bytes());
    let hash = Keccak256::digest(&buf);
    Address::from_slice(&hash[12..])
}
