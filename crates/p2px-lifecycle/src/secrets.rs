//! Escrow matching keys.
//!
//! Each party gets a 32-byte secret from the OS CSPRNG; the hash sent to the
//! escrow contract is `hex(sha256(secret))`.

use p2px_core::EscrowKeys;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

const SECRET_LEN: usize = 32;

fn mint_pair() -> (String, String) {
    let mut secret = Zeroizing::new([0u8; SECRET_LEN]);
    OsRng.fill_bytes(&mut secret[..]);
    let hash = Sha256::digest(&secret[..]);
    (hex::encode(hash), hex::encode(&secret[..]))
}

pub fn mint_escrow_keys() -> EscrowKeys {
    let (buyer_hash, buyer_secret) = mint_pair();
    let (seller_hash, seller_secret) = mint_pair();
    EscrowKeys {
        buyer_hash,
        buyer_secret,
        seller_hash,
        seller_secret,
    }
}
