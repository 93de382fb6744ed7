//! Voucher signer recovery.
//!
//! Vouchers are signed as Ethereum personal messages: the signature covers
//! `keccak256("\x19Ethereum Signed Message:\n32" || voucher_hash)`. The signer
//! is recovered from the secp256k1 signature and mapped to its account address.

use crate::error::{Error, Result};
use crate::primitives::{Address, Hash, Signature};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};
use sha3::{Digest, Keccak256};

/// EIP-191 prefix for a 32-byte message.
const PERSONAL_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Digest that a voucher signature actually covers.
#[must_use]
pub fn personal_message_digest(hash: &Hash) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(PERSONAL_MESSAGE_PREFIX);
    hasher.update(hash.as_bytes());
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// Derive the account address of a secp256k1 public key.
#[must_use]
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let digest = Keccak256::digest(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&digest[12..]);
    Address(address)
}

/// Recover the address that signed `hash`.
///
/// # Errors
///
/// Returns [`Error::Crypto`] if the recovery byte or the signature scalars are
/// malformed, or no public key can be recovered.
pub fn recover_signer(hash: &Hash, signature: &Signature) -> Result<Address> {
    let bytes = signature.as_bytes();

    let v = match bytes[64] {
        v @ (0 | 1) => v,
        v @ (27 | 28) => v - 27,
        other => {
            return Err(Error::Crypto(format!("invalid recovery byte {other}")));
        }
    };
    let recovery_id = RecoveryId::from_byte(v)
        .ok_or_else(|| Error::Crypto(format!("invalid recovery id {v}")))?;

    let sig = EcdsaSignature::from_slice(&bytes[..64])
        .map_err(|e| Error::Crypto(format!("invalid signature: {e}")))?;

    let digest = personal_message_digest(hash);
    let key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
        .map_err(|e| Error::Crypto(format!("signer recovery failed: {e}")))?;

    Ok(address_of(&key))
}

/// Sign `hash` as a personal message. Used by tests and tooling.
///
/// # Errors
///
/// Returns [`Error::Crypto`] if signing fails.
pub fn sign_hash(key: &k256::ecdsa::SigningKey, hash: &Hash) -> Result<Signature> {
    let digest = personal_message_digest(hash);
    let (sig, recovery_id) = key
        .sign_prehash_recoverable(&digest)
        .map_err(|e| Error::Crypto(format!("signing failed: {e}")))?;

    let mut bytes = [0u8; 65];
    bytes[..64].copy_from_slice(&sig.to_bytes());
    bytes[64] = recovery_id.to_byte() + 27;
    Ok(Signature(bytes))
}
