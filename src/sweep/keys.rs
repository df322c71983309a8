use std::fmt;

use bip39::{Language, Mnemonic};
use ed25519_dalek::{Signer, SigningKey};
use hmac::{Hmac, Mac};
use sha2::Sha512;

use crate::error::SweepError;

/// Registered BIP-44 coin type of Pi Network
pub const PI_COIN_TYPE: u32 = 314159;

const HARDENED_OFFSET: u32 = 0x8000_0000;
const SLIP10_CURVE_KEY: &[u8] = b"ed25519 seed";

type HmacSha512 = Hmac<Sha512>;

/// Signing identity for one swept account.
///
/// Re-derived on every sweep attempt and never cached.
pub struct AccountKeypair {
    signing_key: SigningKey,
    address: String,
}

impl AccountKeypair {
    pub fn from_raw_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let public = signing_key.verifying_key().to_bytes();
        let address = stellar_strkey::ed25519::PublicKey(public).to_string();

        Self {
            signing_key,
            address,
        }
    }

    /// `G...` strkey
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Last four bytes of the public key, as carried in decorated signatures
    pub fn signature_hint(&self) -> [u8; 4] {
        let public = self.public_key_bytes();
        [public[28], public[29], public[30], public[31]]
    }

    pub fn sign(&self, payload: &[u8]) -> [u8; 64] {
        self.signing_key.sign(payload).to_bytes()
    }

    #[cfg(test)]
    pub fn secret_strkey(&self) -> String {
        stellar_strkey::ed25519::PrivateKey(self.signing_key.to_bytes()).to_string()
    }
}

impl fmt::Debug for AccountKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountKeypair")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Seed phrase to keypair: BIP-39 seed, then SLIP-0010 ed25519 at `m/44'/coin'/0'`
#[derive(Debug, Clone, Copy)]
pub struct KeyDeriver {
    coin_type: u32,
}

impl Default for KeyDeriver {
    fn default() -> Self {
        Self::new(PI_COIN_TYPE)
    }
}

impl KeyDeriver {
    pub fn new(coin_type: u32) -> Self {
        Self { coin_type }
    }

    pub fn derive(&self, phrase: &str) -> Result<AccountKeypair, SweepError> {
        let normalized = phrase.split_whitespace().collect::<Vec<_>>().join(" ");

        let mnemonic = Mnemonic::parse_in_normalized(Language::English, &normalized)
            .map_err(|e| SweepError::InvalidSeed(e.to_string()))?;
        let seed = mnemonic.to_seed_normalized("");

        let key = derive_hardened_path(&seed, &[44, self.coin_type, 0])?;
        Ok(AccountKeypair::from_raw_seed(&key))
    }
}

/// SLIP-0010 for ed25519 only allows hardened children
fn derive_hardened_path(seed: &[u8], path: &[u32]) -> Result<[u8; 32], SweepError> {
    let (mut key, mut chain_code) = hmac_split(SLIP10_CURVE_KEY, &[seed])?;

    for index in path {
        let hardened = (index | HARDENED_OFFSET).to_be_bytes();
        (key, chain_code) = hmac_split(&chain_code, &[&[0u8][..], &key[..], &hardened[..]])?;
    }

    Ok(key)
}

fn hmac_split(key: &[u8], parts: &[&[u8]]) -> Result<([u8; 32], [u8; 32]), SweepError> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| SweepError::InvalidSeed(format!("key derivation failed: {}", e)))?;
    for part in parts {
        mac.update(part);
    }
    let output = mac.finalize().into_bytes();

    let mut left = [0u8; 32];
    let mut right = [0u8; 32];
    left.copy_from_slice(&output[..32]);
    right.copy_from_slice(&output[32..]);
    Ok((left, right))
}
