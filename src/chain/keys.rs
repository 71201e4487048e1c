//! Signing account and credential decoding.
//!
//! The secret key arrives from the environment in one of two encodings:
//! - Bech32 `suiprivkey1...` (HRP `suiprivkey`, payload `flag || secret`)
//! - raw base64 (32-byte secret, 33-byte `flag || secret`, or a 64-byte
//!   `secret || public` keypair)
//!
//! Only Ed25519 (flag `0x00`) keys are accepted. Any other input is a fatal
//! credential error: the sweep loop never starts with an unusable key.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use ed25519_dalek::{Signer, SigningKey};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use crate::types::{SuiAddress, SweepError};

type Blake2b256 = Blake2b<U32>;

/// Bech32 human-readable prefix of exported private keys.
pub const PRIVATE_KEY_HRP: &str = "suiprivkey";

/// Signature scheme flag for Ed25519.
pub const ED25519_FLAG: u8 = 0x00;

/// Intent prefix for transaction data: scope=TransactionData, version=V0, app=Sui.
const TRANSACTION_INTENT: [u8; 3] = [0, 0, 0];

const SECRET_KEY_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// The signing identity whose balance is swept.
///
/// Built once at startup. The secret never leaves this struct; `Debug`
/// prints the address only.
pub struct Account {
    signing_key: SigningKey,
    address: SuiAddress,
}

impl Account {
    /// Decode a secret from either accepted encoding.
    pub fn from_secret(secret: &SecretString) -> Result<Self, SweepError> {
        let bytes = decode_secret_key(secret.expose_secret())?;
        Ok(Self::from_secret_bytes(&bytes))
    }

    pub fn from_secret_bytes(bytes: &[u8; SECRET_KEY_LENGTH]) -> Self {
        let signing_key = SigningKey::from_bytes(bytes);
        let address = derive_address(signing_key.verifying_key().as_bytes());
        Self {
            signing_key,
            address,
        }
    }

    pub fn address(&self) -> SuiAddress {
        self.address
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Sign raw transaction bytes and return the serialized signature
    /// (`flag || signature || public key`, base64) the node expects.
    pub fn sign_transaction(&self, tx_bytes: &[u8]) -> String {
        let digest = intent_digest(tx_bytes);
        let signature = self.signing_key.sign(&digest);

        let mut serialized = Vec::with_capacity(1 + 64 + 32);
        serialized.push(ED25519_FLAG);
        serialized.extend_from_slice(&signature.to_bytes());
        serialized.extend_from_slice(self.signing_key.verifying_key().as_bytes());
        BASE64.encode(serialized)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address.to_string())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Address = Blake2b-256(flag || public key).
pub fn derive_address(public_key: &[u8; 32]) -> SuiAddress {
    let mut hasher = Blake2b256::new();
    hasher.update([ED25519_FLAG]);
    hasher.update(public_key);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    SuiAddress::from_bytes(out)
}

/// Blake2b-256 over the intent-prefixed transaction bytes.
pub fn intent_digest(tx_bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(TRANSACTION_INTENT);
    hasher.update(tx_bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Decode a secret key string into the 32-byte Ed25519 seed.
pub fn decode_secret_key(encoded: &str) -> Result<[u8; SECRET_KEY_LENGTH], SweepError> {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Err(SweepError::Credential("signing key is empty".into()));
    }

    if encoded.to_ascii_lowercase().starts_with(PRIVATE_KEY_HRP) {
        return decode_bech32(encoded);
    }

    let raw = BASE64
        .decode(encoded)
        .map_err(|e| SweepError::Credential(format!("signing key is neither {PRIVATE_KEY_HRP} nor base64: {e}")))?;

    match raw.len() {
        32 => Ok(to_seed(&raw)),
        33 => {
            check_flag(raw[0])?;
            Ok(to_seed(&raw[1..]))
        }
        64 => {
            let seed = to_seed(&raw[..SECRET_KEY_LENGTH]);
            let derived = SigningKey::from_bytes(&seed).verifying_key();
            if derived.as_bytes()[..] != raw[SECRET_KEY_LENGTH..] {
                return Err(SweepError::Credential(
                    "keypair public half does not match its secret".into(),
                ));
            }
            Ok(seed)
        }
        n => Err(SweepError::Credential(format!(
            "base64 signing key decodes to {n} bytes; expected 32, 33 or 64"
        ))),
    }
}

fn decode_bech32(encoded: &str) -> Result<[u8; SECRET_KEY_LENGTH], SweepError> {
    let (hrp, data) = bech32::decode(encoded)
        .map_err(|e| SweepError::Credential(format!("malformed {PRIVATE_KEY_HRP} key: {e}")))?;

    if hrp.to_lowercase() != PRIVATE_KEY_HRP {
        return Err(SweepError::Credential(format!(
            "unexpected key prefix {hrp}; expected {PRIVATE_KEY_HRP}"
        )));
    }
    if data.len() != SECRET_KEY_LENGTH + 1 {
        return Err(SweepError::Credential(format!(
            "{PRIVATE_KEY_HRP} payload is {} bytes; expected 33",
            data.len()
        )));
    }
    check_flag(data[0])?;
    Ok(to_seed(&data[1..]))
}

fn check_flag(flag: u8) -> Result<(), SweepError> {
    if flag == ED25519_FLAG {
        Ok(())
    } else {
        Err(SweepError::Credential(format!(
            "unsupported signature scheme flag {flag:#04x}; only Ed25519 keys can sign sweeps"
        )))
    }
}

fn to_seed(bytes: &[u8]) -> [u8; SECRET_KEY_LENGTH] {
    let mut seed = [0u8; SECRET_KEY_LENGTH];
    seed.copy_from_slice(&bytes[..SECRET_KEY_LENGTH]);
    seed
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    // Seed of 32 × 0x07 and its externally computed encodings.
    const SEED: [u8; 32] = [7u8; 32];
    const BECH32_KEY: &str =
        "suiprivkey1qqrswpc8qurswpc8qurswpc8qurswpc8qurswpc8qurswpc8qurswxzszc4";
    const BECH32_SECP_KEY: &str =
        "suiprivkey1qyrswpc8qurswpc8qurswpc8qurswpc8qurswpc8qurswpc8qurswua9amz";
    const BASE64_KEY: &str = "BwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwc=";
    const BASE64_FLAGGED_KEY: &str = "AAcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcH";
    const PUBLIC_KEY: &str = "ea4a6c63e29c520abef5507b132ec5f9954776aebebe7b92421eea691446d22c";
    const ADDRESS: &str = "0xa0ccc8bcc83f6c628340134f8546a21e0618fd1aaa02432bba454c4a2c2233da";

    fn secret(s: &str) -> SecretString {
        SecretString::new(s.to_string())
    }

    #[test]
    fn test_decode_bech32_key() {
        assert_eq!(decode_secret_key(BECH32_KEY).unwrap(), SEED);
    }

    #[test]
    fn test_decode_base64_key() {
        assert_eq!(decode_secret_key(BASE64_KEY).unwrap(), SEED);
    }

    #[test]
    fn test_decode_base64_flagged_key() {
        assert_eq!(decode_secret_key(BASE64_FLAGGED_KEY).unwrap(), SEED);
    }

    #[test]
    fn test_decode_base64_keypair() {
        let mut pair = SEED.to_vec();
        pair.extend_from_slice(&hex::decode(PUBLIC_KEY).unwrap());
        let encoded = BASE64.encode(pair);
        assert_eq!(decode_secret_key(&encoded).unwrap(), SEED);
    }

    #[test]
    fn test_reject_keypair_with_foreign_public_half() {
        let mut pair = SEED.to_vec();
        pair.extend_from_slice(&[9u8; 32]);
        let encoded = BASE64.encode(pair);
        assert!(matches!(
            decode_secret_key(&encoded),
            Err(SweepError::Credential(ref m)) if m.contains("does not match")
        ));
    }

    #[test]
    fn test_decode_trims_whitespace() {
        let padded = format!("  {BASE64_KEY}\n");
        assert_eq!(decode_secret_key(&padded).unwrap(), SEED);
    }

    #[test]
    fn test_reject_non_ed25519_scheme() {
        let err = decode_secret_key(BECH32_SECP_KEY).unwrap_err();
        assert!(matches!(err, SweepError::Credential(ref m) if m.contains("flag")));
    }

    #[test]
    fn test_reject_bad_checksum() {
        let mut corrupted = BECH32_KEY.to_string();
        corrupted.pop();
        corrupted.push('q');
        assert!(matches!(
            decode_secret_key(&corrupted),
            Err(SweepError::Credential(_))
        ));
    }

    #[test]
    fn test_reject_garbage_and_wrong_length() {
        assert!(matches!(decode_secret_key(""), Err(SweepError::Credential(_))));
        assert!(matches!(decode_secret_key("not a key!"), Err(SweepError::Credential(_))));
        let short = BASE64.encode([1u8; 16]);
        assert!(matches!(decode_secret_key(&short), Err(SweepError::Credential(_))));
    }

    #[test]
    fn test_account_address_derivation() {
        let account = Account::from_secret(&secret(BECH32_KEY)).unwrap();
        assert_eq!(hex::encode(account.public_key()), PUBLIC_KEY);
        assert_eq!(account.address().to_string(), ADDRESS);
    }

    #[test]
    fn test_both_encodings_yield_same_account() {
        let a = Account::from_secret(&secret(BECH32_KEY)).unwrap();
        let b = Account::from_secret(&secret(BASE64_KEY)).unwrap();
        assert_eq!(a.address(), b.address());
    }

    #[test]
    fn test_intent_digest_vector() {
        assert_eq!(
            hex::encode(intent_digest(b"hello")),
            "721668b482762a913a793cc6c50fd5354c610c633e87e94975aa0d27ba72fef1"
        );
    }

    #[test]
    fn test_signature_layout_and_validity() {
        let account = Account::from_secret_bytes(&SEED);
        let serialized = BASE64.decode(account.sign_transaction(b"hello")).unwrap();

        assert_eq!(serialized.len(), 97);
        assert_eq!(serialized[0], ED25519_FLAG);
        assert_eq!(&serialized[65..], &account.public_key());

        let key = VerifyingKey::from_bytes(&account.public_key()).unwrap();
        let sig = Signature::from_slice(&serialized[1..65]).unwrap();
        assert!(key.verify(&intent_digest(b"hello"), &sig).is_ok());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let account = Account::from_secret_bytes(&SEED);
        let dbg = format!("{account:?}");
        assert!(dbg.contains(ADDRESS));
        assert!(!dbg.contains("signing_key"));
    }
}
