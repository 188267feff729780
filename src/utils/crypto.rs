//! Token hashing, OAuth state signing and refresh-token encryption.

use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce, aead::Aead};
use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 12;
const TOKEN_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const TOKEN_LEN: usize = 48;

/// Failures of the crypto helpers.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CryptoError {
    #[error("malformed ciphertext")]
    Malformed,

    #[error("decryption failed")]
    Decrypt,

    #[error("encryption failed")]
    Encrypt,

    #[error("invalid state signature")]
    BadSignature,

    #[error("state expired")]
    Expired,
}

fn mac(secret: &[u8], data: &[u8]) -> HmacSha256 {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(data);
    mac
}

/// Generates a random 48-character alphanumeric token.
pub fn generate_token() -> String {
    let mut rng = rand::rng();

    (0..TOKEN_LEN)
        .map(|_| {
            let idx = rng.random_range(0..TOKEN_CHARSET.len());
            TOKEN_CHARSET[idx] as char
        })
        .collect()
}

/// Hashes a raw session token with HMAC-SHA256 keyed by the signing secret.
///
/// Returns a 64-character lowercase hex MAC. Only this hash is stored.
pub fn hash_token(signing_secret: &str, token: &str) -> String {
    hex::encode(
        mac(signing_secret.as_bytes(), token.as_bytes())
            .finalize()
            .into_bytes(),
    )
}

/// AES-256-GCM cipher for secrets kept at rest (Gmail refresh tokens).
///
/// The key is derived from the configured encryption key with HMAC-SHA256.
/// Ciphertexts are `base64(nonce || ciphertext)` with a fresh random nonce.
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    const KEY_LABEL: &'static [u8] = b"gmail-refresh-token";

    pub fn new(encryption_key: &str) -> Self {
        let derived = mac(encryption_key.as_bytes(), Self::KEY_LABEL)
            .finalize()
            .into_bytes();
        let key = Key::<Aes256Gcm>::from_slice(&derived);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::rng().fill(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| CryptoError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(out))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let raw = STANDARD.decode(encoded).map_err(|_| CryptoError::Malformed)?;
        if raw.len() <= NONCE_LEN {
            return Err(CryptoError::Malformed);
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Decrypt)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::Malformed)
    }
}

/// Which OAuth flow a `state` value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatePurpose {
    Login,
    Gmail,
}

/// Payload carried through Google's consent screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthState {
    pub purpose: StatePurpose,
    pub user_id: Option<i64>,
    /// Unix timestamp after which the state is rejected.
    pub expires_at: i64,
    pub nonce: String,
}

impl OAuthState {
    pub fn new(purpose: StatePurpose, user_id: Option<i64>, expires_at: i64) -> Self {
        Self {
            purpose,
            user_id,
            expires_at,
            nonce: generate_token()[..16].to_string(),
        }
    }
}

/// Signs an OAuth state as `base64url(json).hex(hmac)`.
pub fn sign_state(secret: &str, state: &OAuthState) -> String {
    let payload = serde_json::to_vec(state).unwrap_or_default();
    let encoded = URL_SAFE_NO_PAD.encode(payload);
    let signature = hex::encode(
        mac(secret.as_bytes(), encoded.as_bytes())
            .finalize()
            .into_bytes(),
    );
    format!("{encoded}.{signature}")
}

/// Compares a state nonce with the one the browser holds, in constant time.
pub fn nonce_matches(secret: &str, expected: &str, presented: &str) -> bool {
    let tag = mac(secret.as_bytes(), presented.as_bytes())
        .finalize()
        .into_bytes();
    mac(secret.as_bytes(), expected.as_bytes())
        .verify_slice(&tag)
        .is_ok()
}

/// Verifies the signature and expiry of a state produced by [`sign_state`].
pub fn verify_state(secret: &str, value: &str, now: i64) -> Result<OAuthState, CryptoError> {
    let (encoded, signature) = value.split_once('.').ok_or(CryptoError::BadSignature)?;
    let signature = hex::decode(signature).map_err(|_| CryptoError::BadSignature)?;

    mac(secret.as_bytes(), encoded.as_bytes())
        .verify_slice(&signature)
        .map_err(|_| CryptoError::BadSignature)?;

    let payload = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| CryptoError::Malformed)?;
    let state: OAuthState = serde_json::from_slice(&payload).map_err(|_| CryptoError::Malformed)?;

    if state.expires_at < now {
        return Err(CryptoError::Expired);
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-signing-secret";

    #[test]
    fn test_generate_token_shape() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_hash_token_is_keyed() {
        let hash = hash_token(SECRET, "abc");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_token(SECRET, "abc"));
        assert_ne!(hash, hash_token("other-secret", "abc"));
        assert_ne!(hash, hash_token(SECRET, "abd"));
    }

    #[test]
    fn test_cipher_roundtrip_uses_fresh_nonce() {
        let cipher = TokenCipher::new("0123456789abcdef-encryption");
        let a = cipher.encrypt("1//refresh-token").unwrap();
        let b = cipher.encrypt("1//refresh-token").unwrap();
        assert_ne!(a, b);
        assert_eq!(cipher.decrypt(&a).unwrap(), "1//refresh-token");
    }

    #[test]
    fn test_cipher_rejects_wrong_key_and_garbage() {
        let encrypted = TokenCipher::new("first-key-0123456789")
            .encrypt("secret")
            .unwrap();
        let other = TokenCipher::new("second-key-0123456789");
        assert_eq!(other.decrypt(&encrypted), Err(CryptoError::Decrypt));
        assert_eq!(other.decrypt("!!not base64"), Err(CryptoError::Malformed));
        assert_eq!(other.decrypt("AAAA"), Err(CryptoError::Malformed));
    }

    #[test]
    fn test_nonce_matches() {
        assert!(nonce_matches(SECRET, "abcdef0123456789", "abcdef0123456789"));
        assert!(!nonce_matches(SECRET, "abcdef0123456789", "abcdef012345678x"));
        assert!(!nonce_matches(SECRET, "abcdef0123456789", ""));
    }

    #[test]
    fn test_state_roundtrip() {
        let state = OAuthState::new(StatePurpose::Gmail, Some(7), 2_000);
        let signed = sign_state(SECRET, &state);
        assert_eq!(verify_state(SECRET, &signed, 1_000).unwrap(), state);
    }

    #[test]
    fn test_state_rejects_tampering_and_expiry() {
        let state = OAuthState::new(StatePurpose::Login, None, 2_000);
        let signed = sign_state(SECRET, &state);

        assert_eq!(
            verify_state("other", &signed, 1_000),
            Err(CryptoError::BadSignature)
        );
        assert_eq!(
            verify_state(SECRET, &signed, 3_000),
            Err(CryptoError::Expired)
        );

        let forged = OAuthState::new(StatePurpose::Gmail, Some(1), 2_000);
        let (_, signature) = signed.split_once('.').unwrap();
        let tampered = format!(
            "{}.{signature}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap())
        );
        assert_eq!(
            verify_state(SECRET, &tampered, 1_000),
            Err(CryptoError::BadSignature)
        );
        assert_eq!(
            verify_state(SECRET, "no-dot", 1_000),
            Err(CryptoError::BadSignature)
        );
    }
}
