use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::services::auth::AuthError;

/// 256-bit keys for HS256.
pub const SECRET_KEY_BYTES: usize = 32;

/// A tenant's signing secret in its stored (base64) form.
///
/// The HMAC key is the UTF-8 byte string of the encoded secret, which is what
/// previously issued tokens were signed with.
/// - Key material is not printable via Debug and not serializable.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// The stored representation. Only the store should need this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn hmac_key(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// Produce a fresh secret from the OS CSPRNG.
///
/// There is no fallback source: if the OS cannot provide randomness the error
/// propagates and no tenant gets created.
pub fn generate() -> Result<SecretKey, AuthError> {
    let mut bytes = [0u8; SECRET_KEY_BYTES];
    getrandom::fill(&mut bytes).map_err(|e| {
        tracing::error!(error = %e, "OS random source unavailable");
        AuthError::KeyGenerationFailure
    })?;

    Ok(SecretKey(STANDARD.encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_base64_encoded_256_bit_keys() {
        let key = generate().expect("key");
        assert_eq!(key.expose().len(), 44);

        let raw = STANDARD.decode(key.expose()).expect("base64");
        assert_eq!(raw.len(), SECRET_KEY_BYTES);
    }

    #[test]
    fn keys_are_unique() {
        let a = generate().expect("key");
        let b = generate().expect("key");
        assert_ne!(a, b);
    }

    #[test]
    fn debug_hides_material() {
        let key = SecretKey::from_encoded("super-secret");
        let printed = format!("{key:?}");
        assert!(!printed.contains("super-secret"));
    }
}
