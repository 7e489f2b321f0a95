//! Per-request CSP nonce.

use std::sync::{PoisonError, RwLock};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::{rngs::OsRng, RngCore};

/// Random bytes drawn for each nonce, before encoding.
pub const NONCE_BYTES: usize = 18;

/// Lazily generated nonce, shared by the injected tags and the CSP header.
///
/// One provider belongs to one request; it is never stored globally.
#[derive(Debug, Default)]
pub struct NonceProvider {
    value: RwLock<Option<String>>,
}

impl NonceProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider pre-seeded with a nonce generated elsewhere in the pipeline.
    #[must_use]
    pub fn with_nonce(nonce: impl Into<String>) -> Self {
        Self {
            value: RwLock::new(Some(nonce.into())),
        }
    }

    /// Current nonce, generated on first call.
    ///
    /// Concurrent first calls agree on a single value.
    pub fn get_nonce(&self) -> String {
        if let Some(nonce) = self
            .value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return nonce.clone();
        }

        let mut slot = self.value.write().unwrap_or_else(PoisonError::into_inner);
        slot.get_or_insert_with(generate_nonce).clone()
    }

    /// Replace the nonce, e.g. when a header carrying it was already sent.
    pub fn set_nonce(&self, nonce: impl Into<String>) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = Some(nonce.into());
    }
}

/// Fresh nonce: base64 of [`NONCE_BYTES`] random bytes, minus `/`, `+` and `=`.
#[must_use]
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    STANDARD.encode(bytes).replace(&['/', '+', '='][..], "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn nonce_is_stable_for_one_provider() {
        let provider = NonceProvider::new();
        let first = provider.get_nonce();
        assert!(!first.is_empty());
        assert_eq!(first, provider.get_nonce());
    }

    #[test]
    fn providers_produce_distinct_nonces() {
        let a = NonceProvider::new().get_nonce();
        let b = NonceProvider::new().get_nonce();
        assert_ne!(a, b);
    }

    #[test]
    fn nonce_is_attribute_safe() {
        for _ in 0..200 {
            let nonce = generate_nonce();
            assert!(!nonce.contains(&['/', '+', '='][..]), "unsafe nonce {nonce}");
            assert!(nonce.len() <= 24);
        }
    }

    #[test]
    fn set_nonce_overrides_generated_value() {
        let provider = NonceProvider::new();
        let _ = provider.get_nonce();
        provider.set_nonce("from-upstream");
        assert_eq!(provider.get_nonce(), "from-upstream");
    }

    #[test]
    fn seeded_provider_returns_seed() {
        assert_eq!(NonceProvider::with_nonce("abc").get_nonce(), "abc");
    }

    #[test]
    fn racing_first_calls_agree() {
        let provider = Arc::new(NonceProvider::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let provider = Arc::clone(&provider);
                thread::spawn(move || provider.get_nonce())
            })
            .collect();
        let values: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(values.windows(2).all(|w| w[0] == w[1]));
    }
}
