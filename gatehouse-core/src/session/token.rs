//! Opaque bearer token generation

use std::sync::atomic::{AtomicU64, Ordering};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rand::RngCore;

const RANDOM_BYTES: usize = 32;

/// Builds tokens from the identity, a strictly increasing time component
/// and 32 bytes from a CSPRNG, encoded as URL-safe base64.
#[derive(Debug, Default)]
pub(crate) struct TokenGenerator {
    sequence: AtomicU64,
}

impl TokenGenerator {
    pub(crate) fn generate(&self, identity: &str, now: DateTime<Utc>) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let nanos = now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp());

        // The digest hides the identity; the random tail carries the entropy.
        let digest = md5::compute(format!("{}:{}:{}", identity, nanos, sequence));

        let mut bytes = Vec::with_capacity(digest.0.len() + RANDOM_BYTES);
        bytes.extend_from_slice(&digest.0);

        let mut random = [0u8; RANDOM_BYTES];
        rand::thread_rng().fill_bytes(&mut random);
        bytes.extend_from_slice(&random);

        URL_SAFE_NO_PAD.encode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tokens_are_printable_and_opaque() {
        let tokens = TokenGenerator::default();
        let token = tokens.generate("alice@example.com", Utc::now());

        assert_eq!(token.len(), 64);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(!token.contains("alice"));
    }

    #[test]
    fn same_identity_and_instant_never_collide() {
        let tokens = TokenGenerator::default();
        let now = Utc::now();

        let issued: HashSet<String> = (0..1000)
            .map(|_| tokens.generate("alice@example.com", now))
            .collect();
        assert_eq!(issued.len(), 1000);
    }
}
