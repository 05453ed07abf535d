use sha2::{Digest, Sha256};

/// Cache key generator for the trend query
pub struct CacheKeyGenerator;

impl CacheKeyGenerator {
    /// SHA-256 hex digest standing in for a credential inside keys and logs
    pub fn credential_identity(secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Key for one (provider, credential, model) combination.
    /// The raw API key never becomes part of the key.
    pub fn trend_key(provider: &str, api_key: &str, model: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(provider.as_bytes());
        hasher.update(b"|");
        hasher.update(Self::credential_identity(api_key).as_bytes());
        hasher.update(b"|");
        hasher.update(model.as_bytes());
        format!("trend:{:x}", hasher.finalize())
    }
}
