//! Upload API keys.
//!
//! The auth file holds one hash per line, never a plaintext key. Candidates
//! are hashed with the same fixed salt and parameters and looked up in a set.

use std::collections::HashSet;
use std::path::Path;

use base64::Engine;
use scrypt::Params;

// Matches existing linx auth files
const SALT: &[u8] = b"linx-server";
const LOG_N: u8 = 14;
const BLOCK_SIZE: u32 = 8;
const PARALLELISM: u32 = 1;
const OUTPUT_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ApiKeyError {
    #[error("Failed to read auth file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Key hashing failed: {0}")]
    Hash(String),
}

/// Hash `key` the way auth file entries are produced.
pub fn hash_api_key(key: &str) -> Result<String, ApiKeyError> {
    let params = Params::new(LOG_N, BLOCK_SIZE, PARALLELISM, OUTPUT_LEN)
        .map_err(|e| ApiKeyError::Hash(e.to_string()))?;
    let output = derive(key.as_bytes(), SALT, &params, OUTPUT_LEN)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(output))
}

fn derive(
    password: &[u8],
    salt: &[u8],
    params: &Params,
    len: usize,
) -> Result<Vec<u8>, ApiKeyError> {
    let mut output = vec![0u8; len];
    scrypt::scrypt(password, salt, params, &mut output)
        .map_err(|e| ApiKeyError::Hash(e.to_string()))?;
    Ok(output)
}

/// Allow-list of hashed upload keys
#[derive(Debug, Clone, Default)]
pub struct ApiKeySet {
    hashes: HashSet<String>,
}

impl ApiKeySet {
    /// One hash per line; blank lines are skipped.
    pub fn from_lines(contents: &str) -> Self {
        let hashes = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self { hashes }
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ApiKeyError> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ApiKeyError::Read {
                path: path.display().to_string(),
                source,
            })?;
        let set = Self::from_lines(&contents);
        tracing::info!(path = %path.display(), keys = set.len(), "Loaded API key hashes");
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Whether `candidate` hashes to a listed entry. An empty candidate never matches.
    pub fn check(&self, candidate: &str) -> bool {
        if candidate.is_empty() {
            return false;
        }
        match hash_api_key(candidate) {
            Ok(hash) => self.hashes.contains(&hash),
            Err(e) => {
                tracing::error!(error = %e, "Failed to hash API key candidate");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        let first = hash_api_key("upload-key").unwrap();
        let second = hash_api_key("upload-key").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 44);
        assert_ne!(first, hash_api_key("other-key").unwrap());
        assert_eq!(first, "YrM+2BI3ItHx8jVMZ9CfqmMANpgUAekw5R6puScIlB0=");
    }

    #[test]
    fn test_derive_matches_rfc7914_vector() {
        let params = Params::new(10, 8, 16, 64).unwrap();
        let output = derive(b"password", b"NaCl", &params, 64).unwrap();
        let hex: String = output.iter().map(|b| format!("{b:02x}")).collect();
        assert_eq!(
            hex,
            "fdbabe1c9d3472007856e7190d01e9fe7c6ad7cbc8237830e77376634b373162\
             2eaf30d92e22a3886ff109279d9830dac727afb94a83ee6d8360cbdfa2cc0640"
        );
    }

    #[test]
    fn test_check_against_set() {
        let hash = hash_api_key("upload-key").unwrap();
        let set = ApiKeySet::from_lines(&format!("\n{}\n  \nnot-a-real-hash\n", hash));

        assert_eq!(set.len(), 2);
        assert!(set.check("upload-key"));
        assert!(!set.check("wrong-key"));
        assert!(!set.check(""));
    }

    #[test]
    fn test_empty_candidate_never_matches() {
        let set = ApiKeySet::from_lines(&hash_api_key("").unwrap());
        assert!(!set.check(""));
    }

    #[tokio::test]
    async fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("authfile");
        std::fs::write(&path, format!("{}\n", hash_api_key("k").unwrap())).unwrap();

        let set = ApiKeySet::from_file(&path).await.unwrap();
        assert!(set.check("k"));

        assert!(matches!(
            ApiKeySet::from_file(dir.path().join("missing")).await,
            Err(ApiKeyError::Read { .. })
        ));
    }
}
