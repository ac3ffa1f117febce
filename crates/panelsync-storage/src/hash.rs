//! SHA-256 content hashing.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use panelsync_core::error::{AppError, ErrorKind};
use panelsync_core::result::AppResult;

/// Upper-case hex SHA-256 of a file's content.
pub async fn file_sha256(path: &Path) -> AppResult<String> {
    let mut file = tokio::fs::File::open(path).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Storage,
            format!("Failed to open {} for hashing", path.display()),
            e,
        )
    })?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode_upper(hasher.finalize()))
}

/// Upper-case hex SHA-256 of a UTF-8 string.
pub fn string_sha256(text: &str) -> String {
    hex::encode_upper(Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABC_SHA256: &str = "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD";

    #[test]
    fn test_string_hash_matches_known_vector() {
        assert_eq!(string_sha256("abc"), ABC_SHA256);
    }

    #[tokio::test]
    async fn test_file_hash_matches_string_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        std::fs::write(&path, "abc").unwrap();
        assert_eq!(file_sha256(&path).await.unwrap(), ABC_SHA256);
    }

    #[tokio::test]
    async fn test_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(file_sha256(&dir.path().join("missing")).await.is_err());
    }
}
