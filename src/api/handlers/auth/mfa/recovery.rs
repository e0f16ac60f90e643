//! Recovery code generation and verification.
//!
//! Recovery codes let a user through when the authenticator app is gone.
//! Each code is ten uppercase hex characters cut from a fresh UUID, shown
//! once at enable time, and stored only as a salted Argon2id hash.

use anyhow::{Result, anyhow};
use uuid::Uuid;

use super::super::utils::{hash_password, verify_password};

const RECOVERY_CODE_COUNT: usize = 10;
const RECOVERY_CODE_LEN: usize = 10;

/// A freshly generated recovery-code batch (plaintext + hashes).
#[derive(Debug)]
pub(super) struct RecoveryCodeBatch {
    pub(super) codes: Vec<String>,
    pub(super) code_hashes: Vec<String>,
}

impl RecoveryCodeBatch {
    pub(super) fn generate() -> Result<Self> {
        let mut codes = Vec::with_capacity(RECOVERY_CODE_COUNT);
        let mut code_hashes = Vec::with_capacity(RECOVERY_CODE_COUNT);
        for _ in 0..RECOVERY_CODE_COUNT {
            let code = generate_code();
            let hash = hash_password(&code)?;
            codes.push(code);
            code_hashes.push(hash);
        }
        Ok(Self { codes, code_hashes })
    }
}

/// Normalize user input for verification: strip separators, uppercase.
pub(super) fn normalize_recovery_code(input: &str) -> Result<String> {
    let normalized: String = input
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_uppercase())
        .collect();
    if normalized.len() != RECOVERY_CODE_LEN {
        return Err(anyhow!("invalid recovery code length"));
    }
    Ok(normalized)
}

/// Check a presented code against one stored hash.
pub(super) fn matches_recovery_code(code_normalized: &str, stored_hash: &str) -> bool {
    verify_password(code_normalized, stored_hash)
}

fn generate_code() -> String {
    let raw = Uuid::new_v4().simple().to_string().to_uppercase();
    raw.chars().take(RECOVERY_CODE_LEN).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::{RecoveryCodeBatch, matches_recovery_code, normalize_recovery_code};

    #[test]
    fn batch_has_ten_unique_codes() {
        let batch = RecoveryCodeBatch::generate().unwrap();
        assert_eq!(batch.codes.len(), 10);
        assert_eq!(batch.code_hashes.len(), 10);
        let mut deduped = batch.codes.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), 10);
        for code in &batch.codes {
            assert_eq!(code.len(), 10);
            assert!(
                code.chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            );
        }
    }

    #[test]
    fn normalize_strips_separators_and_uppercases() {
        assert_eq!(
            normalize_recovery_code("ab3d-5f78-9a").unwrap(),
            "AB3D5F789A"
        );
        assert!(normalize_recovery_code("too-short").is_err());
    }

    #[test]
    fn hash_and_verify_round_trip() {
        let batch = RecoveryCodeBatch::generate().unwrap();
        let code = batch.codes.first().unwrap();
        let hash = batch.code_hashes.first().unwrap();
        assert!(matches_recovery_code(code, hash));
        assert!(!matches_recovery_code("AAAAAAAAAA", hash));
    }

    #[test]
    fn recovery_code_single_use_model() {
        let batch = RecoveryCodeBatch::generate().unwrap();
        let code = batch.codes.first().unwrap();
        let hash = batch.code_hashes.first().unwrap();
        let mut used = false;

        let mut consume = |input: &str| {
            if used {
                return false;
            }
            if matches_recovery_code(input, hash) {
                used = true;
                true
            } else {
                false
            }
        };

        assert!(consume(code));
        assert!(!consume(code));
    }
}
