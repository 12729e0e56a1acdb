//! One-time code generation and normalization

use std::collections::HashSet;

use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;

/// Unambiguous alphabet: no `0/O`, no `1/I`
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const CODE_LENGTH: usize = 8;

/// Retry budget for finding one unused code
pub const MAX_ATTEMPTS_PER_CODE: u32 = 100;

pub const MAX_CODES_PER_BATCH: u32 = 50;

lazy_static! {
    static ref CODE_PATTERN: Regex =
        Regex::new(r"^[A-HJ-NP-Z2-9]{8}$").expect("code pattern is a valid regex");
}

/// Uniqueness check against already persisted codes
#[async_trait::async_trait]
pub trait CodeAvailability: Send {
    async fn is_taken(&mut self, code: &str) -> Result<bool, sqlx::Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum CodeGenerationError {
    #[error("no unused code found after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

/// Draw one random candidate
pub fn random_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Generate `count` codes unused both in the store and within the batch.
///
/// Fails the whole batch as soon as one slot exhausts its retry budget;
/// nothing is persisted here, so the caller's transaction decides atomicity.
pub async fn generate_unique_codes<C>(
    count: u32,
    availability: &mut C,
) -> Result<Vec<String>, CodeGenerationError>
where
    C: CodeAvailability + ?Sized,
{
    let mut batch: HashSet<String> = HashSet::with_capacity(count as usize);
    let mut codes = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let mut found = None;
        for _ in 0..MAX_ATTEMPTS_PER_CODE {
            let candidate = random_code();
            if batch.contains(&candidate) {
                continue;
            }
            if !availability.is_taken(&candidate).await? {
                found = Some(candidate);
                break;
            }
        }

        let code = found.ok_or(CodeGenerationError::Exhausted {
            attempts: MAX_ATTEMPTS_PER_CODE,
        })?;
        batch.insert(code.clone());
        codes.push(code);
    }

    Ok(codes)
}

/// Canonical form of user input: trimmed and upper-cased.
///
/// `None` when the result cannot be any issued code; callers report that
/// the same way as an unknown code.
pub fn normalize_code(input: &str) -> Option<String> {
    let code = input.trim().to_uppercase();
    CODE_PATTERN.is_match(&code).then_some(code)
}
