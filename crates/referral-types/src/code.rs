use crate::error::RejectReason;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical code alphabet: the uppercase alphanumerics minus the visually
/// confusing I, O, L, 0 and 1, so codes survive human transcription.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Referral codes are always exactly this many symbols.
pub const CODE_LEN: usize = 8;

/// Returns true iff `code` is exactly [`CODE_LEN`] symbols of the canonical
/// uppercase alphabet.
///
/// Case-sensitive by design: lowercase input fails here. Case folding for
/// lookup is [`ReferralCode::parse`]'s job. Any byte outside the alphabet
/// (whitespace, unicode, control characters) fails.
pub fn is_valid_format(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| CODE_ALPHABET.contains(&b))
}

/// A canonical (uppercase) referral code.
///
/// Construction goes through [`generate`](Self::generate) or
/// [`parse`](Self::parse), so a value of this type always holds [`CODE_LEN`]
/// symbols drawn from [`CODE_ALPHABET`]. Matching is case-insensitive for
/// callers; the stored form is always canonical uppercase.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferralCode(String);

impl ReferralCode {
    /// Draw a fresh code uniformly from the alphabet using the thread RNG.
    ///
    /// Uniqueness is not this function's job — the directory's allocation
    /// loop checks the generated code against existing owners.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::rng())
    }

    /// Draw a fresh code from a caller-supplied RNG (deterministic in tests).
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..CODE_LEN)
            .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Normalize (uppercase) a claimed code, then validate its format.
    ///
    /// `abcd5678` parses to `ABCD5678`; anything that is not [`CODE_LEN`]
    /// alphabet symbols after uppercasing is `InvalidCodeFormat`.
    pub fn parse(raw: &str) -> Result<Self, RejectReason> {
        let canonical = raw.to_uppercase();
        if !is_valid_format(&canonical) {
            return Err(RejectReason::InvalidCodeFormat);
        }
        Ok(Self(canonical))
    }

    /// Fallback allocation: keep the first half of `base` and derive the tail
    /// from `ts` expressed in the code alphabet.
    ///
    /// Used when the bounded uniqueness loop exhausts its attempts. The
    /// result is still [`CODE_LEN`] in-alphabet symbols; the accepted
    /// degradation is that the tail is time-derived rather than uniform.
    pub fn with_timestamp_suffix(base: &Self, ts: DateTime<Utc>) -> Self {
        const TAIL: usize = CODE_LEN / 2;
        let radix = CODE_ALPHABET.len() as u64;
        let mut secs = ts.timestamp().unsigned_abs();
        let mut tail = [0u8; TAIL];
        for slot in tail.iter_mut().rev() {
            *slot = CODE_ALPHABET[(secs % radix) as usize];
            secs /= radix;
        }
        let mut code = String::with_capacity(CODE_LEN);
        code.push_str(&base.0[..CODE_LEN - TAIL]);
        // tail bytes are alphabet members, always valid UTF-8
        code.push_str(std::str::from_utf8(&tail).unwrap_or("2222"));
        Self(code)
    }

    /// The canonical uppercase string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferralCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
