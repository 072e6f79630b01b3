//! Password policy applied to reviewer-supplied credentials.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters that satisfy the special-character requirement.
pub const SPECIAL_CHARS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?/~`'\"\\";

/// A single reason a credential was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum PolicyViolation {
    /// Shorter than the minimum.
    TooShort {
        /// Required minimum.
        min: usize,
    },
    /// Longer than the maximum.
    TooLong {
        /// Allowed maximum.
        max: usize,
    },
    /// No uppercase letter.
    MissingUppercase,
    /// No lowercase letter.
    MissingLowercase,
    /// No digit.
    MissingDigit,
    /// No special character.
    MissingSpecialChar,
    /// Contains whitespace.
    ContainsWhitespace,
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { min } => write!(f, "must be at least {min} characters"),
            Self::TooLong { max } => write!(f, "must be at most {max} characters"),
            Self::MissingUppercase => f.write_str("must contain an uppercase letter"),
            Self::MissingLowercase => f.write_str("must contain a lowercase letter"),
            Self::MissingDigit => f.write_str("must contain a digit"),
            Self::MissingSpecialChar => f.write_str("must contain a special character"),
            Self::ContainsWhitespace => f.write_str("must not contain whitespace"),
        }
    }
}

/// Fixed credential policy.
///
/// Lengths are counted in characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    /// Minimum length.
    pub min_length: usize,
    /// Maximum length (bounds hashing cost).
    pub max_length: usize,
    /// Require `A-Z`.
    pub require_uppercase: bool,
    /// Require `a-z`.
    pub require_lowercase: bool,
    /// Require `0-9`.
    pub require_digit: bool,
    /// Require one of [`SPECIAL_CHARS`].
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
        }
    }
}

impl PasswordPolicy {
    /// Check `candidate`, returning every violated rule.
    ///
    /// # Errors
    ///
    /// Returns the list of violations when the candidate is refused.
    pub fn check(&self, candidate: &str) -> Result<(), Vec<PolicyViolation>> {
        let mut violations = Vec::new();
        let len = candidate.chars().count();

        if len < self.min_length {
            violations.push(PolicyViolation::TooShort {
                min: self.min_length,
            });
        }
        if len > self.max_length {
            violations.push(PolicyViolation::TooLong {
                max: self.max_length,
            });
        }
        if self.require_uppercase && !candidate.chars().any(|c| c.is_ascii_uppercase()) {
            violations.push(PolicyViolation::MissingUppercase);
        }
        if self.require_lowercase && !candidate.chars().any(|c| c.is_ascii_lowercase()) {
            violations.push(PolicyViolation::MissingLowercase);
        }
        if self.require_digit && !candidate.chars().any(|c| c.is_ascii_digit()) {
            violations.push(PolicyViolation::MissingDigit);
        }
        if self.require_special && !candidate.chars().any(|c| SPECIAL_CHARS.contains(c)) {
            violations.push(PolicyViolation::MissingSpecialChar);
        }
        if candidate.chars().any(char::is_whitespace) {
            violations.push(PolicyViolation::ContainsWhitespace);
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}
