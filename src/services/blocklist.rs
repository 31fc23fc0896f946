use crate::constants::MAX_LABEL_LENGTH;
use crate::error::ValidationError;

/// Bad words up to this length only match exactly; longer ones match anywhere
const SHORT_WORD_MAX_LENGTH: usize = 3;

const BAD_WORDS: &[&str] = &[
    "ass", "cum", "tit", "spam", "scam", "porn", "phish", "fraud", "nazi", "abuse", "crap", "shit",
    "fuck", "bitch", "whore", "slut", "dick",
];

/// Names reserved for the relay operator
const BLOCKLIST: &[&str] = &[
    "admin",
    "administrator",
    "postmaster",
    "hostmaster",
    "webmaster",
    "root",
    "support",
    "security",
    "noreply",
    "no-reply",
    "info",
    "mailer-daemon",
    "www",
    "mail",
    "smtp",
    "imap",
    "pop",
    "api",
    "relay",
    "help",
];

const FORBIDDEN_CHARACTERS: &[char] = &[
    '@', '.', '+', '_', ' ', '"', '\'', ',', ';', ':', '/', '\\', '<', '>', '(', ')', '[', ']',
    '!', '#', '$', '%', '&', '*', '=', '?', '^', '`', '{', '|', '}', '~',
];

/// Trim and lowercase user input before it is checked
pub fn normalize(input: &str) -> String {
    input.trim().to_lowercase()
}

/// Accept or reject a candidate local part or subdomain label
pub fn validate(candidate: &str) -> bool {
    check(candidate).is_ok()
}

/// Like [`validate`], reporting which rule rejected the candidate
pub fn check(candidate: &str) -> Result<(), ValidationError> {
    if candidate.contains(FORBIDDEN_CHARACTERS) {
        return Err(ValidationError::ForbiddenCharacter);
    }

    if !matches_label_pattern(candidate) {
        return Err(ValidationError::BadPattern);
    }

    if BLOCKLIST.contains(&candidate) || contains_bad_word(candidate) {
        return Err(ValidationError::Blocked);
    }

    Ok(())
}

/// `[a-z0-9-]{1,63}` with no hyphen at either end
fn matches_label_pattern(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.len() <= MAX_LABEL_LENGTH
        && !candidate.starts_with('-')
        && !candidate.ends_with('-')
        && candidate
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

fn contains_bad_word(candidate: &str) -> bool {
    BAD_WORDS.iter().any(|word| {
        if word.len() <= SHORT_WORD_MAX_LENGTH {
            candidate == *word
        } else {
            candidate.contains(word)
        }
    })
}
