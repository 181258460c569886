//! Minting of the per-account bearer `uid`.
//!
//! The readable prefix is the historical character-shift of the user's
//! name, city and password length; a random suffix makes every token unique.

use rand::Rng;
use uuid::Uuid;

/// Characters a token must never contain; they break headers, URLs or
/// quoting on the client side.
pub const FORBIDDEN_CHARS: &[char] = &['"', '\'', '\\', '/', '<', '>', '&', '%', '@', '`', '?', ' ', '|'];

const PRINTABLE_FIRST: u64 = 32;
const PRINTABLE_LAST: u64 = 126;
const PRINTABLE_SPAN: u64 = PRINTABLE_LAST - PRINTABLE_FIRST + 1;

/// Shift every character of `seed` by `offset`, wrapping into printable
/// ASCII and stepping past forbidden characters. The output has exactly as
/// many characters as the seed.
pub fn obfuscate(seed: &str, offset: u64) -> String {
    seed.chars().map(|c| shift_char(u64::from(u32::from(c)), offset)).collect()
}

fn shift_char(mut code: u64, offset: u64) -> char {
    loop {
        let shifted = code + offset;
        if shifted < PRINTABLE_FIRST {
            code += 1;
            continue;
        }
        let wrapped = if shifted > PRINTABLE_LAST {
            (shifted - PRINTABLE_FIRST) % PRINTABLE_SPAN + PRINTABLE_FIRST
        } else {
            shifted
        };
        if let Ok(byte) = u8::try_from(wrapped) {
            let ch = char::from(byte);
            if !FORBIDDEN_CHARS.contains(&ch) {
                return ch;
            }
        }
        code += 1;
    }
}

/// New bearer token for an account.
pub fn mint(first_name: &str, last_name: &str, city_name: &str, password_len: usize) -> String {
    let seed = format!("{first_name}{last_name}{city_name}{password_len}");
    let offset = rand::rng().random_range(1..PRINTABLE_SPAN);
    format!("{}{}", obfuscate(&seed, offset), Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_keeps_length_and_skips_forbidden() {
        assert_eq!(obfuscate("abc", 1), "bcd");
        // '~' + 1 wraps to ' ', which is forbidden, so it moves on to '!'
        assert_eq!(obfuscate("~", 1), "!");
        // '?' and '@' are both forbidden
        assert_eq!(obfuscate("?@", 0), "AA");

        for offset in 0..200 {
            let out = obfuscate("Élodie Dupont Saint-Étienne 12\t", offset);
            assert_eq!(out.chars().count(), 31);
            assert!(out.chars().all(|c| (' '..='~').contains(&c)));
            assert!(!out.chars().any(|c| FORBIDDEN_CHARS.contains(&c)));
        }
    }

    #[test]
    fn minted_tokens_are_unique_and_header_safe() {
        let a = mint("Alice", "Durand", "Lyon", 8);
        let b = mint("Alice", "Durand", "Lyon", 8);
        assert_ne!(a, b);
        assert_eq!(a.chars().count(), "AliceDurandLyon8".len() + 32);
        assert!(!a.chars().any(|c| FORBIDDEN_CHARS.contains(&c) || c.is_whitespace()));
    }
}
