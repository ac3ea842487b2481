//! Display masking for secrets

/// Fixed-width token that replaces the hidden part of a secret
pub const MASK_TOKEN: &str = "********";

const VISIBLE: usize = 4;

/// Keep the first and last four characters, hide the rest behind
/// [`MASK_TOKEN`]. Secrets of eight characters or fewer are hidden entirely.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= VISIBLE * 2 {
        return MASK_TOKEN.to_string();
    }

    let head: String = chars[..VISIBLE].iter().collect();
    let tail: String = chars[chars.len() - VISIBLE..].iter().collect();
    format!("{}{}{}", head, MASK_TOKEN, tail)
}
