use rand::{distributions::Uniform, thread_rng, Rng};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const PARTICIPANT_CODE_PREFIX: &str = "P-";

fn random_uppercase(length: usize) -> String {
    let mut rng = thread_rng();
    let dist = Uniform::from(0..CODE_ALPHABET.len());
    (0..length)
        .map(|_| CODE_ALPHABET[rng.sample(dist)] as char)
        .collect()
}

/// Single-use access code handed to a participant, e.g. `P-7KQ2ZD`.
pub fn generate_participant_code() -> String {
    format!("{}{}", PARTICIPANT_CODE_PREFIX, random_uppercase(6))
}

/// Codes are compared in their trimmed upper-case form.
pub fn normalize_participant_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}
