use rand::Rng;

/// URL-safe alphabet (no `+`/`/`, no padding) used for generated tokens.
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Generates a cryptographically random, URL-safe token of `length`
/// characters, clamped to the spec's [8, 16] range. Grounded on the
/// teacher's `SessionId::generate()`, widened from a-z0-9 to a fuller
/// URL-safe alphabet since tokens here are public-facing and benefit from
/// the lower collision probability of a larger alphabet.
pub fn generate(length: usize) -> String {
    let length = length.clamp(8, 16);
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
