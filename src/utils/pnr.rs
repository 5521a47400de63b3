use rand::Rng;

/// PNR alphabet: uppercase alphanumerics minus the visually ambiguous
/// 0/O and 1/I.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const PNR_LEN: usize = 6;

/// Attempts against the uniqueness index before giving up.
pub const MAX_GENERATION_ATTEMPTS: u32 = 8;

pub fn random_pnr() -> String {
    let mut rng = rand::thread_rng();
    (0..PNR_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
