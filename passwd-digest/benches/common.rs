use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const PASSWORD_CHARS: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Random password lines of 6 to 32 characters, roughly the spread of a
/// leaked password list. Seeded so runs are comparable.
pub fn generate_random_passwords(count: usize) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    (0..count)
        .map(|_| {
            let length = rng.gen_range(6..=32);
            (0..length)
                .map(|_| PASSWORD_CHARS[rng.gen_range(0..PASSWORD_CHARS.len())] as char)
                .collect()
        })
        .collect()
}
