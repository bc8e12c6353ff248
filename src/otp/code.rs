use rand::{rngs::OsRng, Rng};

pub const CODE_LENGTH: usize = 6;

/// Six decimal digits from the OS RNG, zero padded.
#[must_use]
pub fn generate_code() -> String {
    let value: u32 = OsRng.gen_range(0..1_000_000);
    format!("{value:06}")
}

/// Submitted codes must be exactly six ASCII digits.
#[must_use]
pub fn is_well_formed(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|byte| byte.is_ascii_digit())
}
