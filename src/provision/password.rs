//! Random login passwords.

use uuid::Uuid;

/// Generates a password from 64 random bits rendered in base 36.
#[must_use]
pub fn generate_password() -> String {
    let (bits, _) = Uuid::new_v4().as_u64_pair();
    encode_base36(bits)
}

fn encode_base36(mut value: u64) -> String {
    let mut digits = Vec::new();
    loop {
        let digit = u32::try_from(value.rem_euclid(36)).unwrap_or_default();
        digits.push(char::from_digit(digit, 36).unwrap_or('0'));
        value = value.div_euclid(36);
        if value == 0 {
            break;
        }
    }
    digits.iter().rev().collect()
}
