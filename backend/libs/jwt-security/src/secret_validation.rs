//! Signing secret strength checks
//!
//! The token MAC is only as strong as its key, so secrets are measured
//! before a codec is built from them.

/// 256 bits minimum for HS256
pub const MIN_SECRET_LENGTH: usize = 32;
const RECOMMENDED_SECRET_LENGTH: usize = 64;

/// Secret strength classification
#[derive(Debug, PartialEq, Eq)]
pub enum SecretStrength {
    /// Shorter than 32 bytes, refuse to start
    TooShort,
    /// Long enough but low entropy or an obvious pattern, warn
    LowEntropy,
    Acceptable,
    Strong,
}

/// Classify raw secret bytes.
///
/// **Criteria**:
/// - Minimum 32 bytes (256 bits)
/// - Recommended 64 bytes (512 bits)
/// - Shannon entropy > 4.0 bits/byte
/// - No runs of 4+ repeated or sequential bytes
pub fn validate_secret_strength(secret: &[u8]) -> SecretStrength {
    if secret.len() < MIN_SECRET_LENGTH {
        return SecretStrength::TooShort;
    }

    let entropy = calculate_shannon_entropy(secret);
    if entropy < 4.0 || has_obvious_patterns(secret) {
        return SecretStrength::LowEntropy;
    }

    if secret.len() >= RECOMMENDED_SECRET_LENGTH && entropy >= 5.0 {
        SecretStrength::Strong
    } else {
        SecretStrength::Acceptable
    }
}

/// Shannon entropy in bits per byte (0-8 scale)
fn calculate_shannon_entropy(data: &[u8]) -> f64 {
    let mut freq = [0u32; 256];
    let len = data.len() as f64;

    for &byte in data {
        freq[byte as usize] += 1;
    }

    freq.iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

fn has_obvious_patterns(data: &[u8]) -> bool {
    if data.len() < 4 {
        return false;
    }

    // "aaaa", "1111"
    let mut consecutive_same = 1;
    for window in data.windows(2) {
        if window[0] == window[1] {
            consecutive_same += 1;
            if consecutive_same >= 4 {
                return true;
            }
        } else {
            consecutive_same = 1;
        }
    }

    // "abcd", "1234"
    let mut consecutive_seq = 1;
    for window in data.windows(2) {
        if window[1] as i16 - window[0] as i16 == 1 {
            consecutive_seq += 1;
            if consecutive_seq >= 4 {
                return true;
            }
        } else {
            consecutive_seq = 1;
        }
    }

    false
}
