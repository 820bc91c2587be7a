use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use pacm_error::NpmError;

/// Supported SRI hash algorithms, in strength order (strongest last so
/// `Ord` derives the strength ordering SRI comparisons want).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Algorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl Algorithm {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sha1" => Some(Self::Sha1),
            "sha256" => Some(Self::Sha256),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }
}

/// One `algo-base64digest` component of an SSRI string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SriComponent {
    pub algorithm: Algorithm,
    pub digest: String,
}

fn digest_bytes(data: &[u8], algo: Algorithm) -> Vec<u8> {
    match algo {
        Algorithm::Sha1 => Sha1::digest(data).to_vec(),
        Algorithm::Sha256 => Sha256::digest(data).to_vec(),
        Algorithm::Sha512 => Sha512::digest(data).to_vec(),
    }
}

/// Compute `<algo>-<base64>` for `data`.
#[must_use]
pub fn calculate(data: &[u8], algo: Algorithm) -> String {
    let digest = digest_bytes(data, algo);
    format!("{}-{}", algo.as_str(), BASE64.encode(digest))
}

/// Parse an SSRI string (space-separated `algo-base64` components).
/// Unrecognized tokens are silently skipped.
#[must_use]
pub fn parse(sri: &str) -> Vec<SriComponent> {
    sri.split_whitespace()
        .filter_map(|token| {
            let (algo, digest) = token.split_once('-')?;
            let algorithm = Algorithm::parse(algo)?;
            Some(SriComponent { algorithm, digest: digest.to_string() })
        })
        .collect()
}

/// The strongest (sha512 > sha256 > sha1) recognized component of `sri`.
#[must_use]
pub fn strongest(sri: &str) -> Option<SriComponent> {
    parse(sri).into_iter().max_by_key(|d| d.algorithm)
}

/// Does `data` match any recognized component of `sri`?
#[must_use]
pub fn verify(data: &[u8], sri: &str) -> bool {
    parse(sri).iter().any(|d| {
        let expected = calculate(data, d.algorithm);
        let computed_digest = expected.split_once('-').map(|(_, b64)| b64).unwrap_or("");
        computed_digest == d.digest
    })
}

/// Validate that a (possibly malformed) string at least has one
/// recognized SRI component, raising `EPARSE` otherwise. Mirrors the
/// teacher's convention of surfacing a tagged error at parse boundaries.
pub fn require_recognized(sri: &str) -> Result<(), NpmError> {
    if parse(sri).is_empty() {
        return Err(NpmError::parse(format!("no recognized integrity algorithm in '{sri}'")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_algorithms() {
        let data = b"package contents";
        for algo in [Algorithm::Sha1, Algorithm::Sha256, Algorithm::Sha512] {
            let sri = calculate(data, algo);
            assert!(verify(data, &sri));
        }
    }

    #[test]
    fn mismatched_data_fails_verify() {
        let sri = calculate(b"original", Algorithm::Sha512);
        assert!(!verify(b"different", &sri));
    }

    #[test]
    fn strongest_prefers_sha512() {
        let sri = format!(
            "{} {}",
            calculate(b"x", Algorithm::Sha1),
            calculate(b"x", Algorithm::Sha512)
        );
        let strongest = strongest(&sri).expect("some digest");
        assert_eq!(strongest.algorithm, Algorithm::Sha512);
    }

    #[test]
    fn unrecognized_tokens_are_skipped() {
        let sri = format!("md5-deadbeef {}", calculate(b"x", Algorithm::Sha256));
        let parsed = parse(&sri);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].algorithm, Algorithm::Sha256);
    }

    #[test]
    fn multi_hash_verify_matches_any() {
        let sri = format!("{} {}", calculate(b"x", Algorithm::Sha1), calculate(b"y", Algorithm::Sha256));
        assert!(verify(b"x", &sri));
        assert!(verify(b"y", &sri));
        assert!(!verify(b"z", &sri));
    }
}
