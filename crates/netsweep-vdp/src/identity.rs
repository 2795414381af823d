//! Best-effort identity extraction from discovery payloads
//!
//! The response payload layout is not documented, so everything here is a
//! heuristic scan over raw bytes. Nothing in this module fails; a field that
//! cannot be guessed is simply `None`.

use netsweep_core::ScanConfig;
use std::net::Ipv4Addr;

/// First octets accepted as an address when no in-subnet match exists
const PRIVATE_FIRST_OCTETS: [u8; 3] = [10, 172, 192];

/// Minimum length of a text token considered as a name
const MIN_NAME_LEN: usize = 3;

/// Number of leading payload bytes used as the serial candidate
const SERIAL_LEN: usize = 8;

/// Context the guess is made against
#[derive(Debug, Clone)]
pub struct IdentityHints {
    /// First two octets of the scanned subnet
    pub leading_octets: [u8; 2],
    /// Case-insensitive substrings marking a preferred device name
    pub name_patterns: Vec<String>,
}

impl IdentityHints {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            leading_octets: config.prefix.leading_octets(),
            name_patterns: config.name_patterns.clone(),
        }
    }
}

/// Fields guessed from one payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityGuess {
    pub ip: Option<Ipv4Addr>,
    pub name: Option<String>,
    pub serial: Option<String>,
}

/// Guess address, device name, and serial from a response payload
pub fn guess_identity(payload: &[u8], hints: &IdentityHints) -> IdentityGuess {
    IdentityGuess {
        ip: guess_ip(payload, hints.leading_octets),
        name: guess_name(payload, &hints.name_patterns),
        serial: guess_serial(payload),
    }
}

fn guess_ip(payload: &[u8], leading: [u8; 2]) -> Option<Ipv4Addr> {
    let to_ip = |w: &[u8]| Ipv4Addr::new(w[0], w[1], w[2], w[3]);

    payload
        .windows(4)
        .find(|w| w[0] == leading[0] && w[1] == leading[1])
        .or_else(|| {
            payload
                .windows(4)
                .find(|w| PRIVATE_FIRST_OCTETS.contains(&w[0]))
        })
        .map(to_ip)
}

fn guess_serial(payload: &[u8]) -> Option<String> {
    let block = payload.get(..SERIAL_LEN)?;
    if block.iter().all(|&b| b == 0) {
        return None;
    }
    Some(hex::encode_upper(block))
}

fn guess_name(payload: &[u8], patterns: &[String]) -> Option<String> {
    let text: String = payload
        .iter()
        .map(|&b| if (32..=126).contains(&b) { b as char } else { '\0' })
        .collect();

    let tokens: Vec<&str> = text
        .split('\0')
        .map(str::trim)
        .filter(|t| t.len() >= MIN_NAME_LEN)
        .collect();

    let lowered: Vec<String> = patterns.iter().map(|p| p.to_lowercase()).collect();
    tokens
        .iter()
        .find(|t| {
            let token = t.to_lowercase();
            lowered.iter().any(|p| !p.is_empty() && token.contains(p.as_str()))
        })
        .or_else(|| tokens.first())
        .map(|t| t.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hints() -> IdentityHints {
        IdentityHints::from_config(&ScanConfig::default())
    }

    #[test]
    fn test_ip_in_subnet_preferred() {
        // 192.x window appears first, 172.22 window later
        let payload = [0x00, 192, 168, 1, 5, 0x00, 172, 22, 10, 42];
        let guess = guess_identity(&payload, &hints());
        assert_eq!(guess.ip, Some(Ipv4Addr::new(172, 22, 10, 42)));
    }

    #[test]
    fn test_ip_private_fallback() {
        let payload = [0x00, 0x00, 10, 1, 2, 3];
        let guess = guess_identity(&payload, &hints());
        assert_eq!(guess.ip, Some(Ipv4Addr::new(10, 1, 2, 3)));
    }

    #[test]
    fn test_ip_none() {
        let guess = guess_identity(&[0x00, 0x01, 0x02, 0x03, 0x04], &hints());
        assert!(guess.ip.is_none());
        assert!(guess_identity(&[172, 22, 10], &hints()).ip.is_none());
    }

    #[test]
    fn test_serial_from_leading_bytes() {
        let payload = [0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x00, 0x00, 0x01, 0xFF];
        let guess = guess_identity(&payload, &hints());
        assert_eq!(guess.serial.as_deref(), Some("DEADBEEF00000001"));
    }

    #[test]
    fn test_serial_skipped_for_zero_block_or_short_payload() {
        assert!(guess_identity(&[0u8; 12], &hints()).serial.is_none());
        assert!(guess_identity(&[1, 2, 3, 4, 5, 6, 7], &hints()).serial.is_none());
    }

    #[test]
    fn test_name_prefers_known_pattern() {
        let mut payload = vec![0x00; 8];
        payload.extend_from_slice(b"abc-board\0\0\x02ipsc-strobe-2\0fw 1.2");
        let guess = guess_identity(&payload, &hints());
        assert_eq!(guess.name.as_deref(), Some("ipsc-strobe-2"));
    }

    #[test]
    fn test_name_falls_back_to_first_token() {
        let payload = b"\x00\x00xy\x00\xffcamera-07\x00unit";
        let guess = guess_identity(payload, &hints());
        assert_eq!(guess.name.as_deref(), Some("camera-07"));
    }

    #[test]
    fn test_name_none_without_text() {
        let guess = guess_identity(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x00, 0x00, 0x00], &hints());
        assert!(guess.name.is_none());
    }

    #[test]
    fn test_empty_payload() {
        assert_eq!(guess_identity(&[], &hints()), IdentityGuess::default());
    }
}
