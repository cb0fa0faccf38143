//! Pure input validators.
//!
//! Each function takes one primitive input and returns a bool; no I/O, no
//! retries, deterministic on input. The CLI and the domain wizard share these.

use regex::Regex;
use std::sync::OnceLock;

/// Port: decimal digits only, in `[1, 65535]`. Sign prefixes are rejected
/// even though `u32::from_str` would take them.
pub fn valid_port(input: &str) -> bool {
    !input.is_empty()
        && input.chars().all(|c| c.is_ascii_digit())
        && matches!(input.parse::<u32>(), Ok(p) if (1..=65535).contains(&p))
}

/// IPv4: four dot-separated groups, each an integer in `[0, 255]`.
///
/// Leading zeros are accepted (`01.1.1.1` passes), matching the permissive
/// group-wise parse this replaces.
pub fn valid_ipv4(input: &str) -> bool {
    let groups: Vec<&str> = input.split('.').collect();
    groups.len() == 4
        && groups.iter().all(|g| {
            !g.is_empty()
                && g.chars().all(|c| c.is_ascii_digit())
                && g.parse::<u32>().map(|n| n <= 255).unwrap_or(false)
        })
}

/// Subdomain label: alphanumeric first and last char, `[a-zA-Z0-9-]` inside,
/// total length <= 63.
pub fn valid_subdomain(input: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?$").unwrap()
    });
    re.is_match(input)
}

/// Password strength: length >= `min_len` with at least one ASCII letter and
/// one ASCII digit.
pub fn valid_password(input: &str, min_len: usize) -> bool {
    input.len() >= min_len
        && input.chars().any(|c| c.is_ascii_alphabetic())
        && input.chars().any(|c| c.is_ascii_digit())
}

/// Well-formed JSON.
pub fn valid_json(input: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(input).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_port_range() {
        assert!(valid_port("1"));
        assert!(valid_port("8080"));
        assert!(valid_port("65535"));
        assert!(!valid_port("0"));
        assert!(!valid_port("65536"));
        assert!(!valid_port("-1"));
        assert!(!valid_port("+80"));
        assert!(!valid_port("abc"));
        assert!(!valid_port(""));
    }

    #[test]
    fn test_valid_ipv4() {
        assert!(valid_ipv4("192.168.1.1"));
        assert!(valid_ipv4("0.0.0.0"));
        assert!(valid_ipv4("255.255.255.255"));
        assert!(!valid_ipv4("256.1.1.1"));
        assert!(!valid_ipv4("1.2.3"));
        assert!(!valid_ipv4("1.2.3.4.5"));
        assert!(!valid_ipv4("a.b.c.d"));
        assert!(!valid_ipv4("1.2.3."));
    }

    #[test]
    fn test_valid_ipv4_leading_zero_accepted() {
        // Documented permissive behavior.
        assert!(valid_ipv4("01.1.1.1"));
    }

    #[test]
    fn test_valid_subdomain() {
        assert!(valid_subdomain("my-frappe"));
        assert!(valid_subdomain("a"));
        assert!(valid_subdomain("erp2"));
        assert!(!valid_subdomain("-bad"));
        assert!(!valid_subdomain("bad-"));
        assert!(!valid_subdomain(""));
        assert!(!valid_subdomain("with.dot"));
    }

    #[test]
    fn test_valid_subdomain_length_limit() {
        let max = "a".repeat(63);
        assert!(valid_subdomain(&max));
        let too_long = "a".repeat(64);
        assert!(!valid_subdomain(&too_long));
    }

    #[test]
    fn test_valid_password() {
        assert!(valid_password("abcd1234", 8));
        assert!(!valid_password("abcdefgh", 8)); // no digit
        assert!(!valid_password("12345678", 8)); // no letter
        assert!(!valid_password("ab1", 8)); // too short
        assert!(valid_password("ab1", 3));
    }

    #[test]
    fn test_valid_json() {
        assert!(valid_json(r#"[{"url": "x", "branch": "y"}]"#));
        assert!(valid_json("{}"));
        assert!(!valid_json("{not json"));
        assert!(!valid_json(""));
    }
}
