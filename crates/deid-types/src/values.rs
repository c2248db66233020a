//! Syntax checks for values of specific semantic types.

use std::net::IpAddr;
use std::sync::LazyLock;

use regex::Regex;

/// Address syntax per RFC 5322 `dot-atom` local parts and RFC 1035 labels.
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("Invalid email regex")
});

static SSN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d{3}-\d{2}-\d{4}|\d{9})$").expect("Invalid SSN regex"));

/// Local part is limited to 64 octets, the whole address to 254.
pub fn check_email(value: &str) -> Result<(), String> {
    if value.len() > 254 {
        return Err("email address longer than 254 characters".to_string());
    }
    let Some((local, _)) = value.rsplit_once('@') else {
        return Err("email address has no '@'".to_string());
    };
    if local.len() > 64 {
        return Err("email local part longer than 64 characters".to_string());
    }
    if EMAIL_REGEX.is_match(value) {
        Ok(())
    } else {
        Err("not a syntactically valid email address".to_string())
    }
}

pub fn check_ip_address(value: &str) -> Result<(), String> {
    value
        .trim()
        .parse::<IpAddr>()
        .map(|_| ())
        .map_err(|_| "not a valid IPv4 or IPv6 address".to_string())
}

pub fn check_ssn(value: &str) -> Result<(), String> {
    if SSN_REGEX.is_match(value.trim()) {
        Ok(())
    } else {
        Err("expected NNN-NN-NNNN or nine digits".to_string())
    }
}

/// Digits with common separators; 7 to 15 digits (E.164 upper bound).
pub fn check_phone_number(value: &str) -> Result<(), String> {
    let trimmed = value.trim();
    if let Some(ch) = trimmed
        .chars()
        .find(|ch| !(ch.is_ascii_digit() || matches!(ch, ' ' | '+' | '-' | '(' | ')' | '.')))
    {
        return Err(format!("unexpected character '{ch}' in phone number"));
    }
    let digits = trimmed.chars().filter(char::is_ascii_digit).count();
    if (7..=15).contains(&digits) {
        Ok(())
    } else {
        Err(format!("phone number has {digits} digits, expected 7 to 15"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_syntax() {
        assert!(check_email("jane.doe@example.com").is_ok());
        assert!(check_email("x+tag@sub.example.org").is_ok());
        assert!(check_email("jane@localhost").is_err());
        assert!(check_email("jane..doe@example.com").is_err());
        assert!(check_email(".jane@example.com").is_err());
        assert!(check_email("jane@-example.com").is_err());
        assert!(check_email("no-at-sign").is_err());
        assert!(check_email(&format!("{}@example.com", "a".repeat(65))).is_err());
    }

    #[test]
    fn ip_addresses() {
        assert!(check_ip_address("192.168.0.1").is_ok());
        assert!(check_ip_address("::1").is_ok());
        assert!(check_ip_address("2001:db8::8a2e:370:7334").is_ok());
        assert!(check_ip_address("256.1.1.1").is_err());
        assert!(check_ip_address("host.example").is_err());
    }

    #[test]
    fn ssn_layouts() {
        assert!(check_ssn("123-45-6789").is_ok());
        assert!(check_ssn("123456789").is_ok());
        assert!(check_ssn("12-345-6789").is_err());
        assert!(check_ssn("1234567890").is_err());
    }

    #[test]
    fn phone_numbers() {
        assert!(check_phone_number("+1 (555) 010-9999").is_ok());
        assert!(check_phone_number("555.0100").is_ok());
        assert!(check_phone_number("555-01").is_err());
        assert!(check_phone_number("call me").is_err());
    }
}
