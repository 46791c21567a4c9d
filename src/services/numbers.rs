//! Identifier generation, Luhn validation, and PIN hashing.
//!
//! Stateless apart from the configured routing number. PINs are stored as
//! `salt_hex$mac_hex` where the MAC is HMAC-SHA256 keyed with a fresh random
//! salt per hash — one-way and salted, verified in constant time.

use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const ID_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates account/card/loan/transaction identifiers and handles PIN
/// secrets.
#[derive(Debug, Clone)]
pub struct NumberGenerator {
    routing_number: String,
}

impl NumberGenerator {
    pub fn new(routing_number: impl Into<String>) -> Self {
        Self {
            routing_number: routing_number.into(),
        }
    }

    /// The 9-digit routing number shared by every account in this ledger.
    pub fn routing_number(&self) -> &str {
        &self.routing_number
    }

    /// Random 10-digit account number.
    pub fn account_number(&self) -> String {
        let mut rng = rand::rng();
        (0..10).map(|_| char::from(b'0' + rng.random_range(0..10))).collect()
    }

    /// Luhn-valid 16-digit card number: fixed network prefix, 14 random
    /// digits, check digit.
    pub fn card_number(&self) -> String {
        let mut rng = rand::rng();
        let mut partial = String::from("4");
        for _ in 0..14 {
            partial.push(char::from(b'0' + rng.random_range(0..10)));
        }
        let check = luhn_check_digit(&partial);
        partial.push(char::from(b'0' + check));
        partial
    }

    /// 3-digit card verification code, zero-padded.
    pub fn cvv(&self) -> String {
        format!("{:03}", rand::rng().random_range(0..1000u32))
    }

    /// Time-ordered transaction reference: `TXN` + base-36 millisecond
    /// timestamp + 8 random characters.
    pub fn transaction_id(&self) -> String {
        format!("TXN{}{}", base36_timestamp(), random_suffix(8))
    }

    /// Time-ordered loan reference: `LN` + base-36 millisecond timestamp +
    /// 6 random characters.
    pub fn loan_id(&self) -> String {
        format!("LN{}{}", base36_timestamp(), random_suffix(6))
    }

    /// Device id: `ATM-` + 8 hex characters.
    pub fn atm_id(&self) -> String {
        let raw = Uuid::new_v4().simple().to_string();
        format!("ATM-{}", raw[..8].to_uppercase())
    }

    /// Hash a PIN with a fresh random salt.
    pub fn hash_pin(&self, pin: &str) -> String {
        let mut salt = [0u8; 16];
        rand::rng().fill(&mut salt);
        let mac = pin_mac(&salt, pin);
        format!("{}${}", hex::encode(salt), hex::encode(mac))
    }

    /// Verify a PIN against a stored `salt$mac` hash. Malformed stored
    /// values simply fail verification.
    pub fn verify_pin(&self, pin: &str, stored: &str) -> bool {
        let Some((salt_hex, mac_hex)) = stored.split_once('$') else {
            return false;
        };
        let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(mac_hex)) else {
            return false;
        };
        let mut mac = HmacSha256::new_from_slice(&salt).expect("HMAC accepts any key length");
        mac.update(pin.as_bytes());
        // Constant-time comparison
        mac.verify_slice(&expected).is_ok()
    }
}

fn pin_mac(salt: &[u8], pin: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(salt).expect("HMAC accepts any key length");
    mac.update(pin.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Validate a 16-digit number against its Luhn check digit.
pub fn is_valid_card_number(card_number: &str) -> bool {
    if card_number.len() != 16 || !card_number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let mut sum = 0u32;
    let mut alternate = false;
    for b in card_number.bytes().rev() {
        let mut digit = (b - b'0') as u32;
        if alternate {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
        alternate = !alternate;
    }
    sum % 10 == 0
}

fn luhn_check_digit(partial: &str) -> u8 {
    let mut sum = 0u32;
    let mut alternate = true;
    for b in partial.bytes().rev() {
        let mut digit = (b - b'0') as u32;
        if alternate {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
        alternate = !alternate;
    }
    ((10 - (sum % 10)) % 10) as u8
}

/// Current time in milliseconds, base-36, most significant digit first.
fn base36_timestamp() -> String {
    let mut millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    if millis == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while millis > 0 {
        let d = (millis % 36) as u8;
        let c = if d < 10 { b'0' + d } else { b'A' + (d - 10) };
        digits.push(c as char);
        millis /= 36;
    }
    digits.iter().rev().collect()
}

fn random_suffix(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| ID_CHARSET[rng.random_range(0..ID_CHARSET.len())] as char)
        .collect()
}
