use chrono::NaiveDate;
use rand::Rng;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

const FIELD_SEPARATOR: u8 = 0x1f;

/// The visible fields that make up a transaction's identity.
pub struct IdentityFields<'a> {
    pub company: &'a str,
    pub account: &'a str,
    pub date: Option<NaiveDate>,
    pub description: &'a str,
    pub doc: &'a str,
    pub amount: Decimal,
}

impl IdentityFields<'_> {
    fn feed(&self, hasher: &mut Sha256) {
        let date = self.date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default();
        let amount = self.amount.normalize().to_string();
        for field in [self.company, self.account, date.as_str(), self.description, self.doc, amount.as_str()] {
            feed_field(hasher, field);
        }
    }
}

// Length prefix keeps ("a|b", "c") and ("a", "b|c") apart.
fn feed_field(hasher: &mut Sha256, value: &str) {
    hasher.update(value.len().to_string().as_bytes());
    hasher.update(b":");
    hasher.update(value.as_bytes());
    hasher.update([FIELD_SEPARATOR]);
}

/// Deterministic id for an imported row.
pub fn transaction_id(fields: &IdentityFields<'_>) -> String {
    let mut hasher = Sha256::new();
    fields.feed(&mut hasher);
    hex::encode(hasher.finalize())
}

/// Id for a manual entry: identical visible fields still yield distinct ids.
pub fn manual_transaction_id(fields: &IdentityFields<'_>) -> String {
    let nonce: [u8; 16] = rand::thread_rng().gen();
    manual_transaction_id_with_nonce(fields, &nonce)
}

fn manual_transaction_id_with_nonce(fields: &IdentityFields<'_>, nonce: &[u8]) -> String {
    let mut hasher = Sha256::new();
    fields.feed(&mut hasher);
    feed_field(&mut hasher, "manual");
    feed_field(&mut hasher, &hex::encode(nonce));
    hex::encode(hasher.finalize())
}
