use chrono::NaiveDateTime;
use sha2::{Digest, Sha256};

/// Synthetic sale key: hex SHA-256 of `"{product_id}|{purchase_ts}"` with the
/// timestamp at second granularity.
///
/// Absent parts are skipped rather than rendered, so a sale with no parsable
/// purchase time hashes its product id alone. Two sales of one product within
/// the same second share a key.
pub fn compute_order_id(product_id: Option<&str>, purchase_ts: Option<NaiveDateTime>) -> String {
    let purchase = purchase_ts.map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string());
    let canonical = [product_id.map(str::to_string), purchase]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("|");

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32, s: u32, milli: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_milli_opt(h, m, s, milli)
            .unwrap()
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            compute_order_id(Some("P1"), Some(ts(10, 0, 0, 0))),
            "dbac71f36c36e518ce7fed170d647f80da6ce36d05485cfbd4b3ee33856e762b"
        );
    }

    #[test]
    fn test_sub_second_purchases_collide() {
        assert_eq!(
            compute_order_id(Some("P1"), Some(ts(10, 0, 0, 120))),
            compute_order_id(Some("P1"), Some(ts(10, 0, 0, 980)))
        );
        assert_ne!(
            compute_order_id(Some("P1"), Some(ts(10, 0, 0, 0))),
            compute_order_id(Some("P1"), Some(ts(10, 0, 1, 0)))
        );
    }

    #[test]
    fn test_null_parts_are_skipped() {
        assert_eq!(
            compute_order_id(Some("P1"), None),
            "fbeae7c18667b6987518f3ae61ed8b19038e5961e8e7368597428eff76e4842a"
        );
        assert_eq!(
            compute_order_id(None, None),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
