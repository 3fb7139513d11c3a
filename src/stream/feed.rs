//! # stream::feed
//!
//! Frame decoding and asset-id normalization for the price feed.
//!
//! Wire format: one JSON object per frame, feed asset id → string decimal.
//! ```json
//! { "bitcoin": "50300.12", "bitcoin-cash": "301.5" }
//! ```

use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use crate::error::FeedError;

/// Decode one frame into `(feed_id, price)` pairs, in payload order.
///
/// The frame is validated as a whole: a single bad entry drops the entire
/// frame so that no partial update reaches the baselines.
pub fn decode_frame(text: &str) -> Result<Vec<(String, f64)>, FeedError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(entries) = value else {
        return Err(FeedError::NotAnObject);
    };

    entries
        .into_iter()
        .map(|(asset, raw)| {
            let Value::String(raw) = raw else {
                return Err(FeedError::NotAString { asset });
            };
            match raw.trim().parse::<f64>() {
                Ok(price) if price.is_finite() => Ok((asset, price)),
                _ => Err(FeedError::BadPrice { asset, raw }),
            }
        })
        .collect()
}

// ─── AssetIdMapper ────────────────────────────────────────────────────────────

/// Maps feed ids (hyphenated, e.g. `bitcoin-cash`) to internal ids.
///
/// Explicit aliases win; otherwise hyphens are stripped. Stripping is lossy,
/// so the first feed id seen for each internal id is remembered and a
/// second, different feed id landing on the same internal id is logged.
#[derive(Debug, Default, Clone)]
pub struct AssetIdMapper {
    aliases: HashMap<String, String>,
    origins: HashMap<String, String>,
}

impl AssetIdMapper {
    pub fn new(aliases: HashMap<String, String>) -> Self {
        Self {
            aliases,
            origins: HashMap::new(),
        }
    }

    pub fn normalize(&mut self, feed_id: &str) -> String {
        let internal = match self.aliases.get(feed_id) {
            Some(alias) => alias.clone(),
            None => feed_id.chars().filter(|c| *c != '-').collect(),
        };

        match self.origins.get(&internal) {
            Some(origin) if origin != feed_id => {
                warn!(
                    feed_id,
                    first_feed_id = %origin,
                    internal_id   = %internal,
                    "⚠️ Two feed ids normalize to the same asset, add an alias"
                );
            }
            Some(_) => {}
            None => {
                self.origins.insert(internal.clone(), feed_id.to_string());
            }
        }
        internal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_in_payload_order() {
        let frame = r#"{"ripple":"0.61","bitcoin":"50300.5","ethereum":" 2000 "}"#;
        let entries = decode_frame(frame).unwrap();
        assert_eq!(
            entries,
            vec![
                ("ripple".to_string(), 0.61),
                ("bitcoin".to_string(), 50_300.5),
                ("ethereum".to_string(), 2_000.0),
            ]
        );
    }

    #[test]
    fn test_rejects_malformed_frames() {
        assert!(matches!(decode_frame("not json"), Err(FeedError::Json(_))));
        assert!(matches!(decode_frame(r#"["bitcoin"]"#), Err(FeedError::NotAnObject)));
        assert!(matches!(
            decode_frame(r#"{"bitcoin":50300}"#),
            Err(FeedError::NotAString { .. })
        ));
        assert!(matches!(
            decode_frame(r#"{"bitcoin":"50300","ethereum":"abc"}"#),
            Err(FeedError::BadPrice { .. })
        ));
        assert!(matches!(
            decode_frame(r#"{"bitcoin":"NaN"}"#),
            Err(FeedError::BadPrice { .. })
        ));
    }

    #[test]
    fn test_empty_object_is_a_valid_frame() {
        assert!(decode_frame("{}").unwrap().is_empty());
    }

    #[test]
    fn test_normalization_strips_hyphens_unless_aliased() {
        let mut aliases = HashMap::new();
        aliases.insert("usd-coin".to_string(), "usdc".to_string());
        let mut mapper = AssetIdMapper::new(aliases);

        assert_eq!(mapper.normalize("bitcoin"), "bitcoin");
        assert_eq!(mapper.normalize("bitcoin-cash"), "bitcoincash");
        assert_eq!(mapper.normalize("usd-coin"), "usdc");
    }

    #[test]
    fn test_colliding_ids_still_normalize() {
        let mut mapper = AssetIdMapper::default();
        assert_eq!(mapper.normalize("wrapped-bitcoin"), "wrappedbitcoin");
        // same internal id from a different feed id: logged, not rejected
        assert_eq!(mapper.normalize("wrappedbit-coin"), "wrappedbitcoin");
    }
}
