//! Request signing for the affiliate open API.
//!
//! The signed string is `secret + path + sorted(key + value) + body + secret`
//! (body omitted for multipart or empty bodies), HMAC-SHA256 keyed by the
//! app secret, hex encoded.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;

type HmacSha256 = Hmac<Sha256>;

/// Query keys never included in the signature.
const EXCLUDED_KEYS: [&str; 2] = ["sign", "access_token"];

/// Query key whose comma-separated value must reach the server unencoded.
const RAW_KEY: &str = "product_ids";

pub fn sign_request(
    params: &BTreeMap<String, String>,
    body: Option<&str>,
    secret: &str,
    path: &str,
    content_type: &str,
) -> String {
    let mut payload = String::with_capacity(path.len() + 64);
    payload.push_str(secret);
    payload.push_str(path);
    for (key, value) in params.iter().filter(|(k, _)| !EXCLUDED_KEYS.contains(&k.as_str())) {
        payload.push_str(key);
        payload.push_str(value);
    }
    if content_type != "multipart/form-data" {
        if let Some(body) = body.filter(|b| !b.is_empty()) {
            payload.push_str(body);
        }
    }
    payload.push_str(secret);

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Build a query string with percent-encoded values, except `product_ids`
/// whose commas are kept literal.
pub fn build_query_string(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(key, value)| {
            let value = if key == RAW_KEY {
                value.clone()
            } else {
                encode_component(value)
            };
            format!("{}={}", encode_component(key), value)
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("timestamp".to_string(), "1700000000".to_string()),
            ("app_key".to_string(), "6abc".to_string()),
            ("product_ids".to_string(), "1,2,3".to_string()),
        ])
    }

    fn reference_sign(secret: &str, input: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(input.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_signature_covers_sorted_params_wrapped_in_secret() {
        let path = "/affiliate_creator/202509/open_collaborations/products";
        let sign = sign_request(&params(), None, "s3cr3t", path, "application/json");

        let expected_input =
            format!("s3cr3t{path}app_key6abcproduct_ids1,2,3timestamp1700000000s3cr3t");
        assert_eq!(sign, reference_sign("s3cr3t", &expected_input));
        assert_eq!(sign.len(), 64);
        assert!(sign.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_sign_and_access_token_are_ignored() {
        let path = "/p";
        let mut with_extra = params();
        with_extra.insert("sign".to_string(), "old".to_string());
        with_extra.insert("access_token".to_string(), "tok".to_string());
        assert_eq!(
            sign_request(&params(), None, "k", path, "application/json"),
            sign_request(&with_extra, None, "k", path, "application/json"),
        );
    }

    #[test]
    fn test_body_is_signed_unless_multipart() {
        let json = sign_request(&params(), Some("{\"a\":1}"), "k", "/p", "application/json");
        let bare = sign_request(&params(), None, "k", "/p", "application/json");
        let multipart = sign_request(&params(), Some("{\"a\":1}"), "k", "/p", "multipart/form-data");
        assert_ne!(json, bare);
        assert_eq!(multipart, bare);
    }

    #[test]
    fn test_query_string_keeps_product_id_commas() {
        let mut p = params();
        p.insert("note".to_string(), "a b+c".to_string());
        let qs = build_query_string(&p);
        assert!(qs.contains("product_ids=1,2,3"));
        assert!(qs.contains("note=a%20b%2Bc"));
        assert!(qs.starts_with("app_key=6abc&"));
    }
}
