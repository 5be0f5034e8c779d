use colored::*;
use md5::{Digest as Md5Digest, Md5};
use serde_json::Value;
use sha2::{Digest as Sha2Digest, Sha256};

pub fn get_optional_field<T: for<'de> serde::Deserialize<'de>>(
    map: &serde_json::Map<String, Value>,
    key: &str,
) -> Option<T> {
    map.get(key)
        .filter(|v| !v.is_null())
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

pub fn json_opt_to_string(value: &Option<serde_json::Value>) -> String {
    value.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

pub fn log_step(icon: &str, msg: &str) {
    println!("{} {}", icon.bright_yellow(), msg.yellow());
}

pub fn log_success(msg: &str) {
    println!("{} {}", "✅".green(), msg.green());
}

pub fn log_warn(msg: &str) {
    println!(
        "{} {}",
        "⚠️".truecolor(230, 160, 40),
        msg.truecolor(230, 160, 40)
    );
}

pub fn log_error(context: &str) -> String {
    format!("❌ [{}]", context)
}

/// `content_hash = md5(title + content)`, SPEC_FULL §4.4.3.
pub fn md5_hex(data: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

/// sha256 content_hash carried in the object cache's metadata sidecar, §6.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// First 8 hex chars of `md5(url)`, used in the cache key, §4.3.
pub fn url_md5_8(url: &str) -> String {
    md5_hex(url)[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_hex_is_stable() {
        assert_eq!(md5_hex("abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn url_md5_8_is_first_eight_hex_chars() {
        let full = md5_hex("https://example.com/page");
        assert_eq!(url_md5_8("https://example.com/page"), &full[..8]);
        assert_eq!(url_md5_8("https://example.com/page").len(), 8);
    }
}
