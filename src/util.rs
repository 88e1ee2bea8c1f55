//! Small utility helpers used across modules.

use rand::{distributions::Alphanumeric, Rng};

/// Fresh document id (UUID v4, hyphenated).
pub fn new_id() -> String {
  uuid::Uuid::new_v4().to_string()
}

/// Random alphanumeric token, used for resume links and dev credentials.
pub fn random_token(len: usize) -> String {
  rand::thread_rng()
    .sample_iter(&Alphanumeric)
    .take(len)
    .map(char::from)
    .collect()
}

/// Parse a string as a finite number. Answer values and rule values are
/// compared numerically whenever both sides parse; NaN/inf never count.
pub fn parse_number(s: &str) -> Option<f64> {
  let n: f64 = s.trim().parse().ok()?;
  if n.is_finite() { Some(n) } else { None }
}

/// Decoded payload size of a base64 `data:` URL, without decoding it.
/// Returns None when the string is not a base64 data URL.
pub fn data_url_decoded_len(url: &str) -> Option<usize> {
  let rest = url.strip_prefix("data:")?;
  let (meta, payload) = rest.split_once(',')?;
  if !meta.ends_with(";base64") {
    return None;
  }
  Some(base64::decoded_len_estimate(payload.len()))
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge answer payloads (file answers embed data URLs).
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let cut: String = s.chars().take(max).collect();
  format!("{}… ({} bytes total)", cut, s.len())
}
