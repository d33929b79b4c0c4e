//! Display formatting for API values: dates, durations and view counts.

use chrono::DateTime;

/// Format an RFC 3339 timestamp as `MM/DD/YYYY`.
///
/// The calendar date is taken as written in the timestamp (no local-time
/// conversion). Unparseable input is returned unchanged.
pub fn format_date(iso: &str) -> String {
  match DateTime::parse_from_rfc3339(iso.trim()) {
    Ok(dt) => dt.format("%m/%d/%Y").to_string(),
    Err(_) => iso.to_string(),
  }
}

/// Convert an ISO-8601 duration (`PT1H2M3S`, `P1DT4M`) into `H:MM:SS` or `M:SS`.
///
/// Returns `None` for live streams (`P0D`), anything that isn't a duration, and
/// durations too long to count in seconds.
pub fn format_duration(iso: &str) -> Option<String> {
  let rest = iso.strip_prefix('P')?;
  let mut total: u64 = 0;
  let mut num = String::new();
  let mut in_time = false;
  let mut seen_unit = false;

  for c in rest.chars() {
    match c {
      '0'..='9' => num.push(c),
      'T' => in_time = true,
      _ => {
        let n: u64 = num.parse().ok()?;
        num.clear();
        let unit: u64 = match (c, in_time) {
          ('W', false) => 7 * 86_400,
          ('D', false) => 86_400,
          ('H', true) => 3_600,
          ('M', true) => 60,
          ('S', true) => 1,
          _ => return None,
        };
        total = n.checked_mul(unit).and_then(|secs| total.checked_add(secs))?;
        seen_unit = true;
      }
    }
  }

  if !num.is_empty() || !seen_unit || total == 0 {
    return None;
  }

  let (h, m, s) = (total / 3_600, (total % 3_600) / 60, total % 60);
  if h > 0 { Some(format!("{}:{:02}:{:02}", h, m, s)) } else { Some(format!("{}:{:02}", m, s)) }
}

/// Compact view count: `999 views`, `1.2K views`, `3.4M views`, `1.1B views`.
pub fn format_views(raw: &str) -> Option<String> {
  let n: u64 = raw.trim().parse().ok()?;
  let text = match n {
    1 => return Some("1 view".to_string()),
    0..1_000 => n.to_string(),
    1_000..1_000_000 => compact(n as f64 / 1e3, "K"),
    1_000_000..1_000_000_000 => compact(n as f64 / 1e6, "M"),
    _ => compact(n as f64 / 1e9, "B"),
  };
  Some(format!("{} views", text))
}

fn compact(value: f64, suffix: &str) -> String {
  if value >= 100.0 {
    format!("{}{}", value.floor() as u64, suffix)
  } else {
    let rounded = (value * 10.0).floor() / 10.0;
    if rounded.fract() == 0.0 { format!("{}{}", rounded as u64, suffix) } else { format!("{:.1}{}", rounded, suffix) }
  }
}
