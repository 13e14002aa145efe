use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::time::Duration;

/// A rate-limit signal; `reset_in` is `None` when the response said nothing
/// about when the limit lifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub reset_in: Option<Duration>,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

/// 429 is always a rate limit. 403 only counts when GitHub marks it as one
/// (exhausted primary quota or a secondary-limit `retry-after`).
pub fn detect_rate_limit(
    status: StatusCode,
    headers: &HeaderMap,
    now: DateTime<Utc>,
) -> Option<RateLimit> {
    let retry_after = header_str(headers, "retry-after").and_then(|s| s.parse::<u64>().ok());
    let exhausted = header_str(headers, "x-ratelimit-remaining") == Some("0");

    let limited = match status {
        StatusCode::TOO_MANY_REQUESTS => true,
        StatusCode::FORBIDDEN => exhausted || retry_after.is_some(),
        _ => false,
    };
    if !limited {
        return None;
    }

    let reset_in = retry_after.map(Duration::from_secs).or_else(|| {
        let reset = header_str(headers, "x-ratelimit-reset")?.parse::<i64>().ok()?;
        let reset_at = DateTime::<Utc>::from_timestamp(reset, 0)?;
        Some((reset_at - now).to_std().unwrap_or(Duration::ZERO))
    });

    Some(RateLimit { reset_in })
}

/// Target of the `rel="next"` entry of a `Link` header.
pub fn next_link(headers: &HeaderMap) -> Option<String> {
    let link = header_str(headers, "link")?;
    link.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|p| {
            let p = p.trim();
            p == "rel=\"next\"" || p == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}
