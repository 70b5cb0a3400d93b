use url::Url;

use crate::error::{ChatError, ChatResult};

/// Query parameter carrying the playback position in shared links.
pub const TIME_PARAM: &str = "t";

/// Parses `[[hours:]minutes:]seconds[.fraction]` into milliseconds.
///
/// Components are read left to right as `total * 60 + component`, so `"90"`,
/// `"1:30"` and `"0:1:30"` all mean the same position.
pub fn parse_time_param(s: &str) -> ChatResult<u64> {
    let t = s.trim();
    let bad = || ChatError::BadTime {
        input: s.to_string(),
    };

    if t.is_empty() {
        return Err(bad());
    }

    let mut total = 0.0f64;
    for part in t.split(':') {
        let v: f64 = part.trim().parse().map_err(|_| bad())?;
        if !v.is_finite() || v < 0.0 {
            return Err(bad());
        }
        total = total * 60.0 + v;
    }

    Ok((total * 1000.0).round() as u64)
}

/// Formats milliseconds as `[h:][mm:]ss.mmm`, dropping leading zero components.
pub fn format_time_param(ms: u64) -> String {
    let milli = ms % 1000;
    let total_seconds = ms / 1000;
    let sec = total_seconds % 60;
    let total_minutes = total_seconds / 60;
    let min = total_minutes % 60;
    let hour = total_minutes / 60;

    if hour > 0 {
        format!("{hour}:{min:02}:{sec:02}.{milli:03}")
    } else if min > 0 {
        format!("{min:02}:{sec:02}.{milli:03}")
    } else {
        format!("{sec:02}.{milli:03}")
    }
}

/// Formats milliseconds as `mm:ss` (or `h:mm:ss`) for chat line prefixes.
pub fn format_clock(ms: i64) -> String {
    let total_seconds = ms.max(0) / 1000;
    let sec = total_seconds % 60;
    let total_minutes = total_seconds / 60;
    let min = total_minutes % 60;
    let hour = total_minutes / 60;

    if hour > 0 {
        format!("{hour}:{min:02}:{sec:02}")
    } else {
        format!("{min:02}:{sec:02}")
    }
}

pub fn seconds_to_ms(seconds: f64) -> ChatResult<u64> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ChatError::BadTime {
            input: seconds.to_string(),
        });
    }
    Ok((seconds * 1000.0).round() as u64)
}

/// Returns `base` with its `t` parameter replaced by `ms`; other parameters are kept.
pub fn set_time_query(base: &str, ms: u64) -> ChatResult<String> {
    let mut url = Url::parse(base).map_err(|_| ChatError::BadUrl {
        input: base.to_string(),
    })?;

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != TIME_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut qp = url.query_pairs_mut();
        qp.clear();
        for (k, v) in &kept {
            qp.append_pair(k, v);
        }
        qp.append_pair(TIME_PARAM, &format_time_param(ms));
    }

    Ok(url.to_string().replace("%3A", ":"))
}

/// Reads the `t` parameter from a page URL, if present.
pub fn time_from_url(page: &str) -> ChatResult<Option<u64>> {
    let url = Url::parse(page).map_err(|_| ChatError::BadUrl {
        input: page.to_string(),
    })?;

    match url.query_pairs().find(|(k, _)| k == TIME_PARAM) {
        Some((_, v)) => parse_time_param(&v).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_colon_separated_components() {
        assert_eq!(parse_time_param("90").unwrap(), 90_000);
        assert_eq!(parse_time_param("1:30").unwrap(), 90_000);
        assert_eq!(parse_time_param("0:1:30").unwrap(), 90_000);
        assert_eq!(parse_time_param("1:01:01.5").unwrap(), 3_661_500);
        assert_eq!(parse_time_param("05.200").unwrap(), 5_200);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_time_param("").is_err());
        assert!(parse_time_param("abc").is_err());
        assert!(parse_time_param("1::2").is_err());
        assert!(parse_time_param("-5").is_err());
    }

    #[test]
    fn omits_zero_leading_components() {
        assert_eq!(format_time_param(0), "00.000");
        assert_eq!(format_time_param(5_200), "05.200");
        assert_eq!(format_time_param(65_000), "01:05.000");
        assert_eq!(format_time_param(3_605_000), "1:00:05.000");
        assert_eq!(format_time_param(3_661_500), "1:01:01.500");
    }

    #[test]
    fn format_then_parse_is_identity() {
        for seconds in [0.0, 5.2, 65.0, 3661.5] {
            let ms = seconds_to_ms(seconds).unwrap();
            assert_eq!(parse_time_param(&format_time_param(ms)).unwrap(), ms);
        }
    }

    #[test]
    fn url_keeps_other_params_and_readable_colons() {
        let url = set_time_query("https://example.org/video/3/?lang=en&t=5", 3_661_500).unwrap();
        assert_eq!(url, "https://example.org/video/3/?lang=en&t=1:01:01.500");
        assert_eq!(time_from_url(&url).unwrap(), Some(3_661_500));
        assert_eq!(time_from_url("https://example.org/video/3/").unwrap(), None);
    }

    #[test]
    fn clock_prefix() {
        assert_eq!(format_clock(-20), "00:00");
        assert_eq!(format_clock(65_999), "01:05");
        assert_eq!(format_clock(3_725_000), "1:02:05");
    }
}
