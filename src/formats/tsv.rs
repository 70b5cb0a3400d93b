use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::{
    error::{ChatError, ChatResult},
    model::{Message, PlaybackWindow, Transcript},
};

const COL_TIMESTAMP: usize = 0;
const COL_TEAM: usize = 1;
const COL_USER: usize = 2;
const COL_TEXT: usize = 3;

/// Parses a headerless `timestamp \t team \t user \t text` chat log.
///
/// Timestamps are shifted by the window's start offset. Everything up to and
/// including the last row before the video start is dropped, and the tail is cut
/// at the first row past the video's end.
///
/// With `strict` set, a row whose timestamp is not a number fails the whole load;
/// otherwise the row is skipped with a warning.
pub fn parse_chat_tsv(raw: &str, window: &PlaybackWindow, strict: bool) -> ChatResult<Transcript> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(raw.as_bytes());

    let mut rows: Vec<Message> = Vec::new();
    let mut skipped = 0usize;

    for rec in rdr.records() {
        let rec = rec?;
        if rec.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        let line = rec.position().map(|p| p.line() as usize).unwrap_or(0);
        let ts_raw = rec.get(COL_TIMESTAMP).unwrap_or("");

        let Some(absolute_ms) = parse_int_prefix(ts_raw) else {
            if strict {
                return Err(ChatError::Parse {
                    line,
                    column: COL_TIMESTAMP,
                    value: ts_raw.to_string(),
                });
            }
            tracing::warn!(line, value = ts_raw, "skipping chat row with bad timestamp");
            skipped += 1;
            continue;
        };

        rows.push(row_to_message(&rec, window.normalize(absolute_ms)));
    }

    let parsed = rows.len();
    let (start, end) = visible_bounds(&rows, window.duration_ms);
    let messages: Vec<Message> = rows.drain(start..end).collect();

    let unsorted = messages
        .windows(2)
        .filter(|w| w[1].timestamp_ms < w[0].timestamp_ms)
        .count();
    if unsorted > 0 {
        tracing::warn!(unsorted, "chat rows are not in timestamp order");
    }

    tracing::debug!(
        parsed,
        skipped,
        dropped_before = start,
        dropped_after = parsed - end,
        kept = messages.len(),
        "chat rows trimmed to video window"
    );

    Ok(Transcript::new(messages))
}

fn row_to_message(rec: &StringRecord, timestamp_ms: i64) -> Message {
    Message {
        timestamp_ms,
        team_id: rec.get(COL_TEAM).unwrap_or("").to_string(),
        user_name: rec.get(COL_USER).unwrap_or("").to_string(),
        text: rec.get(COL_TEXT).unwrap_or("").to_string(),
    }
}

/// Returns the `[start, end)` range of rows inside `0..=duration_ms`.
fn visible_bounds(rows: &[Message], duration_ms: i64) -> (usize, usize) {
    let mut start = 0;
    let mut end = rows.len();

    for (i, m) in rows.iter().enumerate() {
        if m.timestamp_ms < 0 {
            start = i + 1;
        } else if m.timestamp_ms > duration_ms {
            end = i;
            break;
        }
    }

    (start, end.max(start))
}

/// Reads the leading decimal integer of `s`: `" 1500.7ms"` gives 1500.
fn parse_int_prefix(s: &str) -> Option<i64> {
    let t = s.trim_start();
    let (sign, digits) = match t.as_bytes().first() {
        Some(b'-') => (-1, &t[1..]),
        Some(b'+') => (1, &t[1..]),
        _ => (1, t),
    };

    let len = digits.bytes().take_while(|b| b.is_ascii_digit()).count();
    if len == 0 {
        return None;
    }

    digits[..len].parse::<i64>().ok().map(|v| v * sign)
}

/// Writes messages back out in absolute time, in the same layout they are read in.
pub fn write_chat_tsv(t: &Transcript, start_offset_ms: i64) -> ChatResult<String> {
    let mut wtr = WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(vec![]);

    for m in t.messages() {
        let ts = (m.timestamp_ms + start_offset_ms).to_string();
        wtr.write_record([
            ts.as_str(),
            m.team_id.as_str(),
            m.user_name.as_str(),
            m.text.as_str(),
        ])?;
    }

    let data = wtr.into_inner().map_err(|e| ChatError::Io(e.into_error()))?;
    String::from_utf8(data)
        .map_err(|e| ChatError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}
