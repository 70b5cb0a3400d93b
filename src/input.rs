use std::str::FromStr;

use crate::{
    clock::PlaybackClock,
    config::InputCfg,
    error::{ChatError, ChatResult},
    formats::time::{parse_time_param, set_time_query},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Space,
}

impl FromStr for Key {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "arrowleft" | "left" => Ok(Key::ArrowLeft),
            "arrowright" | "right" => Ok(Key::ArrowRight),
            "arrowup" | "up" => Ok(Key::ArrowUp),
            "arrowdown" | "down" => Ok(Key::ArrowDown),
            "space" => Ok(Key::Space),
            _ => Err(ChatError::UnknownKey {
                name: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    SeekBy(i64),
    TogglePlayback,
}

pub fn key_action(key: Key, cfg: &InputCfg) -> KeyAction {
    let small = cfg.small_step_ms as i64;
    let large = cfg.large_step_ms as i64;
    match key {
        Key::ArrowLeft => KeyAction::SeekBy(-small),
        Key::ArrowRight => KeyAction::SeekBy(small),
        Key::ArrowDown => KeyAction::SeekBy(-large),
        Key::ArrowUp => KeyAction::SeekBy(large),
        Key::Space => KeyAction::TogglePlayback,
    }
}

/// Applies `key` to the clock. Keys are ignored unless the player is `active`.
pub fn handle_key(key: Key, clock: &mut impl PlaybackClock, cfg: &InputCfg, active: bool) -> bool {
    if !active {
        return false;
    }

    match key_action(key, cfg) {
        KeyAction::SeekBy(delta) => clock.seek_by(delta),
        KeyAction::TogglePlayback => clock.toggle(),
    }
    tracing::debug!(?key, time_ms = clock.current_time_ms(), "key handled");
    true
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub time_ms: u64,
    pub url: String,
}

/// Bookmark navigation stack; each bookmark seek pushes a shareable URL.
#[derive(Debug, Clone)]
pub struct History {
    base_url: String,
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, time_ms: u64) -> ChatResult<&HistoryEntry> {
        let url = set_time_query(&self.base_url, time_ms)?;
        self.entries.push(HistoryEntry { time_ms, url });
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Steps back one entry and returns the position to restore (0 when the
    /// stack runs out).
    pub fn back(&mut self) -> u64 {
        self.entries.pop();
        self.current().map(|e| e.time_ms).unwrap_or(0)
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn current_url(&self) -> &str {
        self.current().map(|e| e.url.as_str()).unwrap_or(&self.base_url)
    }
}

/// One line of a replay control script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Wait(u64),
    Key(Key),
    Bookmark(u64),
    Delay(i64),
    Back,
    Play,
    Pause,
}

/// Parses a control script: one step per line, `#` starts a comment.
///
/// ```text
/// play
/// wait 10000
/// key ArrowLeft
/// bookmark 1:05
/// delay -500
/// back
/// ```
pub fn parse_script(raw: &str) -> ChatResult<Vec<Step>> {
    let mut steps = Vec::new();

    for (line_no, raw_line) in raw.lines().enumerate() {
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let bad = |reason: String| ChatError::Script {
            line: line_no + 1,
            reason,
        };

        let (cmd, arg) = match line.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (line, ""),
        };

        let step = match cmd.to_lowercase().as_str() {
            "wait" => Step::Wait(
                arg.parse()
                    .map_err(|_| bad(format!("expected milliseconds, got '{arg}'")))?,
            ),
            "key" => Step::Key(arg.parse().map_err(|e: ChatError| bad(e.to_string()))?),
            "bookmark" => Step::Bookmark(parse_time_param(arg).map_err(|e| bad(e.to_string()))?),
            "delay" => Step::Delay(
                arg.parse()
                    .map_err(|_| bad(format!("expected signed milliseconds, got '{arg}'")))?,
            ),
            "back" => Step::Back,
            "play" => Step::Play,
            "pause" => Step::Pause,
            other => return Err(bad(format!("unknown step '{other}'"))),
        };
        steps.push(step);
    }

    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimulatedClock;
    use pretty_assertions::assert_eq;

    #[test]
    fn arrow_keys_scrub_and_space_toggles() {
        let cfg = InputCfg::default();
        let mut clock = SimulatedClock::new(600_000);
        clock.seek_to(100_000);

        assert!(handle_key(Key::ArrowRight, &mut clock, &cfg, true));
        assert_eq!(clock.current_time_ms(), 105_000);
        handle_key(Key::ArrowDown, &mut clock, &cfg, true);
        assert_eq!(clock.current_time_ms(), 45_000);
        handle_key(Key::ArrowUp, &mut clock, &cfg, true);
        handle_key(Key::ArrowLeft, &mut clock, &cfg, true);
        assert_eq!(clock.current_time_ms(), 100_000);

        handle_key(Key::Space, &mut clock, &cfg, true);
        assert!(!clock.is_paused());
        handle_key(Key::Space, &mut clock, &cfg, true);
        assert!(clock.is_paused());
    }

    #[test]
    fn keys_ignored_when_inactive() {
        let mut clock = SimulatedClock::new(600_000);
        assert!(!handle_key(Key::ArrowUp, &mut clock, &InputCfg::default(), false));
        assert_eq!(clock.current_time_ms(), 0);
    }

    #[test]
    fn scrubbing_clamps_at_zero() {
        let mut clock = SimulatedClock::new(600_000);
        clock.seek_to(2_000);
        handle_key(Key::ArrowLeft, &mut clock, &InputCfg::default(), true);
        assert_eq!(clock.current_time_ms(), 0);
    }

    #[test]
    fn key_names() {
        assert_eq!("ArrowLeft".parse::<Key>().unwrap(), Key::ArrowLeft);
        assert_eq!("up".parse::<Key>().unwrap(), Key::ArrowUp);
        assert_eq!("SPACE".parse::<Key>().unwrap(), Key::Space);
        assert!("Enter".parse::<Key>().is_err());
    }

    #[test]
    fn history_pushes_urls_and_pops_back() {
        let mut h = History::new("https://example.org/video/7/");
        assert_eq!(h.current_url(), "https://example.org/video/7/");

        h.push(65_000).unwrap();
        let e = h.push(3_661_500).unwrap();
        assert_eq!(e.url, "https://example.org/video/7/?t=1:01:01.500");

        assert_eq!(h.back(), 65_000);
        assert_eq!(h.current_url(), "https://example.org/video/7/?t=01:05.000");
        assert_eq!(h.back(), 0);
        assert_eq!(h.back(), 0);
    }

    #[test]
    fn parses_script() {
        let raw = "# warm up\nplay\nwait 1500\nkey ArrowLeft  # rewind\nbookmark 1:05\ndelay -500\nback\npause\n";
        assert_eq!(
            parse_script(raw).unwrap(),
            vec![
                Step::Play,
                Step::Wait(1_500),
                Step::Key(Key::ArrowLeft),
                Step::Bookmark(65_000),
                Step::Delay(-500),
                Step::Back,
                Step::Pause,
            ]
        );
    }

    #[test]
    fn script_errors_carry_line_numbers() {
        let err = parse_script("play\nwait soon\n").unwrap_err();
        assert!(matches!(err, ChatError::Script { line: 2, .. }));

        let err = parse_script("jump 5").unwrap_err();
        assert!(matches!(err, ChatError::Script { line: 1, .. }));
    }
}
