//! Chat synchronisation: decides which transcript messages become visible as the
//! playback clock moves.
//!
//! The visible window after any tick is "every message at or before the current
//! time, capped to the most recent `max_messages`". Forward playback only appends;
//! a backward move clears the window and rebuilds it from a recomputed cursor.

use std::cell::RefCell;

use crate::{config::SyncCfg, model::Message, model::Transcript};

/// Position of the engine inside a transcript.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    /// Next message not yet handed to the renderer.
    pub index: usize,
    pub last_rendered_time_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickResult {
    /// Newly visible messages, oldest first.
    pub to_append: Vec<Message>,
    /// Previously rendered messages must be cleared before appending.
    pub did_reset: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickPolicy {
    pub max_messages: usize,
    pub prefill_on_seek: bool,
}

impl From<&SyncCfg> for TickPolicy {
    fn from(cfg: &SyncCfg) -> Self {
        Self {
            max_messages: cfg.max_messages,
            prefill_on_seek: cfg.prefill_on_seek,
        }
    }
}

/// Advances `cursor` to `current_time_ms` and returns what must be drawn.
pub fn tick(
    transcript: &Transcript,
    cursor: &mut Cursor,
    current_time_ms: i64,
    policy: &TickPolicy,
) -> TickResult {
    let mut did_reset = false;

    if current_time_ms < cursor.last_rendered_time_ms {
        did_reset = true;
        cursor.index = if policy.prefill_on_seek {
            transcript
                .first_index_after(current_time_ms)
                .saturating_sub(policy.max_messages)
        } else {
            transcript.first_index_at_or_after(current_time_ms)
        };
        tracing::debug!(
            from_ms = cursor.last_rendered_time_ms,
            to_ms = current_time_ms,
            index = cursor.index,
            "backward seek, chat window reset"
        );
    }

    let start = cursor.index.min(transcript.len());
    let mut end = start;
    while let Some(m) = transcript.get(end) {
        if m.timestamp_ms > current_time_ms {
            break;
        }
        end += 1;
    }
    cursor.index = end;

    let batch = &transcript.messages()[start..end];
    let capped = &batch[batch.len().saturating_sub(policy.max_messages)..];

    cursor.last_rendered_time_ms = current_time_ms;

    TickResult {
        to_append: capped.to_vec(),
        did_reset,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Ran(TickResult),
    /// Called again within the throttle window; retry on the next frame.
    Throttled,
    /// Another tick was still running; the request was dropped.
    Busy,
    /// No transcript attached.
    NotReady,
}

/// Per-session engine state: the transcript, the cursor and the pacing rules
/// around [`tick`].
#[derive(Debug)]
pub struct SyncEngine {
    transcript: Option<Transcript>,
    cursor: Cursor,
    policy: TickPolicy,
    throttle_ms: u64,
    delay_ms: i64,
    last_run_ms: Option<u64>,
}

impl SyncEngine {
    pub fn new(cfg: &SyncCfg) -> Self {
        Self {
            transcript: None,
            cursor: Cursor::default(),
            policy: TickPolicy::from(cfg),
            throttle_ms: cfg.throttle_ms,
            delay_ms: 0,
            last_run_ms: None,
        }
    }

    pub fn with_transcript(cfg: &SyncCfg, transcript: Transcript) -> Self {
        let mut engine = Self::new(cfg);
        engine.attach(transcript);
        engine
    }

    pub fn attach(&mut self, transcript: Transcript) {
        tracing::debug!(messages = transcript.len(), "transcript attached");
        self.transcript = Some(transcript);
        self.cursor = Cursor::default();
        self.last_run_ms = None;
    }

    pub fn detach(&mut self) -> Option<Transcript> {
        self.cursor = Cursor::default();
        self.transcript.take()
    }

    pub fn is_ready(&self) -> bool {
        self.transcript.is_some()
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn delay_ms(&self) -> i64 {
        self.delay_ms
    }

    /// Shifts chat relative to the video; positive values show chat later.
    pub fn adjust_delay(&mut self, step_ms: i64) -> i64 {
        self.delay_ms += step_ms;
        tracing::info!(delay_ms = self.delay_ms, "chat delay adjusted");
        self.delay_ms
    }

    /// Runs one paced tick. `now_ms` is the wall-clock frame time and
    /// `clock_time_ms` the video position.
    pub fn tick(&mut self, now_ms: u64, clock_time_ms: i64) -> TickOutcome {
        let Some(transcript) = &self.transcript else {
            return TickOutcome::NotReady;
        };

        if let Some(last) = self.last_run_ms {
            if now_ms.saturating_sub(last) < self.throttle_ms {
                return TickOutcome::Throttled;
            }
        }

        let time = clock_time_ms - self.delay_ms;
        let result = tick(transcript, &mut self.cursor, time, &self.policy);
        self.last_run_ms = Some(now_ms);

        tracing::trace!(
            time_ms = time,
            appended = result.to_append.len(),
            reset = result.did_reset,
            index = self.cursor.index,
            "chat tick"
        );

        TickOutcome::Ran(result)
    }
}

/// Ticks a shared engine, dropping the request if a tick is already in progress.
pub fn try_tick(engine: &RefCell<SyncEngine>, now_ms: u64, clock_time_ms: i64) -> TickOutcome {
    match engine.try_borrow_mut() {
        Ok(mut e) => e.tick(now_ms, clock_time_ms),
        Err(_) => {
            tracing::debug!("chat tick already running, request dropped");
            TickOutcome::Busy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn msg(ts: i64) -> Message {
        Message {
            timestamp_ms: ts,
            team_id: "NULL".to_string(),
            user_name: format!("user{ts}"),
            text: format!("at {ts}"),
        }
    }

    fn transcript(ts: &[i64]) -> Transcript {
        Transcript::new(ts.iter().copied().map(msg).collect())
    }

    fn times(r: &TickResult) -> Vec<i64> {
        r.to_append.iter().map(|m| m.timestamp_ms).collect()
    }

    const POLICY: TickPolicy = TickPolicy {
        max_messages: 60,
        prefill_on_seek: true,
    };

    #[test]
    fn forward_tick_collects_due_messages_in_order() {
        let t = transcript(&[1000, 2000, 3000]);
        let mut c = Cursor::default();

        let r = tick(&t, &mut c, 2500, &POLICY);
        assert_eq!(times(&r), vec![1000, 2000]);
        assert!(!r.did_reset);
        assert_eq!(c, Cursor { index: 2, last_rendered_time_ms: 2500 });
    }

    #[test]
    fn backward_seek_resets_and_recomputes() {
        let t = transcript(&[1000, 2000, 3000]);
        let mut c = Cursor::default();
        tick(&t, &mut c, 2500, &POLICY);

        let r = tick(&t, &mut c, 500, &POLICY);
        assert!(r.did_reset);
        assert!(r.to_append.is_empty());
        assert_eq!(c.index, 0);
    }

    #[test]
    fn backward_seek_with_prefill_rebuilds_window() {
        let t = transcript(&[1000, 2000, 3000, 4000]);
        let mut c = Cursor::default();
        tick(&t, &mut c, 3500, &POLICY);

        let r = tick(&t, &mut c, 2000, &POLICY);
        assert!(r.did_reset);
        assert_eq!(times(&r), vec![1000, 2000]);
        assert_eq!(c.index, 2);
    }

    #[test]
    fn backward_seek_without_prefill_starts_at_position() {
        let policy = TickPolicy {
            max_messages: 60,
            prefill_on_seek: false,
        };
        let t = transcript(&[1000, 2000, 3000, 4000]);
        let mut c = Cursor::default();
        tick(&t, &mut c, 3500, &policy);

        let r = tick(&t, &mut c, 2000, &policy);
        assert!(r.did_reset);
        assert_eq!(times(&r), vec![2000]);

        let r = tick(&t, &mut c, 1999, &policy);
        assert!(r.did_reset);
        assert!(r.to_append.is_empty());
        assert_eq!(c.index, 1);
    }

    #[test]
    fn repeated_tick_is_a_no_op() {
        let t = transcript(&[1000, 2000, 3000]);
        let mut c = Cursor::default();
        tick(&t, &mut c, 2000, &POLICY);

        let r = tick(&t, &mut c, 2000, &POLICY);
        assert_eq!(r, TickResult::default());
    }

    #[test]
    fn batch_is_capped_to_most_recent() {
        let ts: Vec<i64> = (1..=100).map(|i| i * 10).collect();
        let t = transcript(&ts);
        let policy = TickPolicy {
            max_messages: 50,
            prefill_on_seek: true,
        };
        let mut c = Cursor::default();

        let r = tick(&t, &mut c, 10_000, &policy);
        assert_eq!(r.to_append.len(), 50);
        assert_eq!(r.to_append[0].timestamp_ms, 510);
        assert_eq!(r.to_append[49].timestamp_ms, 1000);
        assert_eq!(c.index, 100);
    }

    #[test]
    fn monotonic_ticks_append_each_due_message_once() {
        let ts: Vec<i64> = (0..400).map(|i| (i * 37) % 11 + i * 25).collect();
        let mut sorted = ts.clone();
        sorted.sort();
        let t = transcript(&sorted);
        let policy = TickPolicy {
            max_messages: usize::MAX,
            prefill_on_seek: true,
        };

        let mut c = Cursor::default();
        let mut seen = Vec::new();
        let mut now = 0;
        for step in [0, 3, 40, 41, 0, 250, 1, 999, 17, 4000, 0, 5000] {
            now += step;
            let r = tick(&t, &mut c, now, &policy);
            assert!(!r.did_reset);
            seen.extend(times(&r));
            let due: Vec<i64> = sorted.iter().copied().filter(|&x| x <= now).collect();
            assert_eq!(seen, due);
        }
    }

    #[test]
    fn per_tick_batch_never_exceeds_cap() {
        let ts: Vec<i64> = (0..500).map(|i| i * 7).collect();
        let t = transcript(&ts);
        let policy = TickPolicy {
            max_messages: 60,
            prefill_on_seek: true,
        };
        let mut c = Cursor::default();
        for time in [3000, 100, 3499, 0, 2000, 2000, 10] {
            let r = tick(&t, &mut c, time, &policy);
            assert!(r.to_append.len() <= 60);
            if let Some(last) = r.to_append.last() {
                assert!(last.timestamp_ms <= time);
            }
        }
    }

    #[test]
    fn engine_reports_not_ready_without_transcript() {
        let mut e = SyncEngine::new(&SyncCfg::default());
        assert_eq!(e.tick(0, 1000), TickOutcome::NotReady);
    }

    #[test]
    fn engine_throttles_within_window() {
        let mut e = SyncEngine::with_transcript(&SyncCfg::default(), transcript(&[10, 20, 30]));

        assert!(matches!(e.tick(1_000, 15), TickOutcome::Ran(_)));
        assert_eq!(e.tick(1_039, 25), TickOutcome::Throttled);
        match e.tick(1_040, 25) {
            TickOutcome::Ran(r) => assert_eq!(times(&r), vec![20]),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn engine_subtracts_chat_delay() {
        let cfg = SyncCfg::default();
        let mut e = SyncEngine::with_transcript(&cfg, transcript(&[1000, 2000, 3000]));
        e.adjust_delay(1000);

        match e.tick(0, 3000) {
            TickOutcome::Ran(r) => assert_eq!(times(&r), vec![1000, 2000]),
            other => panic!("unexpected outcome: {other:?}"),
        }

        // Showing chat earlier moves the effective time forward.
        e.adjust_delay(-2000);
        match e.tick(100, 3000) {
            TickOutcome::Ran(r) => assert_eq!(times(&r), vec![3000]),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn shared_engine_drops_reentrant_tick() {
        let engine = RefCell::new(SyncEngine::with_transcript(
            &SyncCfg::default(),
            transcript(&[10]),
        ));

        let _held = engine.borrow_mut();
        assert_eq!(try_tick(&engine, 0, 100), TickOutcome::Busy);
    }
}
