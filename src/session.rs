//! One playback session: a transcript bound to a clock and a renderer.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use crate::{
    clock::{ClockEvent, ClockEvents, ListenerId, PlaybackClock, SimulatedClock},
    config::{Config, InputCfg},
    error::ChatResult,
    input::{History, Key, Step, handle_key},
    model::Transcript,
    render::Renderer,
    sync::{SyncEngine, TickOutcome, try_tick},
};

pub struct Session<C: ClockEvents, R: Renderer> {
    engine: Rc<RefCell<SyncEngine>>,
    clock: C,
    renderer: R,
    history: History,
    input: InputCfg,
    frame_ms: u64,
    pending: Rc<Cell<bool>>,
    listeners: Vec<ListenerId>,
    alive: bool,
    active: bool,
    now_ms: u64,
}

impl<C: ClockEvents, R: Renderer> Session<C, R> {
    pub fn open(transcript: Transcript, mut clock: C, renderer: R, cfg: &Config, page_url: &str) -> Self {
        if transcript.is_empty() {
            tracing::warn!("no chat messages in this video's range");
        }
        let engine = Rc::new(RefCell::new(SyncEngine::with_transcript(&cfg.sync, transcript)));
        let pending = Rc::new(Cell::new(true));

        let flag = Rc::clone(&pending);
        let id = clock.on_event(Box::new(move |ev: &ClockEvent| {
            // Pauses and the end of the video also need a final tick at the
            // position the clock stopped on.
            if matches!(
                ev,
                ClockEvent::Seeked { .. }
                    | ClockEvent::Playing
                    | ClockEvent::Paused
                    | ClockEvent::Ended
            ) {
                flag.set(true);
            }
        }));

        tracing::info!(duration_ms = clock.duration_ms(), "session opened");

        Self {
            engine,
            clock,
            renderer,
            history: History::new(page_url),
            input: cfg.input.clone(),
            frame_ms: cfg.sync.frame_ms.max(1),
            pending,
            listeners: vec![id],
            alive: true,
            active: true,
            now_ms: 0,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn engine(&self) -> &Rc<RefCell<SyncEngine>> {
        &self.engine
    }

    /// Keyboard input only applies while the player has focus.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Seeks to the deep-linked position, if any.
    pub fn seek_initial(&mut self, time_ms: Option<u64>) {
        if let Some(t) = time_ms {
            tracing::info!(time_ms = t, "seeking to linked position");
            self.clock.seek_to(t as i64);
        }
    }

    /// Animation-frame callback. Returns `None` when nothing was scheduled
    /// (paused with no pending seek, or the session is closed).
    pub fn frame(&mut self, now_ms: u64) -> ChatResult<Option<TickOutcome>> {
        self.now_ms = self.now_ms.max(now_ms);
        if !self.alive {
            return Ok(None);
        }
        if self.clock.is_paused() && !self.pending.get() {
            return Ok(None);
        }

        let outcome = try_tick(&self.engine, self.now_ms, self.clock.current_time_ms());
        match &outcome {
            TickOutcome::Ran(result) => {
                self.pending.set(false);
                self.renderer.render(result)?;
            }
            TickOutcome::Throttled => {}
            TickOutcome::Busy | TickOutcome::NotReady => self.pending.set(false),
        }
        Ok(Some(outcome))
    }

    pub fn key(&mut self, key: Key) -> bool {
        handle_key(key, &mut self.clock, &self.input, self.active)
    }

    /// Seeks to a bookmark and records it in the history; returns the shareable URL.
    pub fn bookmark(&mut self, time_ms: u64) -> ChatResult<String> {
        self.clock.seek_to(time_ms as i64);
        let entry = self.history.push(time_ms)?;
        tracing::info!(time_ms, url = entry.url.as_str(), "bookmark");
        Ok(entry.url.clone())
    }

    /// Returns to the previous history position.
    pub fn back(&mut self) -> u64 {
        let t = self.history.back();
        self.clock.seek_to(t as i64);
        t
    }

    /// Shifts the chat delay by `delta_ms` and re-syncs on the next frame.
    pub fn adjust_delay(&mut self, delta_ms: i64) -> i64 {
        let delay = self.engine.borrow_mut().adjust_delay(delta_ms);
        self.pending.set(true);
        delay
    }

    /// Unregisters clock listeners and drops the transcript. Later frames are no-ops.
    pub fn close(&mut self) {
        if !self.alive {
            return;
        }
        for id in self.listeners.drain(..) {
            self.clock.remove_listener(id);
        }
        self.engine.borrow_mut().detach();
        self.pending.set(false);
        self.alive = false;
        tracing::info!("session closed");
    }
}

impl<C: ClockEvents, R: Renderer> Drop for Session<C, R> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<R: Renderer> Session<SimulatedClock, R> {
    /// Plays wall-clock time forward in frame-sized steps.
    pub fn run_for(&mut self, duration_ms: u64) -> ChatResult<()> {
        let mut remaining = duration_ms;
        while remaining > 0 {
            if self.clock.is_paused() && !self.pending.get() {
                self.now_ms += remaining;
                break;
            }
            let step = remaining.min(self.frame_ms);
            self.clock.advance(step);
            remaining -= step;
            let now = self.now_ms + step;
            self.frame(now)?;
        }
        Ok(())
    }

    /// Plays until the clock stops or reaches `until_ms`.
    pub fn run_until(&mut self, until_ms: Option<i64>) -> ChatResult<()> {
        let stop = until_ms
            .unwrap_or(self.clock.duration_ms())
            .min(self.clock.duration_ms());
        while self.alive && self.clock.current_time_ms() < stop && !self.clock.is_paused() {
            let step = ((stop - self.clock.current_time_ms()) as u64).min(self.frame_ms);
            self.run_for(step)?;
        }
        self.flush_pending()
    }

    /// Runs frames until a pending tick is no longer throttled.
    fn flush_pending(&mut self) -> ChatResult<()> {
        while self.alive && self.pending.get() {
            let now = self.now_ms + self.frame_ms;
            match self.frame(now)? {
                Some(TickOutcome::Throttled) => continue,
                _ => break,
            }
        }
        Ok(())
    }

    pub fn run_script(&mut self, steps: &[Step]) -> ChatResult<()> {
        for step in steps {
            tracing::debug!(?step, time_ms = self.clock.current_time_ms(), "script step");
            match *step {
                Step::Wait(ms) => self.run_for(ms)?,
                Step::Key(key) => {
                    self.key(key);
                }
                Step::Bookmark(ms) => {
                    self.bookmark(ms)?;
                }
                Step::Delay(ms) => {
                    self.adjust_delay(ms);
                }
                Step::Back => {
                    self.back();
                }
                Step::Play => self.clock.play(),
                Step::Pause => self.clock.pause(),
            }
            self.flush_pending()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{Message, Metadata},
        render::{ChatWindow, OutputFormat},
    };
    use pretty_assertions::assert_eq;

    fn msg(ts: i64) -> Message {
        Message {
            timestamp_ms: ts,
            team_id: "NULL".to_string(),
            user_name: format!("u{ts}"),
            text: "hi".to_string(),
        }
    }

    fn session(ts: &[i64], duration_ms: i64) -> Session<SimulatedClock, ChatWindow<Vec<u8>>> {
        let cfg = Config::default();
        let transcript = Transcript::new(ts.iter().copied().map(msg).collect());
        let window = ChatWindow::new(Metadata::default(), cfg.render.clone(), OutputFormat::Text, Vec::new());
        Session::open(
            transcript,
            SimulatedClock::new(duration_ms),
            window,
            &cfg,
            "https://example.org/video/1/",
        )
    }

    fn visible(s: &Session<SimulatedClock, ChatWindow<Vec<u8>>>) -> Vec<i64> {
        let mut v: Vec<i64> = s.renderer().entries().map(|r| r.timestamp_ms).collect();
        v.reverse();
        v
    }

    #[test]
    fn playback_reveals_messages_over_time() {
        let mut s = session(&[1_000, 2_000, 3_000], 10_000);
        s.clock_mut().play();

        s.run_for(2_500).unwrap();
        assert_eq!(visible(&s), vec![1_000, 2_000]);

        s.run_until(None).unwrap();
        assert_eq!(visible(&s), vec![1_000, 2_000, 3_000]);
        assert!(s.clock().is_paused());
    }

    #[test]
    fn message_at_video_end_is_shown() {
        let mut s = session(&[1_000, 10_000], 10_000);
        s.clock_mut().play();
        s.run_until(None).unwrap();

        assert_eq!(s.clock().current_time_ms(), 10_000);
        assert_eq!(visible(&s), vec![1_000, 10_000]);
    }

    #[test]
    fn pause_catches_up_throttled_messages() {
        let mut s = session(&[1_000, 2_000], 10_000);
        s.clock_mut().play();
        s.run_for(2_000).unwrap();
        assert_eq!(visible(&s), vec![1_000]);

        s.run_script(&[Step::Pause]).unwrap();
        assert_eq!(visible(&s), vec![1_000, 2_000]);
        assert_eq!(s.frame(20_000).unwrap(), None);
    }

    #[test]
    fn seek_while_paused_updates_once() {
        let mut s = session(&[1_000, 2_000, 3_000], 10_000);
        s.seek_initial(Some(2_500));
        s.flush_pending().unwrap();
        assert_eq!(visible(&s), vec![1_000, 2_000]);

        assert_eq!(s.frame(10_000).unwrap(), None);
    }

    #[test]
    fn backward_key_rebuilds_window() {
        let mut s = session(&[1_000, 4_000, 9_000], 20_000);
        s.clock_mut().play();
        s.run_for(10_000).unwrap();
        assert_eq!(visible(&s), vec![1_000, 4_000, 9_000]);

        s.run_script(&[Step::Key(Key::ArrowLeft)]).unwrap();
        assert_eq!(visible(&s), vec![1_000, 4_000]);
    }

    #[test]
    fn bookmarks_record_history() {
        let mut s = session(&[1_000, 70_000], 120_000);
        let url = s.bookmark(65_000).unwrap();
        assert_eq!(url, "https://example.org/video/1/?t=01:05.000");
        s.flush_pending().unwrap();
        assert_eq!(visible(&s), vec![1_000]);

        assert_eq!(s.back(), 0);
        assert_eq!(s.clock().current_time_ms(), 0);
        assert_eq!(s.history().current_url(), "https://example.org/video/1/");
    }

    #[test]
    fn delay_holds_chat_back() {
        let mut s = session(&[1_000, 2_000], 10_000);
        s.adjust_delay(1_500);
        s.clock_mut().play();
        s.run_for(3_000).unwrap();
        assert_eq!(visible(&s), vec![1_000]);
    }

    #[test]
    fn keys_need_focus() {
        let mut s = session(&[1_000], 120_000);
        s.set_active(false);
        assert!(!s.key(Key::ArrowUp));
        assert_eq!(s.clock().current_time_ms(), 0);

        s.set_active(true);
        assert!(s.key(Key::ArrowUp));
        assert_eq!(s.clock().current_time_ms(), 60_000);
    }

    #[test]
    fn closed_session_stops_ticking() {
        let mut s = session(&[1_000], 10_000);
        s.close();
        assert!(!s.is_alive());
        assert_eq!(s.clock().listener_count(), 0);
        assert!(!s.engine().borrow().is_ready());

        s.clock_mut().play();
        assert_eq!(s.frame(5_000).unwrap(), None);
        assert!(s.renderer().is_empty());
    }
}
