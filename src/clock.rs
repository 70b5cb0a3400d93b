//! Playback clock seen by a chat session.

pub trait PlaybackClock {
    fn current_time_ms(&self) -> i64;
    fn duration_ms(&self) -> i64;
    fn is_paused(&self) -> bool;
    fn play(&mut self);
    fn pause(&mut self);
    fn seek_to(&mut self, ms: i64);

    fn seek_by(&mut self, delta_ms: i64) {
        let target = self.current_time_ms() + delta_ms;
        self.seek_to(target);
    }

    fn toggle(&mut self) {
        if self.is_paused() {
            self.play();
        } else {
            self.pause();
        }
    }
}

/// Clocks that can notify listeners about playback changes.
pub trait ClockEvents: PlaybackClock {
    fn on_event(&mut self, f: Box<dyn FnMut(&ClockEvent)>) -> ListenerId;
    fn remove_listener(&mut self, id: ListenerId) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    Playing,
    Paused,
    Seeked { from_ms: i64, to_ms: i64 },
    TimeUpdate { time_ms: i64 },
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&ClockEvent)>;

/// Video clock driven by explicit wall-clock steps instead of a media element.
///
/// Positions are clamped to `0..=duration`; reaching the end pauses playback.
pub struct SimulatedClock {
    time_ms: i64,
    duration_ms: i64,
    paused: bool,
    listeners: Vec<(ListenerId, Listener)>,
    next_id: u64,
}

impl SimulatedClock {
    pub fn new(duration_ms: i64) -> Self {
        Self {
            time_ms: 0,
            duration_ms: duration_ms.max(0),
            paused: true,
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    pub fn subscribe(&mut self, f: impl FnMut(&ClockEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(f)));
        id
    }

    pub fn on_playing(&mut self, mut f: impl FnMut() + 'static) -> ListenerId {
        self.subscribe(move |ev| {
            if *ev == ClockEvent::Playing {
                f();
            }
        })
    }

    pub fn on_time_update(&mut self, mut f: impl FnMut(i64) + 'static) -> ListenerId {
        self.subscribe(move |ev| {
            if let ClockEvent::TimeUpdate { time_ms } = ev {
                f(*time_ms);
            }
        })
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn clear_listeners(&mut self) {
        self.listeners.clear();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Moves playback forward by `delta_ms` of wall-clock time if playing.
    pub fn advance(&mut self, delta_ms: u64) {
        if self.paused {
            return;
        }

        self.time_ms = (self.time_ms + delta_ms as i64).min(self.duration_ms);
        self.emit(ClockEvent::TimeUpdate {
            time_ms: self.time_ms,
        });

        if self.time_ms >= self.duration_ms {
            self.paused = true;
            self.emit(ClockEvent::Ended);
        }
    }

    fn emit(&mut self, ev: ClockEvent) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(&ev);
        }
    }
}

impl ClockEvents for SimulatedClock {
    fn on_event(&mut self, f: Box<dyn FnMut(&ClockEvent)>) -> ListenerId {
        self.subscribe(f)
    }

    fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.unsubscribe(id)
    }
}

impl PlaybackClock for SimulatedClock {
    fn current_time_ms(&self) -> i64 {
        self.time_ms
    }

    fn duration_ms(&self) -> i64 {
        self.duration_ms
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn play(&mut self) {
        if !self.paused || self.time_ms >= self.duration_ms {
            return;
        }
        self.paused = false;
        self.emit(ClockEvent::Playing);
    }

    fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        self.emit(ClockEvent::Paused);
    }

    fn seek_to(&mut self, ms: i64) {
        let from_ms = self.time_ms;
        self.time_ms = ms.clamp(0, self.duration_ms);
        self.emit(ClockEvent::Seeked {
            from_ms,
            to_ms: self.time_ms,
        });
    }
}
