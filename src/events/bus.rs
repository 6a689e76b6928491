//! Session event log
//!
//! The quest queues events as it runs and the plugin stamps them onto the
//! bus once per frame. The bus keeps the whole session in emission order; a
//! front end reads what is new with [`EventBus::drain`], while tests and
//! reports query the full log by run or by event code.

use bevy::prelude::*;

use super::types::QuestEvent;

/// An event with the host time it was flushed at
#[derive(Debug, Clone, PartialEq)]
pub struct BusEvent {
    /// Milliseconds since the host clock started
    pub time_ms: u32,
    pub event: QuestEvent,
}

impl BusEvent {
    pub fn code(&self) -> &'static str {
        self.event.type_code()
    }
}

/// Append-only log of one quest session
#[derive(Resource, Default)]
pub struct EventBus {
    log: Vec<BusEvent>,
    /// Index of the first event `drain` has not handed out yet
    read: usize,
    elapsed_ms: u32,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stamp used for the next events
    pub fn update_time(&mut self, elapsed_secs: f64) {
        self.elapsed_ms = (elapsed_secs.max(0.0) * 1000.0) as u32;
    }

    pub fn elapsed_ms(&self) -> u32 {
        self.elapsed_ms
    }

    pub fn emit(&mut self, event: QuestEvent) {
        self.log.push(BusEvent {
            time_ms: self.elapsed_ms,
            event,
        });
    }

    pub fn emit_all(&mut self, events: impl IntoIterator<Item = QuestEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    /// The whole session so far
    pub fn log(&self) -> &[BusEvent] {
        &self.log
    }

    /// Events emitted since the last `drain`
    pub fn unread(&self) -> &[BusEvent] {
        &self.log[self.read..]
    }

    /// Hand out the unread events; they stay in the log
    pub fn drain(&mut self) -> Vec<BusEvent> {
        let fresh = self.log[self.read..].to_vec();
        self.read = self.log.len();
        fresh
    }

    /// Events with the given two-letter code (case-insensitive)
    pub fn with_code<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a BusEvent> + 'a {
        self.log
            .iter()
            .filter(move |e| e.code().eq_ignore_ascii_case(code))
    }

    /// Commands the quest refused this session
    pub fn rejection_count(&self) -> usize {
        self.with_code("CR").count()
    }

    /// Events of one run, from its `RS` through the `TR` it produced
    pub fn run_events(&self, run: u64) -> &[BusEvent] {
        let Some(start) = self
            .log
            .iter()
            .position(|e| matches!(e.event, QuestEvent::RunStart { run: r, .. } if r == run))
        else {
            return &[];
        };
        let mut end = self.log.len();
        for (i, e) in self.log.iter().enumerate().skip(start + 1) {
            match e.event {
                QuestEvent::TrialRecorded { .. } => {
                    end = i + 1;
                    break;
                }
                QuestEvent::RunStart { .. } => {
                    end = i;
                    break;
                }
                _ => {}
            }
        }
        &self.log[start..end]
    }
}

/// Stamp the bus with the host clock each frame
pub fn update_event_bus_time(mut bus: ResMut<EventBus>, time: Res<Time>) {
    bus.update_time(time.elapsed_secs_f64());
}
