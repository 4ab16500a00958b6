//! Phase events reported while a pipeline pass runs.
//!
//! Observers are a pure side channel: they cannot influence the run, and
//! the unit type `()` is the observer that ignores everything.
//!
//! # Events
//!
//! | Event | When |
//! |-------|------|
//! | `Started(stage)` | before the stage touches its backlog |
//! | `Finished { stage, elapsed }` | after the stage returns, successfully or not |

use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

use crate::models::Stage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PhaseEvent {
    Started { stage: Stage },
    Finished {
        stage: Stage,
        #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
        elapsed: Duration,
    },
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, _event: &PhaseEvent) {}
}

impl PipelineObserver for () {}

/// Logs every event with an `event_kind` field.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &PhaseEvent) {
        match event {
            PhaseEvent::Started { stage } => {
                info!(event_kind = %format!("{stage}.started"), "Stage started");
            }
            PhaseEvent::Finished { stage, elapsed } => {
                info!(
                    event_kind = %format!("{stage}.completed"),
                    elapsed_ms = elapsed.as_millis(),
                    "Stage finished"
                );
            }
        }
    }
}

/// Keeps every event, in order, for later inspection.
#[derive(Debug, Default)]
pub struct CollectingObserver {
    events: Mutex<Vec<PhaseEvent>>,
}

impl CollectingObserver {
    pub fn events(&self) -> Vec<PhaseEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl PipelineObserver for CollectingObserver {
    fn on_event(&self, event: &PhaseEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
        TracingObserver.on_event(event);
    }
}
