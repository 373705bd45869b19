//! Async driver for [`EnforcementEngine`].
//!
//! One task owns the engine and multiplexes every cadence with `select!`,
//! so no two checks ever overlap. Events are republished on a broadcast
//! channel for whoever is listening.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};

use super::EnforcementEngine;
use crate::events::Event;

const EVENT_CAPACITY: usize = 100;
const MIN_ALARM_WAIT: Duration = Duration::from_secs(1);

pub struct MonitorRuntime;

impl MonitorRuntime {
    /// Start the engine on the current tokio runtime.
    pub fn spawn(engine: EnforcementEngine) -> MonitorHandle {
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let task = tokio::spawn(run(engine, events_tx.clone(), shutdown_rx));
        MonitorHandle {
            events: events_tx,
            shutdown: shutdown_tx,
            task,
        }
    }
}

pub struct MonitorHandle {
    events: broadcast::Sender<Event>,
    shutdown: mpsc::Sender<()>,
    task: JoinHandle<EnforcementEngine>,
}

impl MonitorHandle {
    /// Events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Stop the engine and wait for it to wind down.
    ///
    /// Returns the engine so its final state can be inspected.
    pub async fn stop(self) -> Option<EnforcementEngine> {
        // The task may already be gone; joining below reports that.
        let _ = self.shutdown.send(()).await;
        match self.task.await {
            Ok(engine) => Some(engine),
            Err(e) => {
                tracing::error!(error = %e, "monitor task failed");
                None
            }
        }
    }
}

fn cadence(period: Duration) -> Interval {
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    timer
}

async fn run(
    mut engine: EnforcementEngine,
    events_tx: broadcast::Sender<Event>,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> EnforcementEngine {
    let periods = engine.config().cadence.clone();
    let publish = |events: Vec<Event>| -> bool {
        let started = events
            .iter()
            .any(|e| matches!(e, Event::SessionStarted { .. }));
        for event in events {
            tracing::trace!(?event, "engine event");
            // No subscribers is fine.
            let _ = events_tx.send(event);
        }
        started
    };

    publish(engine.start());

    let mut accumulate = cadence(periods.accumulate());
    let mut poll = cadence(periods.poll());
    let mut thresholds = cadence(periods.threshold_check());
    let mut reset = cadence(periods.reset_check());

    loop {
        let alarm_wait = engine
            .until_next_alarm()
            .unwrap_or(periods.reset_check())
            .max(MIN_ALARM_WAIT);

        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = accumulate.tick(), if engine.is_accumulating() => {
                publish(engine.accumulate());
            }
            _ = poll.tick() => {
                if publish(engine.poll_foreground()) {
                    // First second counts one full period after the start.
                    accumulate.reset();
                }
            }
            _ = thresholds.tick() => {
                publish(engine.check_thresholds());
            }
            _ = reset.tick() => {
                publish(engine.check_reset());
            }
            _ = tokio::time::sleep(alarm_wait) => {
                publish(engine.on_alarm());
            }
        }
    }

    publish(engine.stop());
    engine
}
