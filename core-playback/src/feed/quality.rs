//! Per-item playback quality tracking.
//!
//! Pure state machine fed by polled backend status and position. It returns
//! the signals to report and leaves reporting to the caller.

use bridge_traits::BackendStatus;
use chrono::{DateTime, Utc};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityPhase {
    Idle,
    Preparing,
    Buffering,
    Playing,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualitySignal {
    FirstFrame { latency_ms: u64 },
    RebufferStart,
    RebufferEnd { stalled_ms: u64 },
    Progress { position_secs: u64 },
}

#[derive(Debug, Clone)]
pub struct QualityTracker {
    phase: QualityPhase,
    play_requested_at: Option<DateTime<Utc>>,
    rebuffering_since: Option<DateTime<Utc>>,
    last_progress_bucket: Option<u128>,
    progress_interval: Duration,
}

fn elapsed_ms(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_milliseconds().max(0) as u64
}

impl QualityTracker {
    pub fn new(progress_interval: Duration) -> Self {
        Self {
            phase: QualityPhase::Idle,
            play_requested_at: None,
            rebuffering_since: None,
            last_progress_bucket: None,
            progress_interval,
        }
    }

    pub fn phase(&self) -> QualityPhase {
        self.phase
    }

    pub fn is_rebuffering(&self) -> bool {
        self.rebuffering_since.is_some()
    }

    pub fn awaiting_first_frame(&self) -> bool {
        self.play_requested_at.is_some()
    }

    /// A new item (or a loop of the same one) was requested to play.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.phase = QualityPhase::Preparing;
        self.play_requested_at = Some(now);
        self.rebuffering_since = None;
        self.last_progress_bucket = None;
    }

    pub fn mark_ended(&mut self) {
        self.phase = QualityPhase::Ended;
        self.rebuffering_since = None;
    }

    pub fn reset(&mut self) {
        self.phase = QualityPhase::Idle;
        self.play_requested_at = None;
        self.rebuffering_since = None;
        self.last_progress_bucket = None;
    }

    /// Feed one poll sample.
    pub fn observe(
        &mut self,
        status: &BackendStatus,
        position: Duration,
        now: DateTime<Utc>,
    ) -> Vec<QualitySignal> {
        let mut signals = Vec::new();
        if self.phase == QualityPhase::Idle {
            return signals;
        }

        match status {
            BackendStatus::Buffering | BackendStatus::Ready => {
                if self.phase == QualityPhase::Preparing {
                    self.phase = QualityPhase::Buffering;
                }
            }
            BackendStatus::WaitingToPlay => match self.phase {
                QualityPhase::Playing if self.rebuffering_since.is_none() => {
                    self.rebuffering_since = Some(now);
                    signals.push(QualitySignal::RebufferStart);
                }
                QualityPhase::Preparing => self.phase = QualityPhase::Buffering,
                _ => {}
            },
            BackendStatus::Playing => {
                if let Some(since) = self.rebuffering_since.take() {
                    signals.push(QualitySignal::RebufferEnd {
                        stalled_ms: elapsed_ms(since, now),
                    });
                }
                if self.phase != QualityPhase::Ended {
                    self.phase = QualityPhase::Playing;
                }
            }
            BackendStatus::Ended => self.mark_ended(),
            BackendStatus::Idle | BackendStatus::Paused | BackendStatus::Failed(_) => {}
        }

        if position > Duration::ZERO {
            if let Some(requested) = self.play_requested_at.take() {
                signals.push(QualitySignal::FirstFrame {
                    latency_ms: elapsed_ms(requested, now),
                });
            }

            if self.phase == QualityPhase::Playing {
                let bucket = position.as_millis() / self.progress_interval.as_millis().max(1);
                if self.last_progress_bucket != Some(bucket) {
                    self.last_progress_bucket = Some(bucket);
                    signals.push(QualitySignal::Progress {
                        position_secs: position.as_secs(),
                    });
                }
            }
        }

        signals
    }
}
