//! Preset chord handling
//!
//! The chord is a two-step shortcut: a trigger hotkey arms the machine, then
//! a digit `1`-`9` opens the matching preset. Escape or any other key
//! cancels; letting the timeout elapse opens the default preset.
//!
//! This module provides:
//! - Key classification from the key names the UI reports
//! - The idle/waiting state machine, driven by explicit timestamps so the
//!   caller owns the clock

use serde::Serialize;
use std::time::{Duration, Instant};

/// A key press as seen by the chord
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordKey {
    /// `1`-`9`
    Digit(u8),
    Escape,
    Other,
}

impl ChordKey {
    /// Classify a key name such as `"5"`, `"Escape"` or `"a"`
    pub fn parse(key: &str) -> Self {
        match key {
            "Escape" | "Esc" => ChordKey::Escape,
            _ => {
                let mut chars = key.chars();
                match (chars.next(), chars.next()) {
                    (Some(c @ '1'..='9'), None) => ChordKey::Digit(c as u8 - b'0'),
                    _ => ChordKey::Other,
                }
            }
        }
    }
}

/// What the UI should do once the chord resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChordAction {
    /// Open the preset at a zero-based index
    OpenPreset { index: usize },
    OpenDefaultPreset,
    Cancel,
}

/// Result of feeding a key to a waiting chord
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChordOutcome {
    pub action: ChordAction,
    /// Whether the key was consumed and must not reach other handlers
    pub suppress: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChordState {
    Idle,
    Waiting { deadline: Instant },
}

/// Idle/waiting machine for one UI surface
#[derive(Debug, Clone)]
pub struct ChordMachine {
    state: ChordState,
    timeout: Duration,
}

impl ChordMachine {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: ChordState::Idle,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self.state, ChordState::Waiting { .. })
    }

    /// When a waiting chord times out
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            ChordState::Waiting { deadline } => Some(deadline),
            ChordState::Idle => None,
        }
    }

    /// Arm the chord. Triggering again while waiting restarts the timeout.
    pub fn trigger(&mut self, now: Instant) {
        if self.is_waiting() {
            log::debug!("Chord re-triggered while waiting, re-arming timeout");
        }
        self.state = ChordState::Waiting {
            deadline: now + self.timeout,
        };
    }

    /// Feed a key press. Returns `None` when the chord is idle.
    pub fn handle_key(&mut self, key: ChordKey, now: Instant) -> Option<ChordOutcome> {
        let ChordState::Waiting { deadline } = self.state else {
            return None;
        };
        self.state = ChordState::Idle;

        // The timeout won the race; the key is an ordinary key again
        if now >= deadline {
            return Some(ChordOutcome {
                action: ChordAction::OpenDefaultPreset,
                suppress: false,
            });
        }

        let outcome = match key {
            ChordKey::Digit(digit) => ChordOutcome {
                action: ChordAction::OpenPreset {
                    index: usize::from(digit.saturating_sub(1)),
                },
                suppress: true,
            },
            ChordKey::Escape => ChordOutcome {
                action: ChordAction::Cancel,
                suppress: true,
            },
            ChordKey::Other => ChordOutcome {
                action: ChordAction::Cancel,
                suppress: false,
            },
        };
        Some(outcome)
    }

    /// Resolve an elapsed timeout
    pub fn poll(&mut self, now: Instant) -> Option<ChordAction> {
        match self.state {
            ChordState::Waiting { deadline } if now >= deadline => {
                self.state = ChordState::Idle;
                Some(ChordAction::OpenDefaultPreset)
            }
            _ => None,
        }
    }
}
