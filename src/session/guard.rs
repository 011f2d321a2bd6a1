// src/session/guard.rs

//! Leave-intent detection for a running test.
//!
//! The UI forwards raw page events ([`PageSignal`]); the guard maps them onto three
//! abandonment sources and raises at most one warning per abandonment episode.
//! An episode ends when the page regains focus (visible again, or the pointer re-enters).

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Kinds of "the user may be leaving" events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Navigating away or reloading.
    Unload,
    /// Tab switched or app backgrounded.
    Hidden,
    /// Pointer left through the top edge of the viewport.
    PointerLeftTop,
}

/// Raw page events as reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageSignal {
    BeforeUnload,
    Hidden,
    Visible,
    PointerLeave { y: i32 },
    PointerEnter,
}

pub type SignalCallback = Arc<dyn Fn(SignalKind) + Send + Sync>;

/// A named source of abandonment events that can be switched on and off.
pub trait SignalSource: Send {
    fn kind(&self) -> SignalKind;
    fn arm(&mut self);
    fn disarm(&mut self);
    /// Delivers the event to the callback if armed and not already fired this episode.
    fn emit(&mut self) -> bool;
    /// Allows the next `emit` to fire again.
    fn end_episode(&mut self);
}

/// A source that fires at most once per episode.
pub struct EpisodeSignal {
    kind: SignalKind,
    armed: bool,
    fired: bool,
    callback: Option<SignalCallback>,
}

impl EpisodeSignal {
    pub fn new(kind: SignalKind, callback: Option<SignalCallback>) -> Self {
        Self {
            kind,
            armed: false,
            fired: false,
            callback,
        }
    }
}

impl fmt::Debug for EpisodeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpisodeSignal")
            .field("kind", &self.kind)
            .field("armed", &self.armed)
            .field("fired", &self.fired)
            .finish()
    }
}

impl SignalSource for EpisodeSignal {
    fn kind(&self) -> SignalKind {
        self.kind
    }

    fn arm(&mut self) {
        self.armed = true;
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    fn emit(&mut self) -> bool {
        if !self.armed || self.fired {
            return false;
        }
        self.fired = true;
        if let Some(cb) = &self.callback {
            cb(self.kind);
        }
        true
    }

    fn end_episode(&mut self) {
        self.fired = false;
    }
}

/// What the client should do in response to a page signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardOutcome {
    /// Block navigation with the native "you will lose progress" prompt.
    pub block_unload: bool,
    /// A warning newly raised by this signal, if any.
    pub warning: Option<SignalKind>,
}

/// Composes the three abandonment sources for one session.
#[derive(Debug)]
pub struct LeaveGuard {
    sources: [EpisodeSignal; 3],
    active: bool,
    warning: Option<SignalKind>,
}

impl LeaveGuard {
    pub fn new(callback: Option<SignalCallback>) -> Self {
        Self {
            sources: [
                EpisodeSignal::new(SignalKind::Unload, callback.clone()),
                EpisodeSignal::new(SignalKind::Hidden, callback.clone()),
                EpisodeSignal::new(SignalKind::PointerLeftTop, callback),
            ],
            active: false,
            warning: None,
        }
    }

    /// Marks a test as running and arms every source.
    pub fn activate(&mut self) {
        self.active = true;
        self.arm();
    }

    /// Marks the test as over (submitted or torn down). Clears any pending warning.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.warning = None;
        self.disarm();
    }

    pub fn arm(&mut self) {
        if self.active {
            self.sources.iter_mut().for_each(|s| s.arm());
        }
    }

    pub fn disarm(&mut self) {
        self.sources.iter_mut().for_each(|s| s.disarm());
    }

    pub fn handle(&mut self, signal: PageSignal) -> GuardOutcome {
        let kind = match signal {
            PageSignal::BeforeUnload => Some(SignalKind::Unload),
            PageSignal::Hidden => Some(SignalKind::Hidden),
            PageSignal::PointerLeave { y } if y <= 0 => Some(SignalKind::PointerLeftTop),
            PageSignal::PointerLeave { .. } => None,
            PageSignal::Visible | PageSignal::PointerEnter => {
                self.sources.iter_mut().for_each(|s| s.end_episode());
                None
            }
        };

        let warning = kind.and_then(|kind| self.raise(kind));

        GuardOutcome {
            block_unload: self.active && signal == PageSignal::BeforeUnload,
            warning,
        }
    }

    fn raise(&mut self, kind: SignalKind) -> Option<SignalKind> {
        if self.warning.is_some() {
            return None;
        }
        let source = self.sources.iter_mut().find(|s| s.kind() == kind)?;
        if source.emit() {
            self.warning = Some(kind);
            Some(kind)
        } else {
            None
        }
    }

    /// "Return to test": dismisses the warning. Sources that fired stay quiet until focus returns.
    pub fn acknowledge(&mut self) {
        self.warning = None;
    }

    pub fn warning(&self) -> Option<SignalKind> {
        self.warning
    }
}
