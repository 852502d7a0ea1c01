use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    DEFAULT_SCREEN_HEIGHT, PANEL_HEIGHT_RATIO, PANEL_SNAP_DISTANCE, PANEL_STEPS, PANEL_TICK,
};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelError {
    #[error("panel is already open")]
    AlreadyOpen,

    #[error("panel is already closed")]
    AlreadyClosed,

    #[error("panel is mid-transition")]
    Transitioning,
}

/// Maps transition progress in `[0, 1]` onto travelled distance in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    /// Equal jumps, one per tick.
    #[default]
    Stepped,
    Linear,
    EaseOut,
}

impl Easing {
    pub fn apply(self, progress: f64, steps: u32) -> f64 {
        let p = progress.clamp(0.0, 1.0);
        match self {
            Easing::Stepped => {
                let steps = f64::from(steps.max(1));
                // Nudge so exact tick boundaries land on their step despite rounding
                ((p * steps + 1e-9).floor() / steps).min(1.0)
            }
            Easing::Linear => p,
            Easing::EaseOut => 1.0 - (1.0 - p).powi(3),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Easing::Stepped => "stepped",
            Easing::Linear => "linear",
            Easing::EaseOut => "ease_out",
        }
    }
}

impl FromStr for Easing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stepped" => Ok(Easing::Stepped),
            "linear" => Ok(Easing::Linear),
            "ease_out" | "ease-out" => Ok(Easing::EaseOut),
            other => Err(format!("unknown easing '{other}'")),
        }
    }
}

/// Vertical layout in pixels; positions are the panel's top edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelGeometry {
    pub screen_height: f64,
    pub panel_height: f64,
}

impl Default for PanelGeometry {
    fn default() -> Self {
        Self::for_screen(DEFAULT_SCREEN_HEIGHT)
    }
}

impl PanelGeometry {
    /// Non-finite or non-positive heights fall back to the default screen.
    pub fn for_screen(screen_height: f64) -> Self {
        let screen_height = if screen_height.is_finite() && screen_height > 0.0 {
            screen_height
        } else {
            DEFAULT_SCREEN_HEIGHT
        };
        Self {
            screen_height,
            panel_height: screen_height * PANEL_HEIGHT_RATIO,
        }
    }

    pub fn closed_position(&self) -> f64 {
        self.screen_height
    }

    pub fn open_position(&self) -> f64 {
        self.screen_height - self.panel_height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelState {
    pub is_open: bool,
    pub is_transitioning: bool,
    pub position: f64,
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    from: f64,
    to: f64,
    started_at: Instant,
    opening: bool,
}

/// Sliding panel with guarded open/close transitions.
#[derive(Debug, Clone)]
pub struct Panel {
    geometry: PanelGeometry,
    easing: Easing,
    is_open: bool,
    position: f64,
    transition: Option<Transition>,
}

impl Default for Panel {
    fn default() -> Self {
        Self::new(PanelGeometry::default(), Easing::default())
    }
}

impl Panel {
    pub fn new(geometry: PanelGeometry, easing: Easing) -> Self {
        Self {
            geometry,
            easing,
            is_open: false,
            position: geometry.closed_position(),
            transition: None,
        }
    }

    pub fn state(&self) -> PanelState {
        PanelState {
            is_open: self.is_open,
            is_transitioning: self.transition.is_some(),
            position: self.position,
        }
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    pub fn geometry(&self) -> PanelGeometry {
        self.geometry
    }

    /// Full length of a transition: one tick per step.
    pub fn duration(&self) -> Duration {
        PANEL_TICK * PANEL_STEPS
    }

    pub fn open(&mut self, now: Instant) -> Result<(), PanelError> {
        if self.transition.is_some() {
            return Err(PanelError::Transitioning);
        }
        if self.is_open {
            return Err(PanelError::AlreadyOpen);
        }
        self.start(now, self.geometry.open_position(), true);
        Ok(())
    }

    pub fn close(&mut self, now: Instant) -> Result<(), PanelError> {
        if self.transition.is_some() {
            return Err(PanelError::Transitioning);
        }
        if !self.is_open {
            return Err(PanelError::AlreadyClosed);
        }
        self.start(now, self.geometry.closed_position(), false);
        Ok(())
    }

    /// Evaluate the running transition at `now`. Returns true while still moving.
    pub fn advance(&mut self, now: Instant) -> bool {
        let Some(transition) = self.transition else {
            return false;
        };

        let elapsed = now.saturating_duration_since(transition.started_at);
        let progress = elapsed.as_nanos() as f64 / self.duration().as_nanos() as f64;
        let travelled = self.easing.apply(progress, PANEL_STEPS);
        let position = transition.from + (transition.to - transition.from) * travelled;

        if (position - transition.to).abs() < PANEL_SNAP_DISTANCE {
            self.position = transition.to;
            self.is_open = transition.opening;
            self.transition = None;
            return false;
        }
        self.position = position;
        true
    }

    /// Jump straight to the end of any running transition.
    pub fn settle(&mut self) {
        if let Some(transition) = self.transition.take() {
            self.position = transition.to;
            self.is_open = transition.opening;
        }
    }

    fn start(&mut self, now: Instant, to: f64, opening: bool) {
        self.transition = Some(Transition {
            from: self.position,
            to,
            started_at: now,
            opening,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel() -> Panel {
        Panel::new(PanelGeometry::for_screen(800.0), Easing::Stepped)
    }

    fn run_to_end(panel: &mut Panel, start: Instant) -> usize {
        let mut ticks = 0;
        let mut now = start;
        while panel.advance(now) {
            ticks += 1;
            now += PANEL_TICK;
            assert!(ticks < 1_000, "transition never finished");
        }
        ticks
    }

    #[test]
    fn starts_closed_off_screen() {
        let state = panel().state();
        assert!(!state.is_open);
        assert!(!state.is_transitioning);
        assert_eq!(state.position, 800.0);
    }

    #[test]
    fn open_moves_in_ten_steps_then_snaps() {
        let mut panel = panel();
        let start = Instant::now();
        panel.open(start).unwrap();
        assert!(panel.state().is_transitioning);

        panel.advance(start + PANEL_TICK * 5);
        assert_eq!(panel.state().position, 600.0);

        let ticks = run_to_end(&mut panel, start);
        assert_eq!(ticks, PANEL_STEPS as usize);

        let state = panel.state();
        assert!(state.is_open);
        assert!(!state.is_transitioning);
        assert_eq!(state.position, 400.0);
    }

    #[test]
    fn open_twice_is_rejected_and_state_unchanged() {
        let mut panel = panel();
        let now = Instant::now();
        panel.open(now).unwrap();
        let before = panel.state();
        assert_eq!(panel.open(now), Err(PanelError::Transitioning));
        assert_eq!(panel.state(), before);

        run_to_end(&mut panel, now);
        let open = panel.state();
        assert_eq!(panel.open(now), Err(PanelError::AlreadyOpen));
        assert_eq!(panel.state(), open);
    }

    #[test]
    fn close_during_open_is_rejected_until_finished() {
        let mut panel = panel();
        let start = Instant::now();
        panel.open(start).unwrap();
        panel.advance(start + PANEL_TICK * 3);
        assert_eq!(panel.close(start + PANEL_TICK * 3), Err(PanelError::Transitioning));

        run_to_end(&mut panel, start);
        let later = start + panel.duration();
        panel.close(later).unwrap();
        run_to_end(&mut panel, later);
        assert!(!panel.is_open());
        assert_eq!(panel.state().position, 800.0);
    }

    #[test]
    fn close_when_closed_is_rejected() {
        let mut panel = panel();
        assert_eq!(panel.close(Instant::now()), Err(PanelError::AlreadyClosed));
    }

    #[test]
    fn eased_curves_are_monotonic_and_end_at_one() {
        for easing in [Easing::Stepped, Easing::Linear, Easing::EaseOut] {
            let mut last = 0.0;
            for i in 0..=100 {
                let v = easing.apply(i as f64 / 100.0, PANEL_STEPS);
                assert!(v >= last, "{easing:?} dipped at {i}");
                last = v;
            }
            assert_eq!(easing.apply(1.0, PANEL_STEPS), 1.0);
            assert_eq!(easing.apply(0.0, PANEL_STEPS), 0.0);
        }
    }

    #[test]
    fn degenerate_screen_heights_still_finish() {
        for height in [f64::NAN, f64::INFINITY, 0.0, -200.0] {
            let geometry = PanelGeometry::for_screen(height);
            assert_eq!(geometry, PanelGeometry::default());

            let mut panel = Panel::new(geometry, Easing::Stepped);
            let start = Instant::now();
            panel.open(start).unwrap();
            run_to_end(&mut panel, start);
            assert!(panel.is_open());
            assert!(!panel.is_transitioning());
        }
    }

    #[test]
    fn settle_finishes_immediately() {
        let mut panel = panel();
        panel.open(Instant::now()).unwrap();
        panel.settle();
        assert!(panel.is_open());
        assert!(!panel.is_transitioning());
        assert_eq!(panel.state().position, 400.0);
    }

    #[test]
    fn easing_parses_from_settings_strings() {
        assert_eq!("ease-out".parse::<Easing>(), Ok(Easing::EaseOut));
        assert_eq!(" Linear ".parse::<Easing>(), Ok(Easing::Linear));
        assert!("bouncy".parse::<Easing>().is_err());
    }
}
