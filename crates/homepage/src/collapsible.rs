//! Collapsible panels whose body height animates between zero and the
//! height of their content.
//!
//! Closing takes two steps: the height is first pinned to the measured
//! content height, and only on the next animation frame collapsed to zero.

use std::collections::BTreeMap;
use std::time::Duration;

/// Full travel time of one height transition.
pub const TRANSITION: Duration = Duration::from_millis(300);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PanelPhase {
    Closed,
    Open,
    /// Height pinned, collapse queued for the next frame.
    Closing,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Panel {
    phase: PanelPhase,
    max_height: u16,
    content_height: u16,
    rendered: f32,
    anim_from: f32,
    anim_elapsed: Duration,
}

impl Panel {
    fn new() -> Self {
        Self {
            phase: PanelPhase::Closed,
            max_height: 0,
            content_height: 0,
            rendered: 0.0,
            anim_from: 0.0,
            anim_elapsed: TRANSITION,
        }
    }

    pub fn phase(&self) -> PanelPhase {
        self.phase
    }

    /// Whether the panel carries the open marker; a closing panel keeps it
    /// until its collapse frame runs.
    pub fn is_open(&self) -> bool {
        !matches!(self.phase, PanelPhase::Closed)
    }

    pub fn max_height(&self) -> u16 {
        self.max_height
    }

    pub fn content_height(&self) -> u16 {
        self.content_height
    }

    /// Height currently on screen, mid-transition included.
    pub fn rendered_height(&self) -> u16 {
        self.rendered.round().max(0.0) as u16
    }

    fn set_target(&mut self, height: u16) {
        if height == self.max_height {
            return;
        }
        self.anim_from = self.rendered;
        self.anim_elapsed = Duration::ZERO;
        self.max_height = height;
    }

    fn animate(&mut self, elapsed: Duration) -> bool {
        if self.anim_elapsed >= TRANSITION {
            self.rendered = f32::from(self.max_height);
            return false;
        }
        self.anim_elapsed = (self.anim_elapsed + elapsed).min(TRANSITION);
        let t = self.anim_elapsed.as_secs_f32() / TRANSITION.as_secs_f32();
        let target = f32::from(self.max_height);
        self.rendered = self.anim_from + (target - self.anim_from) * t;
        self.anim_elapsed < TRANSITION
    }
}

#[derive(Clone, Debug, Default)]
pub struct Panels {
    panels: BTreeMap<String, Panel>,
    arrows: BTreeMap<String, bool>,
    collapse_queue: Vec<(String, String)>,
}

impl Panels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a closed panel; the arrow is optional markup.
    pub fn register(&mut self, body_id: &str, arrow_id: Option<&str>) {
        self.panels.insert(body_id.to_string(), Panel::new());
        if let Some(arrow_id) = arrow_id {
            self.arrows.insert(arrow_id.to_string(), false);
        }
    }

    pub fn get(&self, body_id: &str) -> Option<&Panel> {
        self.panels.get(body_id)
    }

    pub fn is_open(&self, body_id: &str) -> bool {
        self.panels.get(body_id).is_some_and(Panel::is_open)
    }

    pub fn arrow_rotated(&self, arrow_id: &str) -> Option<bool> {
        self.arrows.get(arrow_id).copied()
    }

    /// Records the natural height of a panel's content.
    pub fn measure(&mut self, body_id: &str, content_height: u16) {
        if let Some(panel) = self.panels.get_mut(body_id) {
            panel.content_height = content_height;
        }
    }

    pub fn open(&mut self, body_id: &str, arrow_id: &str) {
        let Some(panel) = self.panels.get_mut(body_id) else {
            return;
        };
        panel.phase = PanelPhase::Open;
        let height = panel.content_height;
        panel.set_target(height);
        self.collapse_queue.retain(|(body, _)| body != body_id);
        if let Some(rotated) = self.arrows.get_mut(arrow_id) {
            *rotated = true;
        }
    }

    pub fn close(&mut self, body_id: &str, arrow_id: &str) {
        let Some(panel) = self.panels.get_mut(body_id) else {
            return;
        };
        let height = panel.content_height;
        panel.set_target(height);
        panel.phase = PanelPhase::Closing;
        self.collapse_queue
            .push((body_id.to_string(), arrow_id.to_string()));
    }

    pub fn toggle(&mut self, body_id: &str, arrow_id: &str) {
        match self.panels.get(body_id).map(Panel::phase) {
            None => {}
            Some(PanelPhase::Open) => self.close(body_id, arrow_id),
            Some(PanelPhase::Closed | PanelPhase::Closing) => self.open(body_id, arrow_id),
        }
    }

    /// Re-applies the measured height of every open panel. Closed and
    /// closing panels are left alone.
    pub fn recalc_heights(&mut self) {
        for panel in self.panels.values_mut() {
            if panel.phase == PanelPhase::Open {
                let height = panel.content_height;
                panel.set_target(height);
            }
        }
    }

    /// Runs the collapses queued by [`Panels::close`].
    pub fn run_animation_frame(&mut self) {
        for (body_id, arrow_id) in std::mem::take(&mut self.collapse_queue) {
            let Some(panel) = self.panels.get_mut(&body_id) else {
                continue;
            };
            if panel.phase != PanelPhase::Closing {
                continue;
            }
            panel.set_target(0);
            panel.phase = PanelPhase::Closed;
            if let Some(rotated) = self.arrows.get_mut(&arrow_id) {
                *rotated = false;
            }
        }
    }

    /// Advances height transitions; true while any is still moving.
    pub fn animate(&mut self, elapsed: Duration) -> bool {
        let mut moving = false;
        for panel in self.panels.values_mut() {
            moving |= panel.animate(elapsed);
        }
        moving
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "btc_body";
    const ARROW: &str = "btc_arrow";

    fn panels() -> Panels {
        let mut panels = Panels::new();
        panels.register(BODY, Some(ARROW));
        panels.measure(BODY, 9);
        panels
    }

    #[test]
    fn open_sets_measured_height_and_rotates_arrow() {
        let mut panels = panels();
        panels.open(BODY, ARROW);
        let panel = panels.get(BODY).expect("panel");
        assert!(panel.is_open());
        assert_eq!(panel.max_height(), 9);
        assert_eq!(panels.arrow_rotated(ARROW), Some(true));
    }

    #[test]
    fn close_pins_then_collapses_on_next_frame() {
        let mut panels = panels();
        panels.open(BODY, ARROW);
        panels.measure(BODY, 11);
        panels.close(BODY, ARROW);

        let panel = panels.get(BODY).expect("panel");
        assert_eq!(panel.phase(), PanelPhase::Closing);
        assert_eq!(panel.max_height(), 11);
        assert!(panel.is_open());
        assert_eq!(panels.arrow_rotated(ARROW), Some(true));

        panels.run_animation_frame();
        let panel = panels.get(BODY).expect("panel");
        assert_eq!(panel.phase(), PanelPhase::Closed);
        assert_eq!(panel.max_height(), 0);
        assert_eq!(panels.arrow_rotated(ARROW), Some(false));
    }

    #[test]
    fn toggle_twice_restores_state() {
        let mut panels = panels();
        panels.toggle(BODY, ARROW);
        panels.run_animation_frame();
        panels.toggle(BODY, ARROW);
        panels.run_animation_frame();
        assert!(!panels.is_open(BODY));

        panels.open(BODY, ARROW);
        panels.run_animation_frame();
        panels.toggle(BODY, ARROW);
        panels.toggle(BODY, ARROW);
        panels.run_animation_frame();
        assert!(panels.is_open(BODY));
        assert_eq!(panels.get(BODY).expect("panel").phase(), PanelPhase::Open);
    }

    #[test]
    fn recalc_follows_content_for_open_panels_only() {
        let mut panels = panels();
        panels.register("fl_body", Some("fl_arrow"));
        panels.measure("fl_body", 4);
        panels.open(BODY, ARROW);

        panels.measure(BODY, 12);
        panels.measure("fl_body", 7);
        panels.recalc_heights();

        assert_eq!(panels.get(BODY).expect("open").max_height(), 12);
        assert_eq!(panels.get("fl_body").expect("closed").max_height(), 0);
    }

    #[test]
    fn unknown_panels_are_ignored() {
        let mut panels = panels();
        panels.open("nope", "nope_arrow");
        panels.close("nope", "nope_arrow");
        panels.toggle("nope", "nope_arrow");
        panels.run_animation_frame();
        assert!(!panels.is_open("nope"));
        assert!(!panels.is_open(BODY));
    }

    #[test]
    fn missing_arrow_is_tolerated() {
        let mut panels = Panels::new();
        panels.register("links_body", None);
        panels.measure("links_body", 3);
        panels.open("links_body", "links_arrow");
        assert!(panels.is_open("links_body"));
        assert_eq!(panels.arrow_rotated("links_arrow"), None);
    }

    #[test]
    fn height_transition_runs_for_fixed_duration() {
        let mut panels = panels();
        panels.open(BODY, ARROW);
        assert_eq!(panels.get(BODY).expect("panel").rendered_height(), 0);

        assert!(panels.animate(TRANSITION / 3));
        let mid = panels.get(BODY).expect("panel").rendered_height();
        assert!(mid > 0 && mid < 9, "mid-transition height {mid}");

        assert!(!panels.animate(TRANSITION));
        assert_eq!(panels.get(BODY).expect("panel").rendered_height(), 9);

        panels.close(BODY, ARROW);
        panels.run_animation_frame();
        panels.animate(TRANSITION);
        assert_eq!(panels.get(BODY).expect("panel").rendered_height(), 0);
    }
}
