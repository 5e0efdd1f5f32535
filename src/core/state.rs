//! Widget state and its transitions.
//!
//! Every user interaction and every classifier answer is a [`WidgetEvent`].
//! [`WidgetState::apply`] mutates the state and returns the [`Effect`]s the
//! controller has to carry out (drawing, network requests). Nothing in here
//! touches the network or a renderer, so transitions are tested directly.

use crate::domain::model::{
    ClassificationOutcome, ClassificationRequest, FailurePolicy, Indicator, Position, Slot,
    StationMarker, VerdictRecord,
};
use crate::utils::error::{ClientError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    Place { position: Position, label: String },
    Remove(Slot),
    DragStart(Slot),
    DragMove { slot: Slot, position: Position },
    DragEnd { slot: Slot, position: Position },
    EditLabel { slot: Slot, label: String },
    PointerEnterLabel(Slot),
    PointerLeaveLabel(Slot),
    ClassificationReceived { seq: u64, outcome: ClassificationOutcome },
    ClassificationFailed { seq: u64, message: String },
}

/// What caused a classification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Placement,
    DragEnd,
    LabelEdit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationTicket {
    pub seq: u64,
    pub request: ClassificationRequest,
    pub trigger: Trigger,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    RenderMarker(StationMarker),
    RemoveMarker(Slot),
    UpdatePosition(Slot, Position),
    SetDraggable(Slot, bool),
    ShowIndicator(Indicator),
    ShowError(String),
    Classify(ClassificationTicket),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetState {
    slots: [Option<StationMarker>; 2],
    indicator: Indicator,
    /// Bumped on every reclassification, including the ones that reset to neutral.
    generation: u64,
    /// Sequence number of the response currently shown, 0 if none.
    applied_seq: u64,
    last_verdict: Option<VerdictRecord>,
    last_error: Option<String>,
    threshold: f64,
    failure_policy: FailurePolicy,
}

impl Default for WidgetState {
    fn default() -> Self {
        Self::new(0.5, FailurePolicy::default())
    }
}

impl WidgetState {
    pub fn new(threshold: f64, failure_policy: FailurePolicy) -> Self {
        Self {
            slots: [None, None],
            indicator: Indicator::Neutral,
            generation: 0,
            applied_seq: 0,
            last_verdict: None,
            last_error: None,
            threshold,
            failure_policy,
        }
    }

    pub fn marker(&self, slot: Slot) -> Option<&StationMarker> {
        self.slots[slot.index()].as_ref()
    }

    pub fn markers(&self) -> impl Iterator<Item = &StationMarker> {
        self.slots.iter().flatten()
    }

    pub fn marker_count(&self) -> usize {
        self.markers().count()
    }

    pub fn indicator(&self) -> Indicator {
        self.indicator
    }

    pub fn latest_seq(&self) -> u64 {
        self.generation
    }

    pub fn applied_seq(&self) -> u64 {
        self.applied_seq
    }

    pub fn last_verdict(&self) -> Option<&VerdictRecord> {
        self.last_verdict.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_current(&self, seq: u64) -> bool {
        seq == self.generation
    }

    pub fn apply(&mut self, event: WidgetEvent) -> Result<Vec<Effect>> {
        let effects = match event {
            WidgetEvent::Place { position, label } => self.place(position, label)?,
            WidgetEvent::Remove(slot) => self.remove(slot),
            WidgetEvent::DragStart(slot) => self.drag_start(slot),
            WidgetEvent::DragMove { slot, position } => self.drag_move(slot, position)?,
            WidgetEvent::DragEnd { slot, position } => self.drag_end(slot, position)?,
            WidgetEvent::EditLabel { slot, label } => self.edit_label(slot, label),
            WidgetEvent::PointerEnterLabel(slot) => self.pointer_enter(slot),
            WidgetEvent::PointerLeaveLabel(slot) => self.pointer_leave(slot),
            WidgetEvent::ClassificationReceived { seq, outcome } => self.received(seq, outcome),
            WidgetEvent::ClassificationFailed { seq, message } => self.failed(seq, message),
        };
        Ok(effects)
    }

    fn place(&mut self, position: Position, label: String) -> Result<Vec<Effect>> {
        // 兩個位置都有標記時直接忽略，不檢查座標
        let Some(slot) = Slot::ALL
            .into_iter()
            .find(|slot| self.slots[slot.index()].is_none())
        else {
            return Ok(Vec::new());
        };
        ensure_valid(position)?;

        let marker = StationMarker::new(slot, position, label);
        self.slots[slot.index()] = Some(marker.clone());

        let mut effects = vec![Effect::RenderMarker(marker)];
        effects.extend(self.reclassify(Trigger::Placement));
        Ok(effects)
    }

    fn remove(&mut self, slot: Slot) -> Vec<Effect> {
        if self.slots[slot.index()].take().is_none() {
            return Vec::new();
        }

        let mut effects = vec![Effect::RemoveMarker(slot)];
        effects.extend(self.reset_indicator());
        effects
    }

    fn drag_start(&mut self, slot: Slot) -> Vec<Effect> {
        if let Some(marker) = self.slots[slot.index()].as_mut() {
            if marker.draggable {
                marker.dragging = true;
            }
        }
        Vec::new()
    }

    fn drag_move(&mut self, slot: Slot, position: Position) -> Result<Vec<Effect>> {
        ensure_valid(position)?;
        match self.slots[slot.index()].as_mut() {
            Some(marker) if marker.dragging => {
                marker.position = position;
                Ok(vec![Effect::UpdatePosition(slot, position)])
            }
            _ => Ok(Vec::new()),
        }
    }

    fn drag_end(&mut self, slot: Slot, position: Position) -> Result<Vec<Effect>> {
        ensure_valid(position)?;
        let Some(marker) = self.slots[slot.index()].as_mut().filter(|m| m.dragging) else {
            return Ok(Vec::new());
        };
        marker.dragging = false;
        marker.position = position;

        let mut effects = vec![Effect::UpdatePosition(slot, position)];
        effects.extend(self.reclassify(Trigger::DragEnd));
        Ok(effects)
    }

    fn edit_label(&mut self, slot: Slot, label: String) -> Vec<Effect> {
        let Some(marker) = self.slots[slot.index()].as_mut() else {
            return Vec::new();
        };
        marker.label = label;
        self.reclassify(Trigger::LabelEdit)
    }

    fn pointer_enter(&mut self, slot: Slot) -> Vec<Effect> {
        match self.slots[slot.index()].as_mut() {
            // an ongoing drag must not be interrupted
            Some(marker) if marker.draggable && !marker.dragging => {
                marker.draggable = false;
                vec![Effect::SetDraggable(slot, false)]
            }
            _ => Vec::new(),
        }
    }

    fn pointer_leave(&mut self, slot: Slot) -> Vec<Effect> {
        match self.slots[slot.index()].as_mut() {
            Some(marker) if !marker.draggable => {
                marker.draggable = true;
                vec![Effect::SetDraggable(slot, true)]
            }
            _ => Vec::new(),
        }
    }

    fn reclassify(&mut self, trigger: Trigger) -> Vec<Effect> {
        let request = match (&self.slots[0], &self.slots[1]) {
            (Some(first), Some(second)) => ClassificationRequest::from_markers(first, second),
            _ => return self.reset_indicator(),
        };

        self.generation += 1;
        vec![Effect::Classify(ClassificationTicket {
            seq: self.generation,
            request,
            trigger,
        })]
    }

    /// Fewer than two markers: back to neutral, and answers still in flight go stale.
    fn reset_indicator(&mut self) -> Vec<Effect> {
        self.generation += 1;
        self.indicator = Indicator::Neutral;
        self.last_error = None;
        vec![Effect::ShowIndicator(Indicator::Neutral)]
    }

    fn received(&mut self, seq: u64, outcome: ClassificationOutcome) -> Vec<Effect> {
        if !self.is_current(seq) || self.marker_count() < 2 {
            return Vec::new();
        }

        let verdict = outcome.verdict(self.threshold);
        self.indicator = verdict.into();
        self.applied_seq = seq;
        self.last_error = None;
        self.last_verdict = Some(VerdictRecord {
            seq,
            verdict,
            score: match outcome {
                ClassificationOutcome::Score(score) => Some(score),
                ClassificationOutcome::Malformed => None,
            },
            received_at: Utc::now(),
        });
        vec![Effect::ShowIndicator(self.indicator)]
    }

    fn failed(&mut self, seq: u64, message: String) -> Vec<Effect> {
        if !self.is_current(seq) {
            return Vec::new();
        }

        match self.failure_policy {
            FailurePolicy::KeepStale => Vec::new(),
            FailurePolicy::Surface => {
                self.indicator = Indicator::Neutral;
                self.last_error = Some(message.clone());
                vec![
                    Effect::ShowIndicator(Indicator::Neutral),
                    Effect::ShowError(message),
                ]
            }
        }
    }
}

fn ensure_valid(position: Position) -> Result<()> {
    if position.is_valid() {
        Ok(())
    } else {
        Err(ClientError::InvalidPosition {
            latitude: position.latitude,
            longitude: position.longitude,
        })
    }
}
