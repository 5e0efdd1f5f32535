use crate::core::state::{ClassificationTicket, Effect, Trigger, WidgetEvent, WidgetState};
use crate::domain::model::{ClassificationOutcome, Indicator, Position, Slot, StationSeed};
use crate::domain::ports::{Classifier, ConfigProvider, MarkerRenderer};
use crate::utils::error::{ClientError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

enum Completion {
    Answered {
        seq: u64,
        outcome: ClassificationOutcome,
    },
    Failed {
        seq: u64,
        error: ClientError,
    },
    /// Debounced request dropped before it was sent.
    Superseded { seq: u64 },
}

/// Owns the two station slots and talks to the renderer and the classifier.
///
/// All state changes happen on the caller's task. Classification requests run
/// on spawned tasks and report back through a channel; call
/// [`MarkerController::next_completion`] or [`MarkerController::settle`] to
/// apply their answers.
pub struct MarkerController<R: MarkerRenderer> {
    state: WidgetState,
    renderer: R,
    classifier: Arc<dyn Classifier>,
    default_label: String,
    label_debounce: Duration,
    latest: Arc<AtomicU64>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    in_flight: usize,
    requests_sent: Arc<AtomicU64>,
}

impl<R: MarkerRenderer> MarkerController<R> {
    pub fn new(classifier: Arc<dyn Classifier>, renderer: R, state: WidgetState) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            latest: Arc::new(AtomicU64::new(state.latest_seq())),
            state,
            renderer,
            classifier,
            default_label: "Main Station".to_string(),
            label_debounce: Duration::ZERO,
            completions_tx,
            completions_rx,
            in_flight: 0,
            requests_sent: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_config<C: ConfigProvider + ?Sized>(
        config: &C,
        classifier: Arc<dyn Classifier>,
        mut renderer: R,
    ) -> Self {
        renderer.set_view(&config.map_view());
        let state = WidgetState::new(config.similarity_threshold(), config.failure_policy());
        Self::new(classifier, renderer, state)
            .with_default_label(config.default_label())
            .with_label_debounce(config.label_debounce())
    }

    pub fn with_default_label(mut self, label: impl Into<String>) -> Self {
        self.default_label = label.into();
        self
    }

    pub fn with_label_debounce(mut self, debounce: Duration) -> Self {
        self.label_debounce = debounce;
        self
    }

    pub fn state(&self) -> &WidgetState {
        &self.state
    }

    pub fn indicator(&self) -> Indicator {
        self.state.indicator()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Requests spawned but not yet applied or discarded.
    pub fn pending(&self) -> usize {
        self.in_flight
    }

    /// Requests that actually went out to the classifier.
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.state)?)
    }

    /// Places a marker in the first free slot; `Ok(None)` when both slots are taken.
    pub fn place_marker(&mut self, position: Position, label: impl Into<String>) -> Result<Option<Slot>> {
        let effects = self.state.apply(WidgetEvent::Place {
            position,
            label: label.into(),
        })?;
        let placed = effects.iter().find_map(|effect| match effect {
            Effect::RenderMarker(marker) => Some(marker.slot),
            _ => None,
        });
        match placed {
            Some(slot) => tracing::debug!("Placed {} at {}", slot, position),
            None => tracing::debug!("Both slots occupied, ignoring placement at {}", position),
        }
        self.execute(effects);
        Ok(placed)
    }

    /// A click on the map places a marker with the default label.
    pub fn click(&mut self, position: Position) -> Result<Option<Slot>> {
        let label = self.default_label.clone();
        self.place_marker(position, label)
    }

    pub fn seed(&mut self, stations: &[StationSeed]) -> Result<()> {
        for station in stations {
            self.place_marker(station.position(), station.label.clone())?;
        }
        Ok(())
    }

    pub fn remove_marker(&mut self, slot: Slot) -> Result<()> {
        self.handle(WidgetEvent::Remove(slot))
    }

    pub fn begin_drag(&mut self, slot: Slot) -> Result<()> {
        self.handle(WidgetEvent::DragStart(slot))
    }

    pub fn drag_to(&mut self, slot: Slot, position: Position) -> Result<()> {
        self.handle(WidgetEvent::DragMove { slot, position })
    }

    pub fn end_drag(&mut self, slot: Slot, position: Position) -> Result<()> {
        self.handle(WidgetEvent::DragEnd { slot, position })
    }

    pub fn edit_label(&mut self, slot: Slot, label: impl Into<String>) -> Result<()> {
        self.handle(WidgetEvent::EditLabel {
            slot,
            label: label.into(),
        })
    }

    pub fn pointer_enter_label(&mut self, slot: Slot) -> Result<()> {
        self.handle(WidgetEvent::PointerEnterLabel(slot))
    }

    pub fn pointer_leave_label(&mut self, slot: Slot) -> Result<()> {
        self.handle(WidgetEvent::PointerLeaveLabel(slot))
    }

    pub fn handle(&mut self, event: WidgetEvent) -> Result<()> {
        let effects = self.state.apply(event)?;
        self.execute(effects);
        Ok(())
    }

    /// Waits for the next request to finish and applies its answer.
    /// Returns `false` when nothing is pending.
    pub async fn next_completion(&mut self) -> bool {
        if self.in_flight == 0 {
            return false;
        }
        let Some(completion) = self.completions_rx.recv().await else {
            return false;
        };
        self.in_flight -= 1;

        let event = match completion {
            Completion::Answered { seq, outcome } => {
                if !self.state.is_current(seq) {
                    tracing::debug!("Discarding stale answer for request #{}", seq);
                }
                WidgetEvent::ClassificationReceived { seq, outcome }
            }
            Completion::Failed { seq, error } => {
                if self.state.is_current(seq) {
                    tracing::warn!("Classification request #{} failed: {}", seq, error);
                    tracing::debug!("Suggestion: {}", error.recovery_suggestion());
                }
                WidgetEvent::ClassificationFailed {
                    seq,
                    message: error.user_friendly_message(),
                }
            }
            Completion::Superseded { seq } => {
                tracing::debug!("Request #{} superseded before sending", seq);
                return true;
            }
        };

        // answers never fail to apply
        if let Ok(effects) = self.state.apply(event) {
            self.execute(effects);
        }
        true
    }

    /// Applies every outstanding answer.
    pub async fn settle(&mut self) {
        while self.next_completion().await {}
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        self.latest.store(self.state.latest_seq(), Ordering::SeqCst);

        for effect in effects {
            match effect {
                Effect::RenderMarker(marker) => self.renderer.render_marker(&marker),
                Effect::RemoveMarker(slot) => self.renderer.remove_marker(slot),
                Effect::UpdatePosition(slot, position) => {
                    self.renderer.update_position(slot, position)
                }
                Effect::SetDraggable(slot, enabled) => self.renderer.set_draggable(slot, enabled),
                Effect::ShowIndicator(indicator) => {
                    tracing::debug!("Indicator -> {:?}", indicator);
                    self.renderer.show_indicator(indicator)
                }
                Effect::ShowError(message) => self.renderer.show_error(&message),
                Effect::Classify(ticket) => self.spawn_request(ticket),
            }
        }
    }

    fn spawn_request(&mut self, ticket: ClassificationTicket) {
        let delay = match ticket.trigger {
            Trigger::LabelEdit => self.label_debounce,
            _ => Duration::ZERO,
        };
        let classifier = Arc::clone(&self.classifier);
        let latest = Arc::clone(&self.latest);
        let sent = Arc::clone(&self.requests_sent);
        let tx = self.completions_tx.clone();

        tracing::debug!(
            "Request #{} ({:?}): '{}' vs '{}'",
            ticket.seq,
            ticket.trigger,
            ticket.request.name1,
            ticket.request.name2
        );

        self.in_flight += 1;
        tokio::spawn(async move {
            let seq = ticket.seq;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
                if latest.load(Ordering::SeqCst) != seq {
                    let _ = tx.send(Completion::Superseded { seq });
                    return;
                }
            }

            sent.fetch_add(1, Ordering::SeqCst);
            let completion = match classifier.classify(&ticket.request).await {
                Ok(outcome) => Completion::Answered { seq, outcome },
                Err(error) => Completion::Failed { seq, error },
            };
            // receiver gone means the controller was dropped
            let _ = tx.send(completion);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ClassificationRequest, StationMarker};
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    #[derive(Default)]
    struct RecordingRenderer {
        calls: Vec<String>,
        indicator: Indicator,
    }

    impl MarkerRenderer for RecordingRenderer {
        fn render_marker(&mut self, marker: &StationMarker) {
            self.calls.push(format!("render {} {}", marker.slot.number(), marker.label));
        }

        fn remove_marker(&mut self, slot: Slot) {
            self.calls.push(format!("remove {}", slot.number()));
        }

        fn update_position(&mut self, slot: Slot, position: Position) {
            self.calls.push(format!("position {} {}", slot.number(), position));
        }

        fn set_draggable(&mut self, slot: Slot, enabled: bool) {
            self.calls.push(format!("draggable {} {}", slot.number(), enabled));
        }

        fn show_indicator(&mut self, indicator: Indicator) {
            self.indicator = indicator;
        }
    }

    /// Answers with fixed scores, in order, and records every request.
    struct ScriptedClassifier {
        scores: Mutex<VecDeque<f64>>,
        requests: Mutex<Vec<ClassificationRequest>>,
    }

    impl ScriptedClassifier {
        fn new(scores: &[f64]) -> Arc<Self> {
            Arc::new(Self {
                scores: Mutex::new(scores.iter().copied().collect()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<ClassificationRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Classifier for ScriptedClassifier {
        async fn classify(&self, request: &ClassificationRequest) -> Result<ClassificationOutcome> {
            self.requests.lock().unwrap().push(request.clone());
            let score = self.scores.lock().unwrap().pop_front().unwrap_or(0.0);
            Ok(ClassificationOutcome::Score(score))
        }
    }

    /// Holds each request, keyed by its first label, until the test releases it.
    struct GatedClassifier {
        gates: Mutex<HashMap<String, oneshot::Receiver<f64>>>,
    }

    #[async_trait]
    impl Classifier for GatedClassifier {
        async fn classify(&self, request: &ClassificationRequest) -> Result<ClassificationOutcome> {
            let gate = self
                .gates
                .lock()
                .unwrap()
                .remove(&request.name1)
                .expect("no gate for label");
            let score = gate.await.unwrap_or(0.0);
            Ok(ClassificationOutcome::Score(score))
        }
    }

    fn controller(classifier: Arc<dyn Classifier>) -> MarkerController<RecordingRenderer> {
        MarkerController::new(classifier, RecordingRenderer::default(), WidgetState::default())
    }

    #[tokio::test]
    async fn test_two_markers_classify_similar() {
        let classifier = ScriptedClassifier::new(&[0.8]);
        let mut ctl = controller(classifier.clone());

        assert_eq!(ctl.place_marker(Position::new(48.00199, 7.81989), "A").unwrap(), Some(Slot::First));
        assert_eq!(ctl.place_marker(Position::new(48.00223, 7.82006), "B").unwrap(), Some(Slot::Second));
        ctl.settle().await;

        assert_eq!(ctl.indicator(), Indicator::Similar);
        assert_eq!(ctl.renderer().indicator, Indicator::Similar);
        assert_eq!(classifier.requests().len(), 1);
        assert_eq!(ctl.renderer().calls, vec!["render 1 A", "render 2 B"]);
    }

    #[tokio::test]
    async fn test_remove_resets_without_request() {
        let classifier = ScriptedClassifier::new(&[0.8]);
        let mut ctl = controller(classifier.clone());
        ctl.seed(&StationSeed::defaults()).unwrap();
        ctl.settle().await;
        assert_eq!(ctl.indicator(), Indicator::Similar);

        ctl.remove_marker(Slot::First).unwrap();

        assert_eq!(ctl.pending(), 0);
        assert_eq!(ctl.indicator(), Indicator::Neutral);
        assert_eq!(ctl.renderer().indicator, Indicator::Neutral);
        assert_eq!(ctl.requests_sent(), 1);
    }

    #[tokio::test]
    async fn test_click_uses_default_label() {
        let classifier = ScriptedClassifier::new(&[]);
        let mut ctl = controller(classifier).with_default_label("Hbf");

        ctl.click(Position::new(48.0, 7.8)).unwrap();

        assert_eq!(ctl.state().marker(Slot::First).unwrap().label, "Hbf");
    }

    #[tokio::test]
    async fn test_drag_sends_only_on_release() {
        let classifier = ScriptedClassifier::new(&[0.2, 0.9]);
        let mut ctl = controller(classifier.clone());
        ctl.seed(&StationSeed::defaults()).unwrap();
        ctl.settle().await;
        assert_eq!(ctl.indicator(), Indicator::NotSimilar);

        ctl.begin_drag(Slot::Second).unwrap();
        ctl.drag_to(Slot::Second, Position::new(48.0021, 7.8200)).unwrap();
        ctl.drag_to(Slot::Second, Position::new(48.0020, 7.8199)).unwrap();
        assert_eq!(ctl.pending(), 0);
        assert_eq!(classifier.requests().len(), 1);

        ctl.end_drag(Slot::Second, Position::new(48.00199, 7.81990)).unwrap();
        ctl.settle().await;

        let requests = classifier.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!((requests[1].lat2, requests[1].lon2), (48.00199, 7.81990));
        assert_eq!(ctl.indicator(), Indicator::Similar);
        assert!(ctl
            .renderer()
            .calls
            .contains(&"position 2 48.00210, 7.82000".to_string()));
    }

    #[tokio::test]
    async fn test_out_of_order_answer_is_discarded() {
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();
        let classifier = Arc::new(GatedClassifier {
            gates: Mutex::new(HashMap::from([
                ("Freiburg im Breisgau, Bissierstr.".to_string(), first_rx),
                ("Somewhere else".to_string(), second_rx),
            ])),
        });
        let mut ctl = controller(classifier);
        ctl.seed(&StationSeed::defaults()).unwrap();
        ctl.edit_label(Slot::First, "Somewhere else").unwrap();
        assert_eq!(ctl.pending(), 2);

        // newer request answers first, the older one last
        second_tx.send(0.1).unwrap();
        assert!(ctl.next_completion().await);
        assert_eq!(ctl.indicator(), Indicator::NotSimilar);

        first_tx.send(0.9).unwrap();
        ctl.settle().await;

        assert_eq!(ctl.indicator(), Indicator::NotSimilar);
        assert_eq!(ctl.state().applied_seq(), ctl.state().latest_seq());
    }

    #[tokio::test]
    async fn test_label_debounce_collapses_keystrokes() {
        let classifier = ScriptedClassifier::new(&[0.3, 0.7]);
        let mut ctl = controller(classifier.clone()).with_label_debounce(Duration::from_millis(20));
        ctl.seed(&StationSeed::defaults()).unwrap();
        ctl.settle().await;

        for label in ["F", "Fr", "Fre", "Frei"] {
            ctl.edit_label(Slot::Second, label).unwrap();
        }
        ctl.settle().await;

        let requests = classifier.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].name2, "Frei");
        assert_eq!(ctl.indicator(), Indicator::Similar);
    }

    #[tokio::test]
    async fn test_each_keystroke_sends_request_without_debounce() {
        let classifier = ScriptedClassifier::new(&[0.3, 0.7, 0.7, 0.7]);
        let mut ctl = controller(classifier.clone());
        ctl.seed(&StationSeed::defaults()).unwrap();
        ctl.settle().await;

        for label in ["F", "Fr", "Fre"] {
            ctl.edit_label(Slot::Second, label).unwrap();
        }
        assert_eq!(ctl.pending(), 3);
        ctl.settle().await;

        // 沒有延遲時每次輸入都送出，回應順序不固定
        let mut labels: Vec<String> = classifier
            .requests()
            .into_iter()
            .skip(1)
            .map(|request| request.name2)
            .collect();
        labels.sort();
        assert_eq!(labels, vec!["F", "Fr", "Fre"]);
        assert_eq!(ctl.requests_sent(), 4);
        assert_eq!(ctl.state().applied_seq(), ctl.state().latest_seq());
    }
}
