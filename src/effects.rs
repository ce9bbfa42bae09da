//! Cosmetic card effects.
//!
//! The page announces every batch of freshly rendered cards on a channel and
//! this layer binds an effect to each of them. Rendering never waits on it.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, trace};

const MAX_TILT_DEG: f64 = 8.0;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedCard {
    pub key: String,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Effect {
    /// 0.0 (none) to 1.0 (full glow).
    pub glow: f64,
    pub max_tilt_deg: f64,
}

impl Effect {
    fn for_card(card: &RenderedCard) -> Self {
        let glow = card.score.map_or(0.5, |score| (score / 100.0).clamp(0.0, 1.0));
        Self {
            glow,
            max_tilt_deg: MAX_TILT_DEG,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderNotifier {
    tx: mpsc::UnboundedSender<Vec<RenderedCard>>,
}

impl RenderNotifier {
    pub fn cards_rendered(&self, cards: Vec<RenderedCard>) {
        if self.tx.send(cards).is_err() {
            trace!("effect layer gone, skipping card bindings");
        }
    }
}

#[derive(Debug)]
pub struct EffectLayer {
    rx: mpsc::UnboundedReceiver<Vec<RenderedCard>>,
    bindings: HashMap<String, Effect>,
}

pub fn channel() -> (RenderNotifier, EffectLayer) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        RenderNotifier { tx },
        EffectLayer {
            rx,
            bindings: HashMap::new(),
        },
    )
}

impl EffectLayer {
    /// Processes every batch already queued and returns how many were handled.
    pub fn sync(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(cards) = self.rx.try_recv() {
            self.bind(cards);
            handled += 1;
        }
        handled
    }

    /// Runs until every notifier is dropped.
    pub async fn run(mut self) -> HashMap<String, Effect> {
        while let Some(cards) = self.rx.recv().await {
            self.bind(cards);
        }
        self.bindings
    }

    pub fn effect_for(&self, key: &str) -> Option<&Effect> {
        self.bindings.get(key)
    }

    pub fn bound_count(&self) -> usize {
        self.bindings.len()
    }

    // A batch replaces the whole results region, so earlier bindings are stale.
    fn bind(&mut self, cards: Vec<RenderedCard>) {
        self.bindings = cards
            .iter()
            .map(|card| (card.key.clone(), Effect::for_card(card)))
            .collect();
        debug!(cards = self.bindings.len(), "bound card effects");
    }
}
