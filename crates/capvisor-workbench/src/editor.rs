// SPDX-License-Identifier: Apache-2.0

use capvisor_model::{find_by_l2, AssetCardData, AssetCardPatch, CardStateError, VisualStatus};
use capvisor_synth::{distill, DistilledLink};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EditorError {
    UnknownCard(String),
    UnknownKnowledge(String),
    CardState(CardStateError),
    Service(String),
}

impl Display for EditorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownCard(id) => write!(f, "no card {id} in the stream"),
            Self::UnknownKnowledge(l2) => write!(f, "{l2} is not in the knowledge base"),
            Self::CardState(err) => write!(f, "{err}"),
            Self::Service(msg) => write!(f, "service call failed: {msg}"),
        }
    }
}

impl std::error::Error for EditorError {}

impl From<CardStateError> for EditorError {
    fn from(err: CardStateError) -> Self {
        Self::CardState(err)
    }
}

/// Result of one render attempt as reported back to the editor.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    Rendered { image_url: String, score: f64 },
    Failed,
}

/// The content asset stream being edited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamEditor {
    cards: Vec<AssetCardData>,
}

impl StreamEditor {
    #[must_use]
    pub fn new(cards: Vec<AssetCardData>) -> Self {
        Self { cards }
    }

    /// Swaps in a freshly generated stream.
    pub fn replace(&mut self, cards: Vec<AssetCardData>) {
        self.cards = cards;
    }

    #[must_use]
    pub fn cards(&self) -> &[AssetCardData] {
        &self.cards
    }

    #[must_use]
    pub fn card(&self, id: &str) -> Option<&AssetCardData> {
        self.cards.iter().find(|c| c.id == id)
    }

    fn card_mut(&mut self, id: &str) -> Result<&mut AssetCardData, EditorError> {
        self.cards
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| EditorError::UnknownCard(id.to_string()))
    }

    pub fn update(&mut self, id: &str, patch: &AssetCardPatch) -> Result<(), EditorError> {
        self.card_mut(id)?.apply(patch);
        Ok(())
    }

    /// Manual knowledge selection by technique label.
    pub fn link_knowledge(&mut self, id: &str, l2: &str) -> Result<(), EditorError> {
        let item = find_by_l2(l2).ok_or_else(|| EditorError::UnknownKnowledge(l2.to_string()))?;
        self.update(id, &AssetCardPatch::knowledge(item))
    }

    /// Moves the card to `rendering` and returns the prompt to render.
    pub fn begin_render(&mut self, id: &str) -> Result<String, EditorError> {
        let card = self.card_mut(id)?;
        card.begin_render()?;
        Ok(card.prompt.clone())
    }

    pub fn finish_render(&mut self, id: &str, outcome: RenderOutcome) -> Result<(), EditorError> {
        let card = self.card_mut(id)?;
        match outcome {
            RenderOutcome::Rendered { image_url, score } => card.complete_render(image_url, score)?,
            RenderOutcome::Failed => card.fail_render()?,
        }
        Ok(())
    }

    /// Applies a finished distillation if the card's current script still points at it.
    /// Returns whether the card changed.
    pub fn apply_link(&mut self, link: &DistilledLink) -> Result<bool, EditorError> {
        let card = self.card_mut(&link.card_id)?;
        match distill(&card.script, &card.l2_knowledge) {
            Some(item) if item.id == link.item.id => {
                card.link_knowledge(item);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Formula of the knowledge item linked to the card.
    #[must_use]
    pub fn active_formula(&self, id: &str) -> Option<&'static str> {
        self.card(id)?.knowledge().map(|k| k.formula)
    }

    #[must_use]
    pub fn rendering_count(&self) -> usize {
        self.cards
            .iter()
            .filter(|c| c.visual_status == VisualStatus::Rendering)
            .count()
    }

    #[must_use]
    pub fn into_cards(self) -> Vec<AssetCardData> {
        self.cards
    }
}
