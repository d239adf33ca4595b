// SPDX-License-Identifier: Apache-2.0

use crate::client::{ApiClient, ClientError};
use crate::editor::{EditorError, RenderOutcome, StreamEditor};
use async_trait::async_trait;
use capvisor_model::{AssetCardData, AssetCardPatch};
use capvisor_synth::{DistillScheduler, DistilledLink, DISTILL_QUIET_PERIOD};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Per-card service calls the workbench makes on the user's behalf.
#[async_trait]
pub trait AssetService: Send + Sync {
    async fn translate(&self, visual_logic: &str) -> Result<String, ClientError>;
    async fn render(&self, prompt: &str) -> Result<String, ClientError>;
    async fn score(&self, image_url: &str, prompt: &str) -> Result<f64, ClientError>;
}

#[async_trait]
impl AssetService for ApiClient {
    async fn translate(&self, visual_logic: &str) -> Result<String, ClientError> {
        ApiClient::translate(self, visual_logic).await
    }

    async fn render(&self, prompt: &str) -> Result<String, ClientError> {
        self.image(prompt).await
    }

    async fn score(&self, image_url: &str, prompt: &str) -> Result<f64, ClientError> {
        ApiClient::score(self, image_url, prompt).await
    }
}

/// A render taken out of the workbench. Running it borrows nothing, so other cards stay
/// editable while it is in flight.
pub struct RenderJob<S> {
    card_id: String,
    prompt: String,
    service: Arc<S>,
}

impl<S: AssetService> RenderJob<S> {
    #[must_use]
    pub fn card_id(&self) -> &str {
        &self.card_id
    }

    /// Renders then scores; the result goes back through [`Workbench::finish_render`].
    pub async fn run(self) -> RenderResult {
        let outcome = match self.service.render(&self.prompt).await {
            Ok(image_url) => self
                .service
                .score(&image_url, &self.prompt)
                .await
                .map(|score| (image_url, score)),
            Err(err) => Err(err),
        };
        RenderResult {
            card_id: self.card_id,
            outcome,
        }
    }
}

#[derive(Debug)]
pub struct RenderResult {
    pub card_id: String,
    pub outcome: Result<(String, f64), ClientError>,
}

/// Editing session over one asset stream: edits, renders, translations, and the
/// debounced knowledge distiller. Needs a tokio runtime; dropping it cancels pending timers.
pub struct Workbench<S> {
    editor: StreamEditor,
    service: Arc<S>,
    distiller: DistillScheduler,
    links: mpsc::UnboundedReceiver<DistilledLink>,
}

impl<S: AssetService + 'static> Workbench<S> {
    #[must_use]
    pub fn new(service: S, cards: Vec<AssetCardData>) -> Self {
        Self::with_quiet_period(service, cards, DISTILL_QUIET_PERIOD)
    }

    #[must_use]
    pub fn with_quiet_period(service: S, cards: Vec<AssetCardData>, quiet: Duration) -> Self {
        let (distiller, links) = DistillScheduler::new(quiet);
        Self {
            editor: StreamEditor::new(cards),
            service: Arc::new(service),
            distiller,
            links,
        }
    }

    #[must_use]
    pub fn editor(&self) -> &StreamEditor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut StreamEditor {
        &mut self.editor
    }

    /// Replaces the stream; timers for the old cards are dropped with it.
    pub fn load_stream(&mut self, cards: Vec<AssetCardData>) {
        self.distiller.cancel_all();
        while self.links.try_recv().is_ok() {}
        self.editor.replace(cards);
    }

    /// Stores the new script and restarts the card's distill timer.
    pub fn edit_script(&mut self, id: &str, script: &str) -> Result<(), EditorError> {
        self.editor.update(id, &AssetCardPatch::script(script))?;
        let current_l2 = self
            .editor
            .card(id)
            .map(|c| c.l2_knowledge.clone())
            .unwrap_or_default();
        self.distiller.on_edit(id, script, &current_l2);
        Ok(())
    }

    /// Applies every distillation that has fired so far; returns how many cards changed.
    pub fn drain_links(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(link) = self.links.try_recv() {
            match self.editor.apply_link(&link) {
                Ok(true) => applied += 1,
                Ok(false) => {}
                Err(err) => warn!(card_id = %link.card_id, error = %err, "distilled link dropped"),
            }
        }
        applied
    }

    /// Cancels the card's pending distill timer.
    pub fn dispose_card(&mut self, id: &str) -> bool {
        self.distiller.cancel(id)
    }

    #[must_use]
    pub fn pending_distills(&self) -> usize {
        self.distiller.pending_count()
    }

    /// Rewrites the card's prompt from its visual logic.
    pub async fn translate_card(&mut self, id: &str) -> Result<String, EditorError> {
        let visual_logic = self
            .editor
            .card(id)
            .map(|c| c.visual_logic.clone())
            .ok_or_else(|| EditorError::UnknownCard(id.to_string()))?;
        let prompt = self
            .service
            .translate(&visual_logic)
            .await
            .map_err(|e| EditorError::Service(e.to_string()))?;
        self.editor.update(id, &AssetCardPatch::prompt(prompt.clone()))?;
        Ok(prompt)
    }

    /// Moves the card to `rendering` and hands out the job that renders it.
    pub fn begin_render(&mut self, id: &str) -> Result<RenderJob<S>, EditorError> {
        let prompt = self.editor.begin_render(id)?;
        Ok(RenderJob {
            card_id: id.to_string(),
            prompt,
            service: Arc::clone(&self.service),
        })
    }

    /// Records a finished job. Any failure returns the card to `skeleton`.
    pub fn finish_render(&mut self, result: RenderResult) -> Result<(), EditorError> {
        let id = result.card_id;
        match result.outcome {
            Ok((image_url, score)) => {
                self.editor
                    .finish_render(&id, RenderOutcome::Rendered { image_url, score })?;
                info!(card_id = %id, "card rendered");
                Ok(())
            }
            Err(err) => {
                self.editor.finish_render(&id, RenderOutcome::Failed)?;
                warn!(card_id = %id, error = %err, "card render failed");
                Err(EditorError::Service(err.to_string()))
            }
        }
    }

    /// Renders one card start to finish.
    pub async fn render_card(&mut self, id: &str) -> Result<(), EditorError> {
        let job = self.begin_render(id)?;
        let result = job.run().await;
        self.finish_render(result)
    }

    #[must_use]
    pub fn into_cards(self) -> Vec<AssetCardData> {
        self.editor.into_cards()
    }
}
