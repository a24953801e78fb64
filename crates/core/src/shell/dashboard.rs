use crate::api::BrainApi;
use crate::chart::{ChartRenderer, ChartSurface, RenderOutcome};
use crate::chat::{ChatPanel, ChatUpdate, SubmitError, TurnOutcome};
use crate::shell::state::ShellState;
use std::sync::Arc;
use tokio::sync::watch;

/// Composes the shell state with one chart and one chat panel over a shared
/// backend.
pub struct Dashboard<S: ChartSurface> {
    api: Arc<dyn BrainApi>,
    shell: ShellState,
    chart: ChartRenderer<S>,
    chat: ChatPanel,
    rendered_revision: Option<u64>,
}

impl<S: ChartSurface> Dashboard<S> {
    pub fn new(api: Arc<dyn BrainApi>, surface: S) -> Self {
        Self {
            api,
            shell: ShellState::default(),
            chart: ChartRenderer::new(surface),
            chat: ChatPanel::new(),
            rendered_revision: None,
        }
    }

    pub fn shell(&self) -> &ShellState {
        &self.shell
    }

    pub fn shell_mut(&mut self) -> &mut ShellState {
        &mut self.shell
    }

    pub fn chart(&self) -> &ChartRenderer<S> {
        &self.chart
    }

    pub fn surface_mut(&mut self) -> &mut S {
        self.chart.surface_mut()
    }

    pub fn chat(&self) -> &ChatPanel {
        &self.chat
    }

    /// Whether the shell changed since the chart last fetched.
    pub fn needs_refresh(&self) -> bool {
        self.rendered_revision != Some(self.shell.revision())
    }

    /// Refetch the chart if the shell changed. Each revision is fetched once,
    /// whatever the outcome.
    pub async fn refresh_chart(&mut self) -> Option<RenderOutcome> {
        if !self.needs_refresh() {
            return None;
        }
        Some(self.force_refresh().await)
    }

    pub async fn force_refresh(&mut self) -> RenderOutcome {
        let query = self.shell.chart_query();
        self.rendered_revision = Some(self.shell.revision());
        let api = Arc::clone(&self.api);
        self.chart.refresh(api.as_ref(), &query).await
    }

    pub async fn send_chat<F>(
        &mut self,
        text: &str,
        cancel: watch::Receiver<bool>,
        on_update: F,
    ) -> Result<TurnOutcome, SubmitError>
    where
        F: FnMut(ChatUpdate<'_>),
    {
        let turn = self.chat.submit_text(text)?;
        let api = Arc::clone(&self.api);
        Ok(self.chat.drive(api.as_ref(), turn, cancel, on_update).await)
    }

    /// Release the chart surface. Open chat streams end with their `drive` call.
    pub fn close(&mut self) {
        self.chart.teardown();
    }
}
