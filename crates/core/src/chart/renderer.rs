use crate::api::{ApiError, BrainApi, StockDataQuery, StockDataResponse};
use crate::chart::{palette_color, ChartSurface, LineSeriesOptions, SeriesId, INDICATOR_LINE_WIDTH};
use std::collections::BTreeMap;

/// Issued by [`ChartRenderer::begin_fetch`]; only the most recent ticket's
/// result is ever applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

impl FetchTicket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Applied,
    /// A newer fetch was started (or the view closed) before this one resolved.
    Stale,
    /// The fetch failed; the error went to the log and the chart was left as is.
    Failed,
}

/// Owns a chart surface and the ledger of indicator series drawn on it.
///
/// After every applied response the ledger holds exactly the response's
/// indicator names, and every handle it ever dropped has been removed from
/// the surface.
pub struct ChartRenderer<S: ChartSurface> {
    surface: S,
    ledger: BTreeMap<String, SeriesId>,
    generation: u64,
    loading: bool,
    closed: bool,
}

impl<S: ChartSurface> ChartRenderer<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            ledger: BTreeMap::new(),
            generation: 0,
            loading: false,
            closed: false,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn series_names(&self) -> impl Iterator<Item = &str> {
        self.ledger.keys().map(String::as_str)
    }

    pub fn series_count(&self) -> usize {
        self.ledger.len()
    }

    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.generation += 1;
        if !self.closed {
            self.set_loading(true);
        }
        FetchTicket(self.generation)
    }

    pub fn complete(
        &mut self,
        ticket: FetchTicket,
        result: Result<StockDataResponse, ApiError>,
    ) -> RenderOutcome {
        if self.closed || ticket.0 != self.generation {
            tracing::debug!(
                generation = ticket.0,
                latest = self.generation,
                closed = self.closed,
                "discarding stale stock data response"
            );
            return RenderOutcome::Stale;
        }

        self.set_loading(false);
        match result {
            Ok(response) => {
                self.render(&response);
                RenderOutcome::Applied
            }
            Err(err) => {
                tracing::error!(generation = ticket.0, error = %err, "failed to fetch stock data");
                RenderOutcome::Failed
            }
        }
    }

    /// Fetch with `query` and apply the result.
    pub async fn refresh(&mut self, api: &dyn BrainApi, query: &StockDataQuery) -> RenderOutcome {
        let ticket = self.begin_fetch();
        let result = api.get_stock_data_and_indicators(query).await;
        self.complete(ticket, result)
    }

    fn render(&mut self, response: &StockDataResponse) {
        self.surface.set_candles(&response.data);

        // Series are never reused: the same name may carry different values.
        self.clear_indicators();

        for (index, indicator) in response.indicators.iter().enumerate() {
            let id = self.surface.add_line_series(LineSeriesOptions {
                title: indicator.name.clone(),
                color: palette_color(index),
                line_width: INDICATOR_LINE_WIDTH,
            });
            self.surface.set_line_data(id, &indicator.data);

            if let Some(previous) = self.ledger.insert(indicator.name.clone(), id) {
                tracing::warn!(name = %indicator.name, "duplicate indicator in response; keeping the last one");
                self.surface.remove_series(previous);
            }
        }

        self.surface.fit_content();
        tracing::debug!(
            bars = response.data.len(),
            indicators = self.ledger.len(),
            "chart rendered"
        );
    }

    fn clear_indicators(&mut self) {
        for (_, id) in std::mem::take(&mut self.ledger) {
            self.surface.remove_series(id);
        }
    }

    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
        self.surface.set_loading(loading);
    }

    /// Release every series and the surface. Responses arriving afterwards are
    /// discarded.
    pub fn teardown(&mut self) {
        if self.closed {
            return;
        }
        self.clear_indicators();
        self.surface.remove();
        self.closed = true;
    }
}

impl<S: ChartSurface> Drop for ChartRenderer<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}
