//! Table View
//!
//! Owns what a table panel currently shows. Successful refreshes replace the
//! rows; failed refreshes leave them in place and only change the status, so
//! a table with data never goes blank because one refresh failed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use chrono::Utc;

use crate::domain::Quote;
use crate::ports::render::{Panel, PanelStatus, PriceMove, QuoteRow, RenderSink};

pub struct TableView {
    panel: Panel,
    sink: Arc<dyn RenderSink>,
    rows: Mutex<Vec<QuoteRow>>,
}

impl TableView {
    pub fn new(panel: Panel, sink: Arc<dyn RenderSink>) -> Self {
        Self {
            panel,
            sink,
            rows: Mutex::new(Vec::new()),
        }
    }

    pub fn panel(&self) -> Panel {
        self.panel
    }

    fn current(&self) -> MutexGuard<'_, Vec<QuoteRow>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rows currently on screen
    pub fn rows(&self) -> Vec<QuoteRow> {
        self.current().clone()
    }

    pub fn begin(&self) {
        self.sink.render_status(self.panel, &PanelStatus::Updating);
    }

    /// Replace the table with a fresh snapshot. Identical data is not re-rendered.
    pub fn show(&self, quotes: Vec<Quote>) {
        let mut current = self.current();

        let unchanged = current.len() == quotes.len()
            && current.iter().zip(&quotes).all(|(row, quote)| &row.quote == quote);

        if !unchanged {
            let previous: HashMap<String, Option<f64>> = current
                .iter()
                .map(|row| (row.quote.key(), row.quote.price))
                .collect();

            let rows: Vec<QuoteRow> = quotes
                .into_iter()
                .enumerate()
                .map(|(index, quote)| {
                    let movement = match previous.get(&quote.key()) {
                        Some(old) => PriceMove::between(*old, quote.price),
                        None => PriceMove::New,
                    };
                    QuoteRow {
                        rank: index + 1,
                        quote,
                        movement,
                    }
                })
                .collect();

            self.sink.render_rows(self.panel, &rows);
            *current = rows;
        } else {
            tracing::debug!("{}: data unchanged, status only", self.panel);
        }

        self.sink
            .render_status(self.panel, &PanelStatus::Updated { at: Utc::now() });
    }

    /// Record a failed refresh. Prior rows stay; an empty table gets an error row.
    pub fn fail(&self, message: &str) {
        if self.current().is_empty() {
            self.sink.render_error(self.panel, message);
        } else {
            tracing::warn!("{}: refresh failed, keeping stale rows: {}", self.panel, message);
        }

        self.sink.render_status(
            self.panel,
            &PanelStatus::UpdateFailed {
                reason: message.to_string(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mocks::{RecordingSink, RenderEvent};

    fn quote(symbol: &str, price: f64) -> Quote {
        Quote::new(symbol, symbol).with_price(price).with_change_percent(0.1)
    }

    fn view() -> (TableView, RecordingSink) {
        let sink = RecordingSink::new();
        (TableView::new(Panel::Crypto, Arc::new(sink.clone())), sink)
    }

    #[test]
    fn test_first_render_ranks_rows_as_new() {
        let (view, sink) = view();
        view.show(vec![quote("bitcoin", 65000.0), quote("ethereum", 3200.0)]);

        let rows = sink.last_rows(Panel::Crypto).unwrap();
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[1].rank, 2);
        assert!(rows.iter().all(|r| r.movement == PriceMove::New));
        assert!(matches!(
            sink.last_status(Panel::Crypto),
            Some(PanelStatus::Updated { .. })
        ));
    }

    #[test]
    fn test_movement_against_previous_render() {
        let (view, sink) = view();
        view.show(vec![quote("bitcoin", 65000.0), quote("ethereum", 3200.0)]);
        view.show(vec![
            quote("bitcoin", 66000.0),
            quote("ethereum", 3100.0),
            quote("solana", 150.0),
        ]);

        let rows = sink.last_rows(Panel::Crypto).unwrap();
        assert_eq!(rows[0].movement, PriceMove::Up);
        assert_eq!(rows[1].movement, PriceMove::Down);
        assert_eq!(rows[2].movement, PriceMove::New);
    }

    #[test]
    fn test_identical_data_updates_status_only() {
        let (view, sink) = view();
        view.show(vec![quote("bitcoin", 65000.0)]);
        view.show(vec![quote("bitcoin", 65000.0)]);

        assert_eq!(sink.row_renders(Panel::Crypto).len(), 1);
        let statuses = sink
            .events()
            .into_iter()
            .filter(|e| matches!(e, RenderEvent::Status(_, PanelStatus::Updated { .. })))
            .count();
        assert_eq!(statuses, 2);
    }

    #[test]
    fn test_failure_on_empty_table_renders_error_row() {
        let (view, sink) = view();
        view.fail("Could not load crypto prices");

        assert_eq!(sink.errors(Panel::Crypto), vec!["Could not load crypto prices"]);
        assert_eq!(
            sink.last_status(Panel::Crypto),
            Some(PanelStatus::UpdateFailed {
                reason: "Could not load crypto prices".into()
            })
        );
    }

    #[test]
    fn test_failure_after_success_keeps_rows() {
        let (view, sink) = view();
        view.show(vec![quote("bitcoin", 65000.0)]);
        view.fail("timeout");

        assert!(sink.errors(Panel::Crypto).is_empty());
        assert_eq!(view.rows().len(), 1);
        assert_eq!(sink.row_renders(Panel::Crypto).len(), 1);
        assert!(matches!(
            sink.last_status(Panel::Crypto),
            Some(PanelStatus::UpdateFailed { .. })
        ));
    }
}
