//! Console render sink
//!
//! Prints each refreshed panel to stdout. Every render call writes one
//! self-contained block, so interleaved pulls stay readable.

use std::io::Write;

use crate::domain::{Conversion, ConversionError, SentimentReading, Volume};
use crate::ports::render::{AssetOption, Panel, PanelStatus, PriceMove, QuoteRow, RenderSink};

#[derive(Debug, Clone, Default)]
pub struct ConsoleSink {
    /// Also print dropdown contents of the converters
    show_options: bool,
    /// Only failures reach stdout
    quiet: bool,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, show: bool) -> Self {
        self.show_options = show;
        self
    }

    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Converter asset list, or nothing when options are hidden
    fn options_block(&self, panel: Panel, options: &[AssetOption]) -> Option<String> {
        if self.quiet || !self.show_options {
            return None;
        }
        let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
        Some(format!("[{}] {} assets: {}", panel, options.len(), labels.join(", ")))
    }

    fn emit(&self, block: String) {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        // A closed stdout is not worth failing a refresh over
        let _ = writeln!(out, "{}", block);
    }
}

impl RenderSink for ConsoleSink {
    fn render_rows(&self, panel: Panel, rows: &[QuoteRow]) {
        if self.quiet {
            return;
        }
        let mut block = format!("== {} ==", panel);
        for row in rows {
            block.push('\n');
            block.push_str(&format_row(row));
        }
        self.emit(block);
    }

    fn render_error(&self, panel: Panel, message: &str) {
        self.emit(format!("== {} ==\n  {}", panel, message));
    }

    fn render_status(&self, panel: Panel, status: &PanelStatus) {
        match status {
            PanelStatus::Updating => tracing::debug!("{} updating", panel),
            PanelStatus::Updated { at } => tracing::info!("{} updated at {}", panel, at.format("%H:%M:%S")),
            PanelStatus::UpdateFailed { reason } => {
                self.emit(format!("[{}] update failed: {}", panel, reason))
            }
        }
    }

    fn render_gauge(&self, reading: &SentimentReading) {
        if self.quiet {
            return;
        }
        self.emit(format!(
            "== sentiment ==\n  {} {:>3}/100 {}",
            gauge_bar(reading.value),
            reading.value,
            reading.classification.label()
        ));
    }

    fn render_options(&self, panel: Panel, options: &[AssetOption]) {
        if let Some(block) = self.options_block(panel, options) {
            self.emit(block);
        }
    }

    fn render_conversion(&self, panel: Panel, result: &Result<Conversion, ConversionError>) {
        match result {
            Ok(_) if self.quiet => {}
            Ok(conversion) => self.emit(format!("[{}] {}", panel, conversion)),
            Err(e) => self.emit(format!("[{}] {}", panel, e)),
        }
    }
}

/// One table line: rank, name, price, change, volume
pub fn format_row(row: &QuoteRow) -> String {
    let quote = &row.quote;
    let arrow = match row.movement {
        PriceMove::Up => "▲",
        PriceMove::Down => "▼",
        PriceMove::New | PriceMove::Unchanged => " ",
    };
    let mut line = format!(
        "{:>3}. {:<28} {:>14} {} {:>9} {:>16}",
        row.rank,
        quote.display_name,
        format_price(quote.price),
        arrow,
        format_change(quote.change_percent),
        format_volume(quote.volume.as_ref()),
    );
    if quote.source == crate::domain::SourceTag::Fallback {
        line.push_str("  (fallback)");
    }
    line
}

pub fn format_price(price: Option<f64>) -> String {
    match price {
        Some(p) if p >= 1.0 => format!("${}", group_thousands(&format!("{:.2}", p))),
        // Sub-dollar assets need more precision
        Some(p) => format!("${:.6}", p),
        None => "N/A".to_string(),
    }
}

pub fn format_change(change: Option<f64>) -> String {
    match change {
        Some(c) => format!("{:+.2}%", c),
        None => "N/A".to_string(),
    }
}

pub fn format_volume(volume: Option<&Volume>) -> String {
    match volume {
        Some(Volume::Units(units)) => group_thousands(&format!("{:.0}", units)),
        Some(Volume::Display(text)) if !text.trim().is_empty() => text.clone(),
        _ => "N/A".to_string(),
    }
}

/// Insert `,` separators into the integer part of a formatted number
fn group_thousands(formatted: &str) -> String {
    let (sign, unsigned) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int_part, frac)) => (int_part, Some(frac)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}

fn gauge_bar(value: u8) -> String {
    let filled = usize::from(value.min(100)) / 5;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(20 - filled))
}
