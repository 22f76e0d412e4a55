//! Render adapters

mod console;

pub use console::{format_change, format_price, format_row, format_volume, ConsoleSink};
