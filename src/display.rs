//! Fixed-width line output on top of a [`CharDisplay`].
//!
//! Callers hand over logical strings; the adapter truncates or space-pads
//! each one to the panel width so a shorter line never leaves stale
//! characters from the previous frame behind.

use log::warn;

use crate::error::DisplayError;
use crate::hal::CharDisplay;

/// Truncate or space-pad `text` to exactly `width` characters.
pub fn pad(text: &str, width: usize) -> String {
    let mut out: String = text.chars().take(width).collect();
    let used = out.chars().count();
    out.extend(std::iter::repeat(' ').take(width - used));
    out
}

/// The two lines shown for one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayFrame {
    pub line0: String,
    pub line1: String,
}

impl DisplayFrame {
    pub fn new(line0: &str, line1: &str, width: usize) -> Self {
        Self {
            line0: pad(line0, width),
            line1: pad(line1, width),
        }
    }
}

pub struct DisplayAdapter<D> {
    display: D,
}

impl<D: CharDisplay> DisplayAdapter<D> {
    pub fn new(display: D) -> Self {
        Self { display }
    }

    pub fn columns(&self) -> usize {
        self.display.columns()
    }

    pub fn pad(&self, text: &str) -> String {
        pad(text, self.display.columns())
    }

    /// Overwrite `row` with `text`, padded to the full width.
    pub fn line(&mut self, row: u8, text: &str) -> Result<(), DisplayError> {
        let padded = self.pad(text);
        self.display.set_cursor(0, row)?;
        self.display.write(&padded)
    }

    /// Clear and redraw both lines.
    pub fn show(&mut self, frame: &DisplayFrame) -> Result<(), DisplayError> {
        self.display.clear()?;
        self.line(0, &frame.line0)?;
        self.line(1, &frame.line1)
    }

    /// Startup/progress message. A display fault must not stop the
    /// operation being reported, so failures are only logged.
    pub fn progress(&mut self, line0: &str, line1: &str) {
        if let Err(e) = self.line(0, line0).and_then(|_| self.line(1, line1)) {
            warn!("display: progress '{}' not shown: {}", line0, e);
        }
    }

    pub fn into_inner(self) -> D {
        self.display
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimDisplay;

    #[test]
    fn pad_short_text_with_spaces() {
        assert_eq!(pad("Hi", 16), "Hi              ");
        assert_eq!(pad("", 4), "    ");
    }

    #[test]
    fn pad_truncates_long_text() {
        assert_eq!(pad("ThisIsWayTooLongForSixteen", 16), "ThisIsWayTooLong");
    }

    #[test]
    fn pad_counts_characters_not_bytes() {
        let padded = pad("Zürich", 8);
        assert_eq!(padded.chars().count(), 8);
        assert_eq!(padded, "Zürich  ");
    }

    #[test]
    fn show_clears_then_writes_both_rows() {
        let lcd = SimDisplay::new(16, 2);
        let mut adapter = DisplayAdapter::new(lcd.clone());
        adapter.line(1, "leftover text!!!").unwrap();

        adapter
            .show(&DisplayFrame::new("12:00:00 T:3.0", "H:1% P:2", 16))
            .unwrap();

        assert_eq!(lcd.row(0), "12:00:00 T:3.0  ");
        assert_eq!(lcd.row(1), "H:1% P:2        ");
        assert_eq!(lcd.clear_count(), 1);
    }

    #[test]
    fn progress_survives_display_faults() {
        let lcd = SimDisplay::new(16, 2);
        lcd.set_faulty(true);
        let mut adapter = DisplayAdapter::new(lcd.clone());
        adapter.progress("Connecting WiFi", "Try 1/20");
        assert_eq!(lcd.row(0), " ".repeat(16));
    }
}
