//! Log coalescing for high-rate repeated events
//!
//! Status messages arrive every second or faster and are mostly identical.
//! A [`LogPack`] logs the first of a run, counts the repeats, and logs one
//! `title: text  x N` line when the run ends:
//!
//! - the text changes
//! - the time since the run's anchor reaches the threshold
//! - the repeat count reaches `max_packing`
//! - [`LogPack::flush`] is called
//!
//! The anchor only moves when a summary is written, so a steady stream
//! produces one summary per threshold window.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct LogPack {
    title: String,
    threshold: Duration,
    max_packing: usize,
    with_text: bool,
    last: Option<(Instant, Option<String>)>,
    packing_count: usize,
}

impl LogPack {
    pub fn new(title: impl Into<String>, threshold: Duration, max_packing: usize) -> Self {
        Self {
            title: title.into(),
            threshold,
            max_packing,
            with_text: true,
            last: None,
            packing_count: 0,
        }
    }

    /// Log only the title, not the text
    pub fn without_text(mut self) -> Self {
        self.with_text = false;
        self
    }

    /// Record one event; returns the lines written
    pub fn log(&mut self, text: Option<&str>) -> Vec<String> {
        self.log_at(Instant::now(), text)
    }

    pub fn log_at(&mut self, now: Instant, text: Option<&str>) -> Vec<String> {
        let mut lines = Vec::new();
        let mut anchor = now;

        match self.last.take() {
            Some((last_at, last_text)) if last_text.as_deref() == text => {
                self.packing_count += 1;
                if now.saturating_duration_since(last_at) >= self.threshold
                    || self.packing_count >= self.max_packing
                {
                    lines.extend(self.pack(last_text.as_deref()));
                } else {
                    anchor = last_at;
                }
            }
            Some((_, last_text)) => {
                lines.extend(self.pack(last_text.as_deref()));
                lines.push(self.write(self.line(text)));
            }
            None => lines.push(self.write(self.line(text))),
        }

        self.last = Some((anchor, text.map(str::to_string)));
        lines
    }

    /// Write the pending summary, if any
    pub fn flush(&mut self) -> Option<String> {
        let text = self.last.as_ref().and_then(|(_, t)| t.clone());
        self.pack(text.as_deref())
    }

    /// Repeats counted since the last summary
    pub fn pending(&self) -> usize {
        self.packing_count
    }

    fn line(&self, text: Option<&str>) -> String {
        match text {
            Some(text) if self.with_text => format!("{}: {}", self.title, text),
            _ => self.title.clone(),
        }
    }

    fn pack(&mut self, text: Option<&str>) -> Option<String> {
        if self.packing_count == 0 {
            return None;
        }
        let line = format!("{}  x {}", self.line(text), self.packing_count);
        self.packing_count = 0;
        Some(self.write(line))
    }

    fn write(&self, line: String) -> String {
        log::info!("{}", line);
        line
    }
}
