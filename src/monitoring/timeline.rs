//! Execution Timeline
//!
//! Pairs the begin and end events of steps and parts by their structural
//! id, for timing reports and Gantt charts.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use log::debug;
use uuid::Uuid;

use crate::event::{CoreEvent, ExecutionEvent};

/// How a scope ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanOutcome {
    /// Begun but no closing event seen (yet)
    Open,
    /// Ended normally
    Completed,
    /// Ended in a stopped execution
    Stopped,
}

/// One step or part as seen in the event stream.
#[derive(Debug, Clone)]
pub struct TimelineSpan {
    pub structural_id: Uuid,
    /// The begin event's text without the leading "beginning ".
    pub label: String,
    pub level: usize,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub outcome: SpanOutcome,
}

impl TimelineSpan {
    pub fn duration(&self) -> Option<Duration> {
        self.end.map(|end| end - self.start)
    }
}

/// Collects spans from execution events.
///
/// Events may come from parallel branches in any order; only events with
/// a structural id are considered.
#[derive(Debug, Clone, Default)]
pub struct ExecutionTimeline {
    spans: Vec<TimelineSpan>,
    open: HashMap<Uuid, usize>,
}

impl ExecutionTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a ExecutionEvent>) -> Self {
        let mut timeline = Self::new();
        for event in events {
            timeline.record(event);
        }
        timeline
    }

    /// Adds one event to the timeline.
    pub fn record(&mut self, event: &ExecutionEvent) {
        let Some(structural_id) = event.structural_id else {
            return;
        };

        if event.core_event.is_beginning() {
            let text = event.core_event.to_string();
            let label = text.strip_prefix("beginning ").unwrap_or(&text).to_string();
            self.open.insert(structural_id, self.spans.len());
            self.spans.push(TimelineSpan {
                structural_id,
                label,
                level: event.level,
                start: event.time,
                end: None,
                outcome: SpanOutcome::Open,
            });
        } else if event.core_event.is_closing() {
            let Some(index) = self.open.remove(&structural_id) else {
                debug!("Closing event without beginning: {}", event.core_event);
                return;
            };
            let span = &mut self.spans[index];
            span.end = Some(event.time);
            span.outcome = match event.core_event {
                CoreEvent::StoppedStep { .. } => SpanOutcome::Stopped,
                _ => SpanOutcome::Completed,
            };
        }
    }

    /// All spans in the order they began.
    pub fn spans(&self) -> &[TimelineSpan] {
        &self.spans
    }

    /// Returns durations in milliseconds of all closed spans, by label.
    /// Repeated labels (forced steps) add up.
    pub fn durations(&self) -> HashMap<String, i64> {
        let mut durations: HashMap<String, i64> = HashMap::new();
        for span in &self.spans {
            if let Some(duration) = span.duration() {
                *durations.entry(span.label.clone()).or_insert(0) += duration.num_milliseconds();
            }
        }
        durations
    }

    /// Generates an ASCII Gantt chart representation.
    ///
    /// Each closed span is shown as a bar indicating when it ran relative
    /// to the whole timeline, indented by its level.
    pub fn gantt_chart(&self) -> String {
        let mut output = String::from("\nExecution Timeline:\n\n");

        let Some(first) = self.spans.iter().map(|span| span.start).min() else {
            return output;
        };
        let last = self
            .spans
            .iter()
            .filter_map(|span| span.end)
            .max()
            .unwrap_or(first);
        let total_time = (last - first).num_milliseconds();

        if total_time <= 0 {
            return output;
        }

        // Scale to 50 characters width
        let scale = 50.0 / total_time as f64;

        for span in &self.spans {
            let Some(duration) = span.duration() else {
                continue;
            };
            let start_pos = ((span.start - first).num_milliseconds() as f64 * scale) as usize;
            let width = (duration.num_milliseconds() as f64 * scale).max(1.0) as usize;

            let mut bar = " ".repeat(start_pos);
            bar.push_str(&"#".repeat(width));

            let label = format!("{}{}", "  ".repeat(span.level), span.label);
            output.push_str(&format!(
                "{:24} |{:50}| ({} ms)\n",
                truncate(&label, 24),
                bar,
                duration.num_milliseconds()
            ));
        }

        output.push_str(&format!("\nTotal: {} ms\n", total_time));
        output
    }
}

/// Truncates a string to `max` characters, marking cuts with "..".
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(2)).collect();
        format!("{}..", kept)
    }
}
