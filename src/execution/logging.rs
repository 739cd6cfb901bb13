//! Execution Logging
//!
//! Messages logged during an execution become message events carrying the
//! current nesting. Appeasement clamps their severity; a fatal message
//! stops the execution if it is configured to.

use crate::event::{CoreEvent, InfoType};
use crate::localization::{fill_placeholders, MultiLanguageText};

use super::engine::Execution;

/// A localizable message: an optional ID, a severity, the fact and
/// optionally a solution. Texts may contain `$0`, `$1`, ... placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Option<String>,
    pub severity: InfoType,
    pub fact: MultiLanguageText,
    pub solution: Option<MultiLanguageText>,
}

impl Message {
    pub fn new(id: Option<&str>, severity: InfoType, fact: impl Into<MultiLanguageText>) -> Self {
        Self {
            id: id.map(str::to_string),
            severity,
            fact: fact.into(),
            solution: None,
        }
    }

    pub fn with_solution(mut self, solution: impl Into<MultiLanguageText>) -> Self {
        self.solution = Some(solution.into());
        self
    }

    /// The same message with another severity.
    pub fn with_severity(&self, severity: InfoType) -> Self {
        Self {
            severity,
            ..self.clone()
        }
    }
}

fn with_position(text: String, position: Option<&str>) -> String {
    match position {
        Some(position) => format!("{} @ {}", text, position),
        None => text,
    }
}

impl Execution {
    /// Logs a message.
    ///
    /// Inside [`appease`](Execution::appease) the severity is clamped to
    /// the innermost ceiling. A fatal (or worse) severity stops the
    /// execution if configured, judged by the severity before clamping.
    pub fn log(&mut self, severity: InfoType, message: &str, position: Option<&str>) {
        let (effective, original) = severity.appeased_to(self.appease_types.last().copied());
        let event = self
            .event(
                effective,
                CoreEvent::Message {
                    message: with_position(message.to_string(), position),
                },
                None,
            )
            .with_original_severity(original);
        self.emit_event(event);

        if severity.is_fatal() && self.stop_at_fatal_error {
            self.stop(&format!("{} error occurred", severity));
        }
    }

    /// Logs a text in the execution's language.
    pub fn log_text(
        &mut self,
        severity: InfoType,
        text: &MultiLanguageText,
        position: Option<&str>,
    ) {
        let message = text.for_language(self.language).to_string();
        self.log(severity, &message, position);
    }

    /// Logs a localized message, filling its placeholders with `arguments`.
    ///
    /// The result reads `[id]: fact @ position → solution`.
    pub fn log_message(&mut self, message: &Message, position: Option<&str>, arguments: &[&str]) {
        let fact = fill_placeholders(message.fact.for_language(self.language), arguments);
        let core = with_position(fact, position);
        let id_prefix = message
            .id
            .as_ref()
            .map(|id| format!("[{}]: ", id))
            .unwrap_or_default();
        let solution_suffix = message
            .solution
            .as_ref()
            .map(|solution| {
                format!(
                    " → {}",
                    fill_placeholders(solution.for_language(self.language), arguments)
                )
            })
            .unwrap_or_default();

        self.log(
            message.severity,
            &format!("{}{}{}", id_prefix, core, solution_suffix),
            None,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ExecutionInfoFormat, StepId};
    use crate::localization::Language;
    use crate::sink::CollectingEventProcessor;
    use std::sync::Arc;

    const STEP1: StepId = StepId::new("stepwise/logging", "step1()");
    const STEP2: StepId = StepId::new("stepwise/logging", "step2()");

    fn typed() -> Arc<CollectingEventProcessor> {
        Arc::new(CollectingEventProcessor::with_format(
            "test",
            ExecutionInfoFormat {
                add_type: true,
                ..Default::default()
            },
        ))
    }

    fn not_ok() -> Message {
        Message::new(
            Some("values not OK"),
            InfoType::Info,
            [
                (Language::En, "\"$0\" and \"$1\" are not OK"),
                (Language::De, "\"$0\" und \"$1\" sind nicht OK"),
            ],
        )
    }

    #[test]
    fn test_log_message_with_arguments() {
        let processor = typed();
        let mut execution = Execution::new(processor.clone());

        execution.log_message(&not_ok(), None, &["A", "B"]);

        processor.wait();
        assert_eq!(processor.lines(), vec!["{info} [values not OK]: \"A\" and \"B\" are not OK"]);
    }

    #[test]
    fn test_log_message_localized_with_solution() {
        let processor = typed();
        let mut execution = Execution::new(processor.clone()).with_language(Language::De);
        let message = not_ok().with_solution([
            (Language::En, "change \"$0\" and \"$1\""),
            (Language::De, "ändere \"$0\" und \"$1\""),
        ]);

        execution.log_message(&message, Some("line 3"), &["A", "B"]);

        processor.wait();
        assert_eq!(
            processor.lines(),
            vec![
                "{info} [values not OK]: \"A\" und \"B\" sind nicht OK @ line 3 \
                 → ändere \"A\" und \"B\""
            ]
        );
    }

    #[test]
    fn test_log_text_and_severity_override() {
        let processor = typed();
        let mut execution = Execution::new(processor.clone());
        let text = MultiLanguageText::from([(Language::En, "plain text")]);

        execution.log_text(InfoType::Warning, &text, Some("here"));
        execution.log_message(&not_ok().with_severity(InfoType::Error), None, &[]);

        processor.wait();
        assert_eq!(
            processor.lines(),
            vec![
                "{warning} plain text @ here",
                "{error} [values not OK]: \"$0\" and \"$1\" are not OK",
            ]
        );
    }

    #[test]
    fn test_appeasement() {
        let processor = typed();
        let mut execution = Execution::new(processor.clone());

        execution.appease(InfoType::Warning, |execution| {
            execution.log(InfoType::Error, "this was an error", None);
            execution.appease(InfoType::Info, |execution| {
                execution.log(InfoType::Warning, "this was a warning", None);
            });
        });
        execution.appease(InfoType::Error, |execution| {
            execution.log(InfoType::Fatal, "this was a fatal error", None);
        });
        execution.log(InfoType::Fatal, "this is still a fatal error", None);

        processor.wait();
        let lines: Vec<String> = processor
            .lines()
            .into_iter()
            .filter(|line| !line.contains("stopping execution"))
            .collect();
        assert_eq!(
            lines,
            vec![
                "{warning} this was an error",
                "{info} this was a warning",
                "{error} this was a fatal error",
                "{fatal} this is still a fatal error",
            ]
        );
    }

    #[test]
    fn test_appeased_event_keeps_original_severity() {
        let processor = typed();
        let mut execution = Execution::new(processor.clone());

        execution.appease(InfoType::Warning, |execution| {
            execution.log(InfoType::Fatal, "bad", None);
        });

        processor.wait();
        let events = processor.events();
        let message = events.iter().find(|event| event.is_message()).unwrap();
        assert_eq!(message.severity, InfoType::Warning);
        assert_eq!(message.original_severity, Some(InfoType::Fatal));
    }

    #[test]
    fn test_fatal_stops_even_when_appeased() {
        let mut execution = Execution::new(typed());
        execution.appease(InfoType::Warning, |execution| {
            execution.log(InfoType::Fatal, "bad", None);
        });
        assert!(execution.stopped());
    }

    #[test]
    fn test_fatal_without_auto_stop() {
        let mut execution = Execution::new(typed()).stopping_at_fatal_error(false);
        execution.log(InfoType::Deadly, "very bad", None);
        assert!(!execution.stopped());
    }

    #[test]
    fn test_log_after_stop_is_recorded() {
        let processor = typed();
        let mut execution = Execution::new(processor.clone());

        execution.effectuate(None, &STEP1, |execution| {
            execution.stop("enough");
            execution.log(InfoType::Info, "still here", None);
            execution.effectuate(None, &STEP2, |_| ());
        });

        processor.wait();
        assert_eq!(
            processor.lines(),
            vec![
                "{progress} beginning step step1()@stepwise",
                "{progress} stopping execution: enough",
                "{info} still here",
                "{progress} skipping in an stopped environment step step2()@stepwise",
                "{progress} stopped step step1()@stepwise",
            ]
        );
    }

    #[test]
    fn test_fatal_stop_reason() {
        let processor = typed();
        let mut execution = Execution::new(processor.clone());
        execution.log(InfoType::Loss, "lost", None);

        processor.wait();
        assert_eq!(
            processor.lines(),
            vec!["{loss} lost", "{progress} stopping execution: loss error occurred"]
        );
    }
}
