//! Event Data Model
//!
//! Immutable records describing every transition of an execution:
//! step identities, the nested scope frames ("effectuations") and the
//! events emitted when scopes begin, end or get skipped.

use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::severity::InfoType;

pub const STEP_PREFIX: &str = "step ";
pub const DISPENSABLE_PART_PREFIX: &str = "dispensable part ";
pub const OPTIONAL_PART_PREFIX: &str = "optional part ";
pub const DESCRIBED_PART_PREFIX: &str = "doing ";

/// Separator between the frames of a rendered execution path.
const PATH_SEPARATOR: &str = " -> ";

/// Identity of a declared step.
///
/// Two invocations of the same declared step share one `StepId`,
/// whatever their arguments. Identities are usually constants built once
/// next to the step function, see [`step_id!`](crate::step_id).
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepId {
    designation: Cow<'static, str>,
    signature: Cow<'static, str>,
}

impl StepId {
    /// Creates a step identity from a source designator (e.g. a module
    /// path) and a signature.
    pub const fn new(designation: &'static str, signature: &'static str) -> Self {
        Self {
            designation: Cow::Borrowed(designation),
            signature: Cow::Borrowed(signature),
        }
    }

    /// Creates a step identity from runtime strings.
    pub fn owned(designation: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            designation: Cow::Owned(designation.into()),
            signature: Cow::Owned(signature.into()),
        }
    }

    pub fn designation(&self) -> &str {
        &self.designation
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }
}

impl fmt::Display for StepId {
    /// `signature@first-designator-segment`, e.g. `load(path)@mycrate`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = self
            .designation
            .split(|c| c == '/' || c == ':')
            .next()
            .unwrap_or_default();
        write!(f, "{}@{}", self.signature, origin)
    }
}

/// Builds a constant [`StepId`] for the calling module.
///
/// ```
/// use stepwise::{step_id, StepId};
///
/// const LOAD: StepId = step_id!("load(path)");
/// assert_eq!(LOAD.signature(), "load(path)");
/// ```
#[macro_export]
macro_rules! step_id {
    ($signature:expr) => {
        $crate::StepId::new(module_path!(), $signature)
    };
}

/// One frame of the effectuation stack.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effectuation {
    Step {
        step: StepId,
        description: Option<String>,
    },
    DispensablePart {
        name: String,
        description: Option<String>,
    },
    OptionalPart {
        name: String,
        description: Option<String>,
    },
    DescribedPart {
        description: String,
    },
    Forcing,
}

impl Effectuation {
    /// Renders the frame without its description.
    pub fn short(&self) -> String {
        self.render(false)
    }

    /// Renders the frame, with or without the optional description.
    pub fn render(&self, with_description: bool) -> String {
        let suffix = |description: &Option<String>| match description {
            Some(description) if with_description => format!(" ({})", description),
            _ => String::new(),
        };
        match self {
            Effectuation::Step { step, description } => {
                format!("{}{}{}", STEP_PREFIX, step, suffix(description))
            }
            Effectuation::DispensablePart { name, description } => {
                format!("{}\"{}\"{}", DISPENSABLE_PART_PREFIX, name, suffix(description))
            }
            Effectuation::OptionalPart { name, description } => {
                format!("{}\"{}\"{}", OPTIONAL_PART_PREFIX, name, suffix(description))
            }
            Effectuation::DescribedPart { description } => {
                format!("{}\"{}\"", DESCRIBED_PART_PREFIX, description)
            }
            Effectuation::Forcing => "forcing".to_string(),
        }
    }
}

impl fmt::Display for Effectuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(true))
    }
}

/// Renders a stack as `a -> b -> c` using the short frame form.
pub fn execution_path(stack: &[Effectuation]) -> String {
    stack
        .iter()
        .map(Effectuation::short)
        .collect::<Vec<_>>()
        .join(PATH_SEPARATOR)
}

/// Renders a stack as `a -> b -> c` including frame descriptions.
pub fn full_execution_path(stack: &[Effectuation]) -> String {
    stack
        .iter()
        .map(|effectuation| effectuation.render(true))
        .collect::<Vec<_>>()
        .join(PATH_SEPARATOR)
}

/// Renders a stack as `a -> b -> `, the form used for scope events, where
/// the trailing arrow points at the scope the event is about.
fn execution_path_for_effectuation(stack: &[Effectuation]) -> String {
    stack
        .iter()
        .map(|effectuation| format!("{}{}", effectuation.short(), PATH_SEPARATOR))
        .collect()
}

fn with_description(text: String, description: &Option<String>) -> String {
    match description {
        Some(description) => format!("{} ({})", text, description),
        None => text,
    }
}

/// What happened, independent of where and when.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CoreEvent {
    BeginningStep {
        id: StepId,
        description: Option<String>,
        forced: bool,
    },
    EndingStep {
        id: StepId,
        description: Option<String>,
        forced: bool,
    },
    StoppedStep {
        id: StepId,
        description: Option<String>,
    },
    SkippingPreviouslyExecutedStep {
        id: StepId,
        description: Option<String>,
    },
    SkippingStepInStoppedExecution {
        id: StepId,
        description: Option<String>,
    },
    BeginningDispensablePart {
        name: String,
        description: Option<String>,
    },
    EndingDispensablePart {
        name: String,
        description: Option<String>,
    },
    SkippingDispensablePart {
        name: String,
        description: Option<String>,
    },
    BeginningOptionalPart {
        name: String,
        description: Option<String>,
    },
    EndingOptionalPart {
        name: String,
        description: Option<String>,
    },
    SkippingOptionalPart {
        name: String,
        description: Option<String>,
    },
    BeginningDescribedPart {
        description: String,
    },
    EndingDescribedPart {
        description: String,
    },
    StoppingExecution {
        reason: String,
    },
    BeginningForcingSteps,
    EndingForcingSteps,
    Message {
        message: String,
    },
}

impl CoreEvent {
    /// Returns true for events that open a scope.
    pub fn is_beginning(&self) -> bool {
        matches!(
            self,
            CoreEvent::BeginningStep { .. }
                | CoreEvent::BeginningDispensablePart { .. }
                | CoreEvent::BeginningOptionalPart { .. }
                | CoreEvent::BeginningDescribedPart { .. }
                | CoreEvent::BeginningForcingSteps
        )
    }

    /// Returns true for events that close a scope, including stopped steps.
    pub fn is_closing(&self) -> bool {
        matches!(
            self,
            CoreEvent::EndingStep { .. }
                | CoreEvent::StoppedStep { .. }
                | CoreEvent::EndingDispensablePart { .. }
                | CoreEvent::EndingOptionalPart { .. }
                | CoreEvent::EndingDescribedPart { .. }
                | CoreEvent::EndingForcingSteps
        )
    }
}

impl fmt::Display for CoreEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let forced_marker = |forced: &bool| if *forced { "forced " } else { "" };
        let text = match self {
            CoreEvent::StoppingExecution { reason } => format!("stopping execution: {}", reason),
            CoreEvent::BeginningStep { id, description, forced } => with_description(
                format!("beginning {}step {}", forced_marker(forced), id),
                description,
            ),
            CoreEvent::EndingStep { id, description, forced } => with_description(
                format!("ending {}step {}", forced_marker(forced), id),
                description,
            ),
            CoreEvent::SkippingPreviouslyExecutedStep { id, description } => with_description(
                format!("skipping previously executed step {}", id),
                description,
            ),
            CoreEvent::SkippingStepInStoppedExecution { id, description } => with_description(
                format!("skipping in an stopped environment step {}", id),
                description,
            ),
            CoreEvent::StoppedStep { id, description } => {
                with_description(format!("stopped step {}", id), description)
            }
            CoreEvent::BeginningDispensablePart { name, description } => with_description(
                format!("beginning dispensible part \"{}\"", name),
                description,
            ),
            CoreEvent::EndingDispensablePart { name, description } => with_description(
                format!("ending dispensible part \"{}\"", name),
                description,
            ),
            CoreEvent::SkippingDispensablePart { name, description } => with_description(
                format!("skipping dispensible part \"{}\"", name),
                description,
            ),
            CoreEvent::BeginningOptionalPart { name, description } => with_description(
                format!("beginning optional part \"{}\"", name),
                description,
            ),
            CoreEvent::EndingOptionalPart { name, description } => with_description(
                format!("ending optional part \"{}\"", name),
                description,
            ),
            CoreEvent::SkippingOptionalPart { name, description } => with_description(
                format!("skipping optional part \"{}\"", name),
                description,
            ),
            CoreEvent::BeginningDescribedPart { description } => {
                format!("beginning \"{}\"", description)
            }
            CoreEvent::EndingDescribedPart { description } => format!("ending \"{}\"", description),
            CoreEvent::BeginningForcingSteps => "beginning forcing steps".to_string(),
            CoreEvent::EndingForcingSteps => "ending forcing steps".to_string(),
            CoreEvent::Message { message } => message.clone(),
        };
        f.write_str(&text)
    }
}

/// Which parts of an event to render. Only affects presentation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionInfoFormat {
    pub with_time: bool,
    pub add_metadata_info: bool,
    pub add_indentation: bool,
    pub add_type: bool,
    pub add_execution_path: bool,
    pub add_structural_id: bool,
}

impl ExecutionInfoFormat {
    /// Time, metadata, indentation, severity and path; no structural id.
    pub const fn full() -> Self {
        Self {
            with_time: true,
            add_metadata_info: true,
            add_indentation: true,
            add_type: true,
            add_execution_path: true,
            add_structural_id: false,
        }
    }

    /// Indentation only.
    pub const fn bare_indented() -> Self {
        Self {
            with_time: false,
            add_metadata_info: false,
            add_indentation: true,
            add_type: false,
            add_execution_path: false,
            add_structural_id: false,
        }
    }
}

/// One immutable trace element.
#[derive(Serialize, Debug, Clone)]
pub struct ExecutionEvent {
    /// Effective severity, after appeasement.
    pub severity: InfoType,
    /// Severity before appeasement, present only if it was clamped.
    pub original_severity: Option<InfoType>,
    pub time: DateTime<Utc>,
    /// Nesting depth at emission.
    pub level: usize,
    /// Correlates a scope's begin event with its end or stop event.
    /// Absent for leaves (messages and skips).
    pub structural_id: Option<Uuid>,
    pub core_event: CoreEvent,
    pub effectuation_stack: Vec<Effectuation>,
}

impl ExecutionEvent {
    pub(crate) fn new(
        severity: InfoType,
        level: usize,
        structural_id: Option<Uuid>,
        core_event: CoreEvent,
        effectuation_stack: Vec<Effectuation>,
    ) -> Self {
        Self {
            severity,
            original_severity: None,
            time: Utc::now(),
            level,
            structural_id,
            core_event,
            effectuation_stack,
        }
    }

    pub(crate) fn with_original_severity(mut self, original: Option<InfoType>) -> Self {
        self.original_severity = original;
        self
    }

    pub fn is_message(&self) -> bool {
        matches!(self.core_event, CoreEvent::Message { .. })
    }

    /// Renders the event with [`ExecutionInfoFormat::full`].
    pub fn default_description(&self, metadata_info: Option<&str>) -> String {
        self.description(&ExecutionInfoFormat::full(), metadata_info)
    }

    /// Renders the event, parts separated by single spaces.
    pub fn description(&self, format: &ExecutionInfoFormat, metadata_info: Option<&str>) -> String {
        let mut parts: Vec<String> = Vec::new();

        if format.with_time {
            parts.push(format!("{}:", self.time.format("%Y-%m-%d %H:%M:%S %z")));
        }
        if format.add_metadata_info {
            if let Some(metadata_info) = metadata_info {
                parts.push(format!("{}:", metadata_info));
            }
        }
        if format.add_indentation && self.level > 0 {
            // joined with one more space below, so each level indents by four
            parts.push(" ".repeat(self.level * 4 - 1));
        }
        if format.add_type {
            parts.push(format!("{{{}}}", self.severity));
        }
        parts.push(self.core_event.to_string());
        if format.add_execution_path && !self.effectuation_stack.is_empty() {
            let path = if self.is_message() {
                full_execution_path(&self.effectuation_stack)
            } else {
                execution_path_for_effectuation(&self.effectuation_stack)
            };
            parts.push(format!("[@@ {}]", path));
        }
        if format.add_structural_id {
            let id = self
                .structural_id
                .map(|id| id.to_string())
                .unwrap_or_default();
            parts.push(format!("<{}>", id));
        }

        parts.join(" ")
    }

    /// Serializes the event as a single JSON line.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOAD: StepId = StepId::new("pipeline/load.rs", "load(path)");

    fn step_frame(description: Option<&str>) -> Effectuation {
        Effectuation::Step {
            step: LOAD,
            description: description.map(str::to_string),
        }
    }

    #[test]
    fn test_step_id_display_uses_first_segment() {
        assert_eq!(LOAD.to_string(), "load(path)@pipeline");
        let nested = StepId::owned("mycrate::steps::io", "save()");
        assert_eq!(nested.to_string(), "save()@mycrate");
    }

    #[test]
    fn test_step_id_equality_needs_both_parts() {
        assert_eq!(LOAD, StepId::owned("pipeline/load.rs", "load(path)"));
        assert_ne!(LOAD, StepId::new("pipeline/other.rs", "load(path)"));
        assert_ne!(LOAD, StepId::new("pipeline/load.rs", "load()"));
    }

    #[test]
    fn test_step_id_macro_uses_module_path() {
        const HERE: StepId = crate::step_id!("here()");
        assert_eq!(HERE.designation(), module_path!());
        assert_eq!(HERE.to_string(), "here()@stepwise");
    }

    #[test]
    fn test_effectuation_rendering() {
        assert_eq!(step_frame(Some("reading")).short(), "step load(path)@pipeline");
        assert_eq!(
            step_frame(Some("reading")).to_string(),
            "step load(path)@pipeline (reading)"
        );
        let part = Effectuation::DispensablePart {
            name: "cleanup".to_string(),
            description: None,
        };
        assert_eq!(part.to_string(), "dispensable part \"cleanup\"");
        let described = Effectuation::DescribedPart {
            description: "copying".to_string(),
        };
        assert_eq!(described.short(), "doing \"copying\"");
        assert_eq!(Effectuation::Forcing.short(), "forcing");
    }

    #[test]
    fn test_execution_paths() {
        let stack = vec![step_frame(Some("reading")), Effectuation::Forcing];
        assert_eq!(execution_path(&stack), "step load(path)@pipeline -> forcing");
        assert_eq!(
            full_execution_path(&stack),
            "step load(path)@pipeline (reading) -> forcing"
        );
        assert_eq!(
            execution_path_for_effectuation(&stack),
            "step load(path)@pipeline -> forcing -> "
        );
        assert_eq!(execution_path(&[]), "");
    }

    #[test]
    fn test_core_event_texts() {
        let begin = CoreEvent::BeginningStep {
            id: LOAD,
            description: Some("reading".to_string()),
            forced: true,
        };
        assert_eq!(
            begin.to_string(),
            "beginning forced step load(path)@pipeline (reading)"
        );
        let skip = CoreEvent::SkippingStepInStoppedExecution {
            id: LOAD,
            description: None,
        };
        assert_eq!(
            skip.to_string(),
            "skipping in an stopped environment step load(path)@pipeline"
        );
        assert!(begin.is_beginning());
        assert!(!skip.is_beginning() && !skip.is_closing());
        assert!(CoreEvent::StoppedStep { id: LOAD, description: None }.is_closing());
    }

    #[test]
    fn test_description_formatting() {
        let event = ExecutionEvent::new(
            InfoType::Progress,
            2,
            None,
            CoreEvent::BeginningForcingSteps,
            vec![step_frame(None), step_frame(None)],
        );
        let format = ExecutionInfoFormat {
            add_indentation: true,
            add_type: true,
            add_execution_path: true,
            add_structural_id: true,
            ..Default::default()
        };
        assert_eq!(
            event.description(&format, None),
            "        {progress} beginning forcing steps \
             [@@ step load(path)@pipeline -> step load(path)@pipeline -> ] <>"
        );
    }

    #[test]
    fn test_message_path_includes_descriptions() {
        let event = ExecutionEvent::new(
            InfoType::Info,
            1,
            None,
            CoreEvent::Message { message: "hello".to_string() },
            vec![step_frame(Some("reading"))],
        );
        let format = ExecutionInfoFormat {
            add_execution_path: true,
            ..Default::default()
        };
        assert_eq!(
            event.description(&format, None),
            "hello [@@ step load(path)@pipeline (reading)]"
        );
    }

    #[test]
    fn test_metadata_prefix_and_json() {
        let event = ExecutionEvent::new(
            InfoType::Warning,
            0,
            None,
            CoreEvent::Message { message: "careful".to_string() },
            Vec::new(),
        )
        .with_original_severity(Some(InfoType::Fatal));
        let format = ExecutionInfoFormat {
            add_metadata_info: true,
            add_type: true,
            ..Default::default()
        };
        assert_eq!(
            event.description(&format, Some("app: item1")),
            "app: item1: {warning} careful"
        );

        let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["original_severity"], "fatal");
        assert_eq!(json["core_event"]["event"], "message");
    }
}
