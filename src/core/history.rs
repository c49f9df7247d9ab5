use std::fmt;

/// Every toggle and slider value that affects how a frame is rendered.
///
/// Threshold levels use `0` for "off". At most one threshold mode is meant
/// to be active; the controls enforce that, the state stores what it is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperationState {
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    pub show_features: bool,
    pub show_confidence: bool,
    pub histogram_equalization: bool,
    pub binary_threshold: u8,
    pub zero_threshold: u8,
    pub adaptive_threshold: u8,
    pub detect_edges: bool,
}

/// Names one field of [`OperationState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationField {
    FlipHorizontal,
    FlipVertical,
    ShowFeatures,
    ShowConfidence,
    HistogramEqualization,
    BinaryThreshold,
    ZeroThreshold,
    AdaptiveThreshold,
    DetectEdges,
}

impl OperationField {
    pub const ALL: [OperationField; 9] = [
        OperationField::FlipHorizontal,
        OperationField::FlipVertical,
        OperationField::ShowFeatures,
        OperationField::ShowConfidence,
        OperationField::HistogramEqualization,
        OperationField::BinaryThreshold,
        OperationField::ZeroThreshold,
        OperationField::AdaptiveThreshold,
        OperationField::DetectEdges,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            OperationField::FlipHorizontal => "Flip horizontally",
            OperationField::FlipVertical => "Flip vertically",
            OperationField::ShowFeatures => "Detect eyes and smiles",
            OperationField::ShowConfidence => "Show confidences",
            OperationField::HistogramEqualization => "Histogram equalization",
            OperationField::BinaryThreshold => "Binary thresholding",
            OperationField::ZeroThreshold => "Thresholding to zero",
            OperationField::AdaptiveThreshold => "Adaptive thresholding",
            OperationField::DetectEdges => "Detect edges",
        }
    }
}

impl fmt::Display for OperationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single field change, carrying the new value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    FlipHorizontal(bool),
    FlipVertical(bool),
    ShowFeatures(bool),
    ShowConfidence(bool),
    HistogramEqualization(bool),
    BinaryThreshold(u8),
    ZeroThreshold(u8),
    AdaptiveThreshold(u8),
    DetectEdges(bool),
}

impl Operation {
    pub fn field(&self) -> OperationField {
        match self {
            Operation::FlipHorizontal(_) => OperationField::FlipHorizontal,
            Operation::FlipVertical(_) => OperationField::FlipVertical,
            Operation::ShowFeatures(_) => OperationField::ShowFeatures,
            Operation::ShowConfidence(_) => OperationField::ShowConfidence,
            Operation::HistogramEqualization(_) => OperationField::HistogramEqualization,
            Operation::BinaryThreshold(_) => OperationField::BinaryThreshold,
            Operation::ZeroThreshold(_) => OperationField::ZeroThreshold,
            Operation::AdaptiveThreshold(_) => OperationField::AdaptiveThreshold,
            Operation::DetectEdges(_) => OperationField::DetectEdges,
        }
    }
}

impl OperationState {
    /// Copy of `self` with one field replaced
    pub fn with(&self, op: Operation) -> Self {
        let mut next = *self;
        match op {
            Operation::FlipHorizontal(v) => next.flip_horizontal = v,
            Operation::FlipVertical(v) => next.flip_vertical = v,
            Operation::ShowFeatures(v) => next.show_features = v,
            Operation::ShowConfidence(v) => next.show_confidence = v,
            Operation::HistogramEqualization(v) => next.histogram_equalization = v,
            Operation::BinaryThreshold(v) => next.binary_threshold = v,
            Operation::ZeroThreshold(v) => next.zero_threshold = v,
            Operation::AdaptiveThreshold(v) => next.adaptive_threshold = v,
            Operation::DetectEdges(v) => next.detect_edges = v,
        }
        next
    }

    /// True when some operation has to run on a single-channel frame
    pub fn needs_grayscale(&self) -> bool {
        self.binary_threshold > 0 || self.histogram_equalization || self.adaptive_threshold > 0
    }

    pub fn active_threshold_modes(&self) -> usize {
        [self.binary_threshold, self.zero_threshold, self.adaptive_threshold]
            .iter()
            .filter(|level| **level > 0)
            .count()
    }

    /// More than one threshold mode active at once.
    ///
    /// History never rejects such a state; callers that want strict
    /// controls can check this before calling [`History::add`].
    pub fn has_threshold_conflict(&self) -> bool {
        self.active_threshold_modes() > 1
    }

    /// Fields whose values differ between `self` and `other`, in declaration order
    pub fn changed_fields(&self, other: &OperationState) -> Vec<OperationField> {
        OperationField::ALL
            .into_iter()
            .filter(|field| self.describe_value(*field) != other.describe_value(*field))
            .collect()
    }

    /// Human readable value of one field, e.g. `on`, `off`, `120`
    pub fn describe_value(&self, field: OperationField) -> String {
        let flag = |v: bool| if v { "on".to_string() } else { "off".to_string() };
        let level = |v: u8| if v == 0 { "off".to_string() } else { v.to_string() };
        match field {
            OperationField::FlipHorizontal => flag(self.flip_horizontal),
            OperationField::FlipVertical => flag(self.flip_vertical),
            OperationField::ShowFeatures => flag(self.show_features),
            OperationField::ShowConfidence => flag(self.show_confidence),
            OperationField::HistogramEqualization => flag(self.histogram_equalization),
            OperationField::BinaryThreshold => level(self.binary_threshold),
            OperationField::ZeroThreshold => level(self.zero_threshold),
            OperationField::AdaptiveThreshold => level(self.adaptive_threshold),
            OperationField::DetectEdges => flag(self.detect_edges),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryMove {
    Add,
    Undo,
    Redo,
}

/// Linear undo/redo history of operation states.
///
/// Always holds at least one state; `cursor` stays in `0..states.len()`.
#[derive(Debug, Clone)]
pub struct History {
    states: Vec<OperationState>,
    cursor: usize,
    last_move: Option<HistoryMove>,
}

impl History {
    pub fn new() -> Self {
        Self::starting_from(OperationState::default())
    }

    /// History whose first state is `initial` instead of the default
    pub fn starting_from(initial: OperationState) -> Self {
        Self {
            states: vec![initial],
            cursor: 0,
            last_move: None,
        }
    }

    pub fn current(&self) -> &OperationState {
        &self.states[self.cursor]
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.states.len()
    }

    /// Append `current` with one field changed, dropping any redo branch
    pub fn add(&mut self, op: Operation) -> &OperationState {
        let next = self.current().with(op);
        self.states.truncate(self.cursor + 1);
        self.states.push(next);
        self.cursor = self.states.len() - 1;
        self.last_move = Some(HistoryMove::Add);
        self.current()
    }

    /// Step back; returns false (and changes nothing) at the first state
    pub fn undo(&mut self) -> bool {
        if !self.can_undo() {
            return false;
        }
        self.cursor -= 1;
        self.last_move = Some(HistoryMove::Undo);
        true
    }

    /// Step forward; returns false (and changes nothing) at the last state
    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.cursor += 1;
        self.last_move = Some(HistoryMove::Redo);
        true
    }

    pub fn reset(&mut self) {
        self.states = vec![OperationState::default()];
        self.cursor = 0;
        self.last_move = None;
    }

    /// Field touched by the most recent add, undo or redo
    pub fn last_changed_field(&self) -> Option<OperationField> {
        let (a, b) = self.last_pair()?;
        a.changed_fields(b).into_iter().next()
    }

    /// Status line for the most recent move, e.g. `Undo: Flip vertically: off`
    pub fn last_changed_field_description(&self) -> Option<String> {
        let field = self.last_changed_field()?;
        let prefix = match self.last_move? {
            HistoryMove::Add => "Applied",
            HistoryMove::Undo => "Undo",
            HistoryMove::Redo => "Redo",
        };
        Some(format!(
            "{}: {}: {}",
            prefix,
            field,
            self.current().describe_value(field)
        ))
    }

    /// Current state paired with the state the last move came from
    fn last_pair(&self) -> Option<(&OperationState, &OperationState)> {
        let current = self.current();
        match self.last_move? {
            HistoryMove::Add | HistoryMove::Redo => {
                self.states.get(self.cursor.checked_sub(1)?).map(|prev| (current, prev))
            }
            HistoryMove::Undo => self.states.get(self.cursor + 1).map(|next| (current, next)),
        }
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
