use facelens::core::{History, Operation, OperationField, OperationState};

#[test]
fn test_undo_after_two_flips() {
    let mut history = History::new();
    history.add(Operation::FlipHorizontal(true));
    history.add(Operation::FlipVertical(true));
    assert!(history.undo());

    assert!(history.current().flip_horizontal);
    assert!(!history.current().flip_vertical);
    assert!(history.can_redo());
    assert_eq!(history.last_changed_field(), Some(OperationField::FlipVertical));
}

#[test]
fn test_boundaries_are_no_ops() {
    let mut history = History::new();
    assert!(!history.undo());
    assert_eq!(history.current(), &OperationState::default());
    assert_eq!(history.cursor(), 0);

    history.add(Operation::DetectEdges(true));
    assert!(!history.redo());
    assert_eq!(history.cursor(), 1);
    assert!(history.current().detect_edges);
}

#[test]
fn test_add_prunes_redo_branch() {
    let mut history = History::new();
    history.add(Operation::BinaryThreshold(100));
    history.add(Operation::HistogramEqualization(true));
    history.add(Operation::FlipVertical(true));
    history.undo();
    history.undo();
    assert_eq!(history.len(), 4);

    history.add(Operation::ZeroThreshold(40));
    assert!(!history.can_redo());
    assert_eq!(history.len(), 3);

    let current = history.current();
    assert_eq!(current.binary_threshold, 100);
    assert_eq!(current.zero_threshold, 40);
    assert!(!current.histogram_equalization);
}

#[test]
fn test_redo_description() {
    let mut history = History::new();
    history.add(Operation::AdaptiveThreshold(7));
    history.undo();
    assert_eq!(
        history.last_changed_field_description().as_deref(),
        Some("Undo: Adaptive thresholding: off")
    );
    history.redo();
    assert_eq!(
        history.last_changed_field_description().as_deref(),
        Some("Redo: Adaptive thresholding: 7")
    );
}

#[test]
fn test_reset_returns_to_single_default_state() {
    let mut history = History::new();
    history.add(Operation::ShowFeatures(true));
    history.add(Operation::ShowConfidence(true));
    history.reset();

    assert_eq!(history.len(), 1);
    assert!(!history.can_undo());
    assert!(!history.can_redo());
    assert_eq!(history.current(), &OperationState::default());
}
