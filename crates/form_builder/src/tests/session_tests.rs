use super::*;
use crate::canvas::{DropIndicator, FieldPatch};
use shared::domain::FieldType;

fn insert(session: &mut EditorSession, field_type: FieldType) -> crate::canvas::CanvasId {
    match session.apply(Gesture::Insert {
        entry: field_type.into(),
        drop: DropIndicator::End,
    }) {
        Outcome::Inserted(id) => id,
        other => panic!("expected insert, got {other:?}"),
    }
}

#[test]
fn undo_reverts_one_gesture_at_a_time() {
    let mut session = EditorSession::new("contact", "Contact");
    let name = insert(&mut session, FieldType::TextField);
    session.apply(Gesture::Update {
        id: name,
        patch: FieldPatch::label("Name"),
    });
    insert(&mut session, FieldType::NumberField);
    assert_eq!(session.canvas().len(), 2);

    assert!(session.undo());
    assert_eq!(session.canvas().len(), 1);
    assert!(session.undo());
    assert_eq!(session.canvas().fields()[0].label, "Text Field");
    assert!(session.undo());
    assert!(session.canvas().is_empty());
    assert!(!session.undo());
}

#[test]
fn no_op_and_selection_gestures_are_not_recorded() {
    let mut session = EditorSession::new("contact", "Contact");
    let id = insert(&mut session, FieldType::TextField);
    session.apply(Gesture::Select(Some(id)));
    session.apply(Gesture::Reorder {
        active: id,
        over: id,
    });

    assert!(session.undo());
    assert!(!session.can_undo());
}

#[test]
fn history_is_bounded() {
    let mut session = EditorSession::new("contact", "Contact").with_undo_depth(2);
    for _ in 0..5 {
        insert(&mut session, FieldType::Checkbox);
    }
    assert!(session.undo());
    assert!(session.undo());
    assert!(!session.undo());
    assert_eq!(session.canvas().len(), 3);
}

#[test]
fn builds_create_request_in_canvas_order() {
    let mut session = EditorSession::new("contact", "Contact");
    session.description = Some("Get in touch".into());
    let name = insert(&mut session, FieldType::TextField);
    let age = insert(&mut session, FieldType::NumberField);
    session.apply(Gesture::Update {
        id: name,
        patch: FieldPatch {
            label: Some("Name".into()),
            is_required: Some(true),
            ..FieldPatch::default()
        },
    });
    session.apply(Gesture::Update {
        id: age,
        patch: FieldPatch::label("Age"),
    });

    let request = session.build_request().expect("valid");
    assert_eq!(request.name, "contact");
    assert_eq!(request.description.as_deref(), Some("Get in touch"));
    let fields: Vec<(Option<&str>, i32, bool)> = request
        .fields
        .iter()
        .map(|f| (f.name.as_deref(), f.sort_order, f.is_required))
        .collect();
    assert_eq!(
        fields,
        vec![(Some("name"), 0, true), (Some("age"), 1, false)]
    );
}

#[test]
fn invalid_form_name_fails_locally() {
    let session = EditorSession::new("contact form", "Contact");
    assert!(matches!(
        session.build_request(),
        Err(ValidationError::InvalidFormName { .. })
    ));
}
