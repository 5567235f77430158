use super::*;
use serde_json::json;

fn contact_fields() -> Vec<FieldDraft> {
    vec![
        FieldDraft::new(FieldType::TextField, "Name").required(true),
        FieldDraft::new(FieldType::NumberField, "Age"),
    ]
}

#[test]
fn compiles_contact_form() {
    let schema = compile(&contact_fields(), "contact", "Contact", None).expect("compile");
    assert_eq!(schema.user_data_table_name, "UserData_contact");
    assert_eq!(schema.fields.len(), 2);
    assert_eq!(schema.fields[0].name, "name");
    assert_eq!(schema.fields[0].field_type, FieldType::TextField);
    assert!(schema.fields[0].is_required);
    assert_eq!(schema.fields[1].name, "age");
    assert_eq!(schema.fields[1].field_type, FieldType::NumberField);
    assert!(!schema.fields[1].is_required);
    let orders: Vec<i32> = schema.fields.iter().map(|f| f.sort_order).collect();
    assert_eq!(orders, vec![0, 1]);
}

#[test]
fn empty_form_is_valid() {
    let schema = compile(&[], "empty_form", "Empty", Some("  ")).expect("compile");
    assert!(schema.fields.is_empty());
    assert_eq!(schema.description, None);
}

#[test]
fn compiling_twice_yields_same_layout() {
    let drafts = vec![
        FieldDraft::new(FieldType::TextField, "Full name"),
        FieldDraft::new(FieldType::TextField, "Full name"),
        FieldDraft::new(FieldType::DatePicker, "Birthday"),
    ];
    let first = compile(&drafts, "people", "People", None).expect("first");
    let second = compile(&drafts, "people", "People", None).expect("second");

    let layout = |schema: &FormSchema| {
        schema
            .fields
            .iter()
            .map(|f| (f.sort_order, f.name.clone(), f.field_type))
            .collect::<Vec<_>>()
    };
    assert_eq!(layout(&first), layout(&second));
    assert_ne!(first.id, second.id);
}

#[test]
fn derived_names_are_suffixed_on_collision() {
    let drafts = vec![
        FieldDraft::new(FieldType::TextField, "Email"),
        FieldDraft::new(FieldType::TextField, "email"),
        FieldDraft::new(FieldType::TextField, "E-mail!"),
        FieldDraft::new(FieldType::TextField, "Email").named("email_2"),
    ];
    let schema = compile(&drafts, "signup", "Sign up", None).expect("compile");
    let names: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["email", "email_3", "e_mail", "email_2"]);
}

#[test]
fn labels_without_ascii_fall_back_to_type_slug() {
    let drafts = vec![
        FieldDraft::new(FieldType::TextField, "文字欄位"),
        FieldDraft::new(FieldType::NumberField, "2024 total"),
        FieldDraft::new(FieldType::TextField, "Id"),
    ];
    let schema = compile(&drafts, "misc", "Misc", None).expect("compile");
    let names: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["textfield", "numberfield_2024_total", "id_2"]);
}

#[test]
fn rejects_duplicate_explicit_names() {
    let drafts = vec![
        FieldDraft::new(FieldType::TextField, "A").named("city"),
        FieldDraft::new(FieldType::TextField, "B").named("City"),
    ];
    let err = compile(&drafts, "address", "Address", None).expect_err("duplicate");
    assert_eq!(
        err,
        ValidationError::DuplicateFieldName {
            name: "City".to_string()
        }
    );
}

#[test]
fn rejects_reserved_explicit_name() {
    let drafts = vec![FieldDraft::new(FieldType::TextField, "When").named("submitted_at")];
    let err = compile(&drafts, "audit", "Audit", None).expect_err("reserved");
    assert!(matches!(err, ValidationError::ReservedFieldName { .. }));
}

#[test]
fn rejects_bad_form_names() {
    for bad in ["", "1contact", "contact-form", "contact form", "UserData;DROP"] {
        let err = compile(&[], bad, "Contact", None).expect_err("invalid name");
        assert!(matches!(err, ValidationError::InvalidFormName { .. }), "{bad}");
    }
    let too_long = "a".repeat(MAX_IDENTIFIER_LEN + 1);
    assert!(compile(&[], &too_long, "Contact", None).is_err());
    assert!(compile(&[], "_contact_2", "Contact", None).is_ok());
}

#[test]
fn rejects_blank_display_name_and_label() {
    assert_eq!(
        compile(&[], "contact", "   ", None).expect_err("display"),
        ValidationError::EmptyDisplayName
    );
    let drafts = vec![
        FieldDraft::new(FieldType::TextField, "Name"),
        FieldDraft::new(FieldType::TextField, " "),
    ];
    assert_eq!(
        compile(&drafts, "contact", "Contact", None).expect_err("label"),
        ValidationError::EmptyLabel { index: 1 }
    );
}

#[test]
fn dropdown_requires_options() {
    let missing = vec![FieldDraft::new(FieldType::Dropdown, "Color")];
    assert!(matches!(
        compile(&missing, "prefs", "Prefs", None),
        Err(ValidationError::InvalidConfiguration { .. })
    ));

    let ok = vec![FieldDraft::new(FieldType::Dropdown, "Color")
        .with_configuration(json!({ "options": ["red", "green"] }))];
    let schema = compile(&ok, "prefs", "Prefs", None).expect("compile");
    assert_eq!(schema.fields[0].options(), vec!["red", "green"]);
}
