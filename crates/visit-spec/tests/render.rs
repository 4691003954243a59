use chrono::NaiveDate;

use visit_spec::{
    ConfigDocument, ConfigField, ExprEngine, FactSet, RenderItem, StaticLabels, Treatment,
    VisitRecord, VisitRenderer, render_json, render_text,
};

fn fixture(name: &str) -> &'static str {
    match name {
        "visit_row" => include_str!("fixtures/visit_row.yml"),
        _ => panic!("unknown fixture {}", name),
    }
}

fn renderer() -> VisitRenderer {
    VisitRenderer::new(ExprEngine, StaticLabels::english())
}

fn malaria_visit() -> VisitRecord {
    let mut record = VisitRecord {
        visit_date: NaiveDate::from_ymd_opt(2019, 12, 5).and_then(|date| date.and_hms_opt(9, 0, 0)),
        diagnosis: Some("Fever".into()),
        diagnosis_type: Some("Confirmed".into()),
        ..VisitRecord::default()
    };
    record.add_disease("Malaria");
    record.add_disease("Typhoid");
    record.add_treatment(
        "t1",
        Treatment::new("Paracetamol")
            .with_dosage("500mg")
            .with_duration("3 days"),
    );
    record
}

fn field_keys(items: &[RenderItem]) -> Vec<&str> {
    items
        .iter()
        .filter_map(|item| match item {
            RenderItem::Field { field, .. } => Some(field.key.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn group_header_survives_irrelevant_fields() {
    let document = ConfigDocument::parse_str(
        "group: Vitals\nfields:\n  - key: bp\n    relevance: \"age > 18\"\n",
    )
    .expect("parse");
    let renderer = renderer();

    let minor = [("age", "15")].into_iter().collect::<FactSet>();
    let items = renderer
        .assemble_record(&document, 0, minor)
        .into_iter()
        .map(|row| row.item)
        .collect::<Vec<_>>();
    assert_eq!(items, vec![RenderItem::GroupHeader("Vitals".into())]);

    let adult = [("age", "40")].into_iter().collect::<FactSet>();
    let items = renderer
        .assemble_record(&document, 0, adult)
        .into_iter()
        .map(|row| row.item)
        .collect::<Vec<_>>();
    assert_eq!(field_keys(&items), vec!["bp"]);
}

#[test]
fn group_with_sub_group_emits_both_headers_in_order() {
    let document = ConfigDocument::parse_str(
        "group: Vitals\nsub_group: Pressure\nfields:\n  - key: bp\n",
    )
    .expect("parse");
    let items = renderer()
        .assemble(&document, &[VisitRecord::default()])
        .into_iter()
        .map(|row| row.item)
        .collect::<Vec<_>>();
    assert_eq!(
        items,
        vec![
            RenderItem::GroupHeader("Vitals".into()),
            RenderItem::SubGroupHeader("Pressure".into()),
            RenderItem::Field {
                field: ConfigField::new("bp"),
                highlighted: false,
            },
        ]
    );
}

#[test]
fn record_facts_without_referenced_fact_hide_field() {
    let document = ConfigDocument::parse_str(
        "group: Vitals\nfields:\n  - key: bp\n    relevance: \"age > 18\"\n  - key: diagnosis\n",
    )
    .expect("parse");
    let rows = renderer().assemble(&document, &[malaria_visit()]);
    let items = rows.into_iter().map(|row| row.item).collect::<Vec<_>>();
    assert_eq!(field_keys(&items), vec!["diagnosis"]);
}

#[test]
fn assembles_fixture_in_document_order() {
    let document = ConfigDocument::parse_str(fixture("visit_row")).expect("parse");
    let rows = renderer().assemble(&document, &[malaria_visit()]);
    let items = rows.iter().map(|row| row.item.clone()).collect::<Vec<_>>();

    assert_eq!(items[0], RenderItem::GroupHeader("visit_date".into()));
    assert_eq!(
        field_keys(&items),
        vec!["visit_date", "diagnosis", "diagnosis_type", "disease_code", "treatment"]
    );
    assert!(items.contains(&RenderItem::SubGroupHeader("tests".into())));
    assert!(matches!(
        items.last(),
        Some(RenderItem::Field {
            highlighted: true,
            ..
        })
    ));
}

#[test]
fn each_record_gets_its_own_facts() {
    let document = ConfigDocument::parse_str(fixture("visit_row")).expect("parse");
    let mut second = VisitRecord {
        test_name: Some("Malaria RDT".into()),
        test_result: Some("Negative".into()),
        ..VisitRecord::default()
    };
    second.add_disease("Cholera");
    let rows = renderer().assemble(&document, &[malaria_visit(), second]);

    let first_facts = &rows.iter().find(|row| row.record == 0).expect("first").facts;
    let second_facts = &rows.iter().find(|row| row.record == 1).expect("second").facts;
    assert_eq!(first_facts.get("disease_code"), Some("Malaria\nTyphoid"));
    assert_eq!(second_facts.get("disease_code"), Some("Cholera"));
    assert!(!second_facts.contains("diagnosis"));
    assert!(rows.iter().all(|row| row.record < 2));
}

#[test]
fn formats_fields_with_templates() {
    let document = ConfigDocument::parse_str(fixture("visit_row")).expect("parse");
    let renderer = renderer();
    let rows = renderer.assemble(&document, &[malaria_visit()]);
    let texts = rows
        .iter()
        .filter_map(|row| renderer.format_row(row))
        .collect::<Vec<_>>();

    assert!(texts.contains(&"5 Dec 2019".to_string()));
    assert!(texts.contains(&"Treatment: Paracetamol (500mg. 3 days)".to_string()));
    assert!(texts.contains(&"Disease code: Malaria\nTyphoid".to_string()));
}

#[test]
fn field_without_template_shows_fact() {
    let document = ConfigDocument {
        entries: vec![visit_spec::ConfigEntry::Fields(vec![ConfigField::new("diagnosis")])],
    };
    let renderer = renderer();
    let rows = renderer.assemble(&document, &[malaria_visit()]);
    assert_eq!(renderer.format_row(&rows[0]).as_deref(), Some("Fever"));
}

#[test]
fn text_and_json_outputs() {
    let document = ConfigDocument::parse_str(fixture("visit_row")).expect("parse");
    let renderer = renderer();
    let rows = renderer.assemble(&document, &[malaria_visit(), VisitRecord::default()]);

    let text = render_text(&renderer, &rows);
    assert!(text.starts_with("# visit_date"));
    assert!(text.contains("!  Treatment: Paracetamol (500mg. 3 days)"));
    assert!(text.contains("\n\n# visit_date"));

    let json = render_json(&renderer, &rows);
    let visits = json["visits"].as_array().expect("visits");
    assert_eq!(visits.len(), 2);
    assert_eq!(visits[0]["items"][0]["kind"], "group");
    assert!(
        visits[0]["items"]
            .as_array()
            .expect("items")
            .iter()
            .any(|item| item["key"] == "treatment" && item["highlighted"] == true)
    );
}
