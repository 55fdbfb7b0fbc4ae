use stage_export::Document;
use std::fs;

#[test]
fn test_computed_style_golden() {
    let data =
        fs::read_to_string("tests/computed_style_golden.json").expect("Failed to read fixtures");
    let fixtures: serde_json::Value = serde_json::from_str(&data).expect("Invalid JSON");
    for f in fixtures.as_array().unwrap() {
        let html = f.get("html").unwrap().as_str().unwrap();
        let id = f.get("id").unwrap().as_str().unwrap();
        let property = f.get("property").unwrap().as_str().unwrap();
        let expected = f.get("expected").unwrap().as_str().unwrap();

        let doc = Document::parse_html(html, None).expect("Failed to parse fixture");
        let node = doc
            .get_element_by_id(id)
            .unwrap_or_else(|| panic!("fixture has no #{id}: {html}"));
        let val = doc.computed_style(node).get_property_value(property);
        assert_eq!(
            val.trim().to_lowercase(),
            expected.to_lowercase(),
            "Mismatch for #{} property {} in {}",
            id,
            property,
            html
        );
    }
}
