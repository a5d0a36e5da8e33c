use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Joins a parent path and a child key.
pub const KEY_SEPARATOR: &str = "_";
/// Joins the elements of a list of scalars into one cell.
pub const LIST_DELIMITER: &str = ", ";
/// Subtrees nested deeper than this are stored as compact JSON text.
pub const MAX_DEPTH: usize = 64;

/// One listing reduced to single-level string columns, in the order the
/// fields appeared in the source record.
pub type FlatListing = IndexMap<String, String>;

/// Flattens a nested record into `path -> value` pairs.
///
/// Nested objects contribute `parent_child` keys, lists of records contribute
/// `parent_<index>_child` keys and lists of scalars are joined into a single
/// cell. Empty lists and empty objects keep their column with an empty value.
pub fn flatten_record(record: &Map<String, Value>) -> FlatListing {
    let mut flat = FlatListing::new();
    for (key, value) in flatten_object(record, "", 0) {
        insert_unique(&mut flat, key, value);
    }
    flat
}

fn flatten_object(object: &Map<String, Value>, prefix: &str, depth: usize) -> Vec<(String, String)> {
    object
        .iter()
        .flat_map(|(key, value)| flatten_value(&join_key(prefix, key), value, depth))
        .collect()
}

fn flatten_value(path: &str, value: &Value, depth: usize) -> Vec<(String, String)> {
    if depth >= MAX_DEPTH && (value.is_object() || value.is_array()) {
        return vec![(path.to_string(), value.to_string())];
    }

    match value {
        Value::Object(object) if object.is_empty() => vec![(path.to_string(), String::new())],
        Value::Object(object) => flatten_object(object, path, depth + 1),
        Value::Array(items) if items.iter().any(|v| v.is_object() || v.is_array()) => items
            .iter()
            .enumerate()
            .flat_map(|(index, item)| flatten_value(&join_key(path, &index.to_string()), item, depth + 1))
            .collect(),
        Value::Array(items) => {
            let joined = items.iter().map(scalar_to_string).collect::<Vec<_>>().join(LIST_DELIMITER);
            vec![(path.to_string(), joined)]
        }
        scalar => vec![(path.to_string(), scalar_to_string(scalar))],
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}{}{}", prefix, KEY_SEPARATOR, key)
    }
}

/// Renders a scalar without JSON quoting; `null` becomes an empty cell.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

// Two different paths can render to the same key when a field name already
// contains the separator; the later one gets a `~n` suffix.
fn insert_unique(flat: &mut FlatListing, key: String, value: String) {
    if !flat.contains_key(&key) {
        flat.insert(key, value);
        return;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}~{}", key, n);
        if !flat.contains_key(&candidate) {
            flat.insert(candidate, value);
            return;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flatten(value: Value) -> FlatListing {
        match value {
            Value::Object(map) => flatten_record(&map),
            _ => panic!("test input must be an object"),
        }
    }

    #[test]
    fn scalar_fields_map_one_to_one() {
        let flat = flatten(json!({
            "vin": "1HGCM82633A004352",
            "year": 2019,
            "mileage": 41234.5,
            "certified": false,
        }));

        assert_eq!(flat.len(), 4);
        assert_eq!(flat["vin"], "1HGCM82633A004352");
        assert_eq!(flat["year"], "2019");
        assert_eq!(flat["mileage"], "41234.5");
        assert_eq!(flat["certified"], "false");
    }

    #[test]
    fn nested_records_are_prefixed() {
        let flat = flatten(json!({
            "pricingDetail": { "salePrice": 18995, "msrp": null },
            "specifications": { "color": { "label": "Color", "value": "Blue" } },
        }));

        assert_eq!(flat["pricingDetail_salePrice"], "18995");
        assert_eq!(flat["pricingDetail_msrp"], "");
        assert_eq!(flat["specifications_color_label"], "Color");
        assert_eq!(flat["specifications_color_value"], "Blue");
    }

    #[test]
    fn record_lists_get_positional_suffixes() {
        let flat = flatten(json!({
            "images": [ { "src": "a.jpg" }, { "src": "b.jpg" } ],
        }));

        assert_eq!(flat["images_0_src"], "a.jpg");
        assert_eq!(flat["images_1_src"], "b.jpg");
        assert!(!flat.contains_key("images"));
    }

    #[test]
    fn scalar_lists_are_joined_and_empty_lists_kept() {
        let flat = flatten(json!({
            "packages": ["Sport", "Tech", 3],
            "awards": [],
        }));

        assert_eq!(flat["packages"], "Sport, Tech, 3");
        assert_eq!(flat["awards"], "");
    }

    #[test]
    fn colliding_paths_do_not_overwrite_each_other() {
        let flat = flatten(json!({
            "owner": { "name": "nested" },
            "owner_name": "literal",
        }));

        assert_eq!(flat.len(), 2);
        let mut values: Vec<_> = flat.values().cloned().collect();
        values.sort();
        assert_eq!(values, vec!["literal".to_string(), "nested".to_string()]);
    }

    #[test]
    fn columns_follow_source_field_order() {
        let flat = flatten(json!({
            "vin": "X",
            "year": 2020,
            "pricingDetail": { "salePrice": 1, "dealer": 2 },
            "make": "AUDI",
        }));

        let keys: Vec<_> = flat.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["vin", "year", "pricingDetail_salePrice", "pricingDetail_dealer", "make"]);
    }

    #[test]
    fn flattening_is_deterministic() {
        let input = json!({
            "vin": "X",
            "owners": [ { "state": "NY", "tags": ["a", "b"] } ],
            "phone": { "value": "555-0100" },
        });

        assert_eq!(flatten(input.clone()), flatten(input));
    }

    #[test]
    fn very_deep_subtrees_are_stored_as_json() {
        let mut value = json!("leaf");
        for _ in 0..(MAX_DEPTH + 5) {
            value = json!({ "n": value });
        }
        let flat = flatten(json!({ "root": value }));

        assert_eq!(flat.len(), 1);
        let (key, cell) = flat.iter().next().unwrap();
        assert!(key.starts_with("root_n_n"));
        assert!(cell.contains("leaf"));
    }
}
