// ABOUTME: FieldMapping (field name -> selector) and ExtractionResult (field name -> text).
// ABOUTME: Both keep insertion order and serialize as plain JSON objects.

use serde::{Deserialize, Serialize};

/// Well-known field names.
pub mod field {
    pub const FULL_NAME: &str = "full_name";
    pub const EMAIL: &str = "email";
    pub const PHONE: &str = "phone";
    pub const ADDRESS: &str = "address";
    pub const NOTES: &str = "notes";
    /// Selector for the repeated rows of a list page. Only used by bulk crawl.
    pub const CUSTOMER_LIST: &str = "customer_list";

    /// The record fields, in display order.
    pub const RECORD_FIELDS: [&str; 5] = [FULL_NAME, EMAIL, PHONE, ADDRESS, NOTES];
}

/// Ordered mapping of field name to CSS selector.
///
/// Selectors are not validated here. An empty or invalid selector simply
/// matches nothing when the mapping is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping {
    #[serde(with = "ordered_pairs")]
    entries: Vec<(String, String)>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the selector for `field`, keeping the field's original position.
    pub fn insert(&mut self, field: impl Into<String>, selector: impl Into<String>) {
        set_pair(&mut self.entries, field.into(), selector.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, field: impl Into<String>, selector: impl Into<String>) -> Self {
        self.insert(field, selector);
        self
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        get_pair(&self.entries, field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(f, s)| (f.as_str(), s.as_str()))
    }

    /// The entries applied to a detail page: everything except the list selector.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(f, _)| *f != field::CUSTOMER_LIST)
    }

    /// The list selector used for link discovery, when set and non-empty.
    pub fn list_selector(&self) -> Option<&str> {
        self.get(field::CUSTOMER_LIST)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut mapping = FieldMapping::new();
        for (field, selector) in iter {
            mapping.insert(field, selector);
        }
        mapping
    }
}

/// Ordered mapping of field name to extracted text. Missing fields read as `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionResult {
    #[serde(with = "ordered_pairs")]
    values: Vec<(String, String)>,
}

impl ExtractionResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        set_pair(&mut self.values, field.into(), value.into());
    }

    /// The value of `field`, or `""` when it was not extracted.
    pub fn get(&self, field: &str) -> &str {
        get_pair(&self.values, field).unwrap_or("")
    }

    pub fn phone(&self) -> &str {
        self.get(field::PHONE)
    }

    pub fn full_name(&self) -> &str {
        self.get(field::FULL_NAME)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(f, v)| (f.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ExtractionResult {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut result = ExtractionResult::new();
        for (field, value) in iter {
            result.insert(field, value);
        }
        result
    }
}

fn set_pair(pairs: &mut Vec<(String, String)>, key: String, value: String) {
    match pairs.iter_mut().find(|(k, _)| *k == key) {
        Some(slot) => slot.1 = value,
        None => pairs.push((key, value)),
    }
}

fn get_pair<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Serializes `Vec<(String, String)>` as a JSON object, preserving key order.
mod ordered_pairs {
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(pairs: &[(String, String)], s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(pairs.len()))?;
        for (key, value) in pairs {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<(String, String)>, D::Error> {
        struct PairsVisitor;

        impl<'de> Visitor<'de> for PairsVisitor {
            type Value = Vec<(String, String)>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field names to strings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut pairs: Vec<(String, String)> = Vec::new();
                while let Some((key, value)) = access.next_entry::<String, Option<String>>()? {
                    super::set_pair(&mut pairs, key, value.unwrap_or_default());
                }
                Ok(pairs)
            }
        }

        d.deserialize_map(PairsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mapping_preserves_order_through_json() {
        let json = r#"{"phone":".tel","full_name":"h1","customer_list":".row a","notes":null}"#;
        let mapping: FieldMapping = serde_json::from_str(json).unwrap();

        let fields: Vec<&str> = mapping.iter().map(|(f, _)| f).collect();
        assert_eq!(fields, vec!["phone", "full_name", "customer_list", "notes"]);
        assert_eq!(mapping.get("notes"), Some(""));
        assert_eq!(
            serde_json::to_string(&mapping).unwrap(),
            r#"{"phone":".tel","full_name":"h1","customer_list":".row a","notes":""}"#
        );
    }

    #[test]
    fn test_fields_skip_list_selector() {
        let mapping = FieldMapping::new()
            .with(field::FULL_NAME, "h1")
            .with(field::CUSTOMER_LIST, " .row ")
            .with(field::PHONE, ".tel");

        let fields: Vec<&str> = mapping.fields().map(|(f, _)| f).collect();
        assert_eq!(fields, vec!["full_name", "phone"]);
        assert_eq!(mapping.list_selector(), Some(".row"));
    }

    #[test]
    fn test_blank_list_selector_is_none() {
        let mapping = FieldMapping::new().with(field::CUSTOMER_LIST, "  ");
        assert_eq!(mapping.list_selector(), None);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut mapping: FieldMapping = [("a", "1"), ("b", "2")].into_iter().collect();
        mapping.insert("a", "3");
        assert_eq!(mapping.iter().collect::<Vec<_>>(), vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn test_missing_result_field_reads_empty() {
        let result: ExtractionResult = [("full_name", "Ali")].into_iter().collect();
        assert_eq!(result.full_name(), "Ali");
        assert_eq!(result.phone(), "");
    }
}
