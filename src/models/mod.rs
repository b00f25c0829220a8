pub mod auth;
pub mod notification;
pub mod report;
pub mod timetable;
pub mod user;

use serde::{Deserialize, Deserializer};

/// Rows coming from the hosted store may carry `null` where a value is
/// expected; read those as the type's default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `null`, missing and blank strings all read as `None`.
pub(crate) fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListShape {
    List(Vec<String>),
    Text(String),
}

impl ListShape {
    fn normalize(self) -> Vec<String> {
        match self {
            ListShape::List(items) => normalize_list(items.iter().map(String::as_str)),
            ListShape::Text(text) => split_list(&text),
        }
    }
}

/// Accepts either a JSON list of strings or a comma-separated string
/// (bulk import files and admin forms use both shapes).
pub(crate) fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_string_or_list(deserializer)?.unwrap_or_default())
}

/// Like [`string_or_list`], but `null` and a missing field stay `None` so a
/// partial update can tell "leave alone" from "clear".
pub(crate) fn optional_string_or_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<ListShape>::deserialize(deserializer)?.map(ListShape::normalize))
}

/// Split comma-separated text into trimmed, non-empty, de-duplicated entries.
///
/// `"a, b , c"` becomes `["a", "b", "c"]`; joining the result with `", "` and
/// splitting again yields the same list.
pub fn split_list(text: &str) -> Vec<String> {
    normalize_list(text.split(','))
}

fn normalize_list<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items.map(str::trim).filter(|s| !s.is_empty()) {
        if !out.iter().any(|existing| existing == item) {
            out.push(item.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_trims_and_drops_empty_entries() {
        assert_eq!(split_list("a, b , c"), vec!["a", "b", "c"]);
        assert_eq!(split_list(" , x,,  y ,"), vec!["x", "y"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn split_list_is_idempotent_under_resave() {
        let first = split_list("Maths ,Physics, Maths,  Chemistry");
        assert_eq!(first, vec!["Maths", "Physics", "Chemistry"]);
        let second = split_list(&first.join(", "));
        assert_eq!(first, second);
    }

    #[test]
    fn string_or_list_accepts_both_shapes() {
        #[derive(Deserialize)]
        struct Row {
            #[serde(default, deserialize_with = "string_or_list")]
            subjects: Vec<String>,
        }

        let text: Row = serde_json::from_str(r#"{"subjects": "DBMS, OS"}"#).unwrap();
        assert_eq!(text.subjects, vec!["DBMS", "OS"]);

        let list: Row = serde_json::from_str(r#"{"subjects": [" DBMS", "OS", ""]}"#).unwrap();
        assert_eq!(list.subjects, vec!["DBMS", "OS"]);

        let null: Row = serde_json::from_str(r#"{"subjects": null}"#).unwrap();
        assert!(null.subjects.is_empty());

        let missing: Row = serde_json::from_str("{}").unwrap();
        assert!(missing.subjects.is_empty());
    }
}
