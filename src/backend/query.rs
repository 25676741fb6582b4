use std::cmp::Ordering;

use serde_json::Value;

use super::{BackendError, BackendResult, Document};

/// Page size applied when a listing carries no limit.
pub const DEFAULT_LIMIT: usize = 25;
pub const MAX_LIMIT: usize = 5000;

/// A listing filter, ordering or paging instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Attribute equals any of the values (any element, for array attributes).
    Equal(String, Vec<Value>),
    OrderAsc(String),
    OrderDesc(String),
    Limit(usize),
    /// Only documents after this document id, in the listing's order.
    CursorAfter(String),
    /// Case-insensitive full-text match on a string attribute.
    Search(String, String),
}

impl Query {
    pub fn equal(attribute: &str, value: impl Into<Value>) -> Self {
        Self::Equal(attribute.to_string(), vec![value.into()])
    }

    pub fn order_asc(attribute: &str) -> Self {
        Self::OrderAsc(attribute.to_string())
    }

    pub fn order_desc(attribute: &str) -> Self {
        Self::OrderDesc(attribute.to_string())
    }

    pub fn limit(limit: usize) -> Self {
        Self::Limit(limit)
    }

    pub fn cursor_after(document_id: &str) -> Self {
        Self::CursorAfter(document_id.to_string())
    }

    pub fn search(attribute: &str, term: &str) -> Self {
        Self::Search(attribute.to_string(), term.to_string())
    }

    fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::Equal(attribute, values) => match doc.attribute(attribute) {
                Some(Value::Array(items)) => items.iter().any(|item| values.contains(item)),
                Some(value) => values.contains(&value),
                None => values.contains(&Value::Null),
            },
            Self::Search(attribute, term) => {
                let Some(Value::String(text)) = doc.attribute(attribute) else {
                    return false;
                };
                let text = text.to_lowercase();
                term.split_whitespace()
                    .any(|word| text.contains(&word.to_lowercase()))
            }
            _ => true,
        }
    }
}

/// Apply `queries` to documents given in insertion order.
///
/// Returns the number of documents matching the filters and the requested page.
pub fn evaluate(queries: &[Query], documents: Vec<Document>) -> BackendResult<(usize, Vec<Document>)> {
    let mut limit = DEFAULT_LIMIT;
    let mut cursor = None;
    let mut orders: Vec<(&str, bool)> = Vec::new();

    for query in queries {
        match query {
            Query::Limit(n) => {
                if *n > MAX_LIMIT {
                    return Err(BackendError::bad_request(
                        "general_query_invalid",
                        format!("Invalid query: limit must be at most {}", MAX_LIMIT),
                    ));
                }
                limit = *n;
            }
            Query::CursorAfter(id) => cursor = Some(id.as_str()),
            Query::OrderAsc(attribute) => orders.push((attribute.as_str(), false)),
            Query::OrderDesc(attribute) => orders.push((attribute.as_str(), true)),
            Query::Equal(..) | Query::Search(..) => {}
        }
    }

    let mut matched: Vec<(usize, Document)> = documents
        .into_iter()
        .filter(|doc| queries.iter().all(|q| q.matches(doc)))
        .enumerate()
        .collect();
    let total = matched.len();

    matched.sort_by(|(pos_a, a), (pos_b, b)| {
        for (attribute, descending) in &orders {
            let ordering = compare(a.attribute(attribute).as_ref(), b.attribute(attribute).as_ref());
            let ordering = if *descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        // Ties follow insertion order, in the direction of the primary order.
        match orders.first() {
            Some((_, true)) => pos_b.cmp(pos_a),
            _ => pos_a.cmp(pos_b),
        }
    });

    let start = match cursor {
        Some(id) => {
            let position = matched.iter().position(|(_, doc)| doc.id == id).ok_or_else(|| {
                BackendError::bad_request(
                    "general_cursor_not_found",
                    "Invalid cursor: Document with the requested ID could not be found.",
                )
            })?;
            position + 1
        }
        None => 0,
    };

    let page = matched
        .into_iter()
        .skip(start)
        .take(limit)
        .map(|(_, doc)| doc)
        .collect();

    Ok((total, page))
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::{json, Map};

    fn doc(id: &str, minutes: i64, data: Value) -> Document {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let Value::Object(map) = data else {
            panic!("data must be an object")
        };
        Document {
            id: id.to_string(),
            collection: "posts".to_string(),
            created_at: base + Duration::minutes(minutes),
            updated_at: base + Duration::minutes(minutes),
            data: map,
        }
    }

    fn ids(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.id.as_str()).collect()
    }

    fn sample() -> Vec<Document> {
        vec![
            doc("a", 1, json!({"creator": "u1", "caption": "Sunset at the beach"})),
            doc("b", 3, json!({"creator": "u2", "caption": "Morning coffee"})),
            doc("c", 2, json!({"creator": "u1", "caption": "Beach volleyball"})),
            doc("d", 4, json!({"creator": "u3", "caption": "Night sky", "likes": ["u1", "u2"]})),
        ]
    }

    #[test]
    fn no_queries_returns_insertion_order_with_default_limit() {
        let (total, page) = evaluate(&[], sample()).unwrap();
        assert_eq!(total, 4);
        assert_eq!(ids(&page), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn equal_filters_and_counts() {
        let (total, page) = evaluate(&[Query::equal("creator", "u1")], sample()).unwrap();
        assert_eq!(total, 2);
        assert_eq!(ids(&page), vec!["a", "c"]);
    }

    #[test]
    fn equal_matches_array_members() {
        let (_, page) = evaluate(&[Query::equal("likes", "u2")], sample()).unwrap();
        assert_eq!(ids(&page), vec!["d"]);
    }

    #[test]
    fn order_desc_by_created_at() {
        let (_, page) = evaluate(&[Query::order_desc("$createdAt")], sample()).unwrap();
        assert_eq!(ids(&page), vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn cursor_after_continues_from_document() {
        let queries = [
            Query::order_desc("$createdAt"),
            Query::limit(2),
            Query::cursor_after("b"),
        ];
        let (total, page) = evaluate(&queries, sample()).unwrap();
        assert_eq!(total, 4);
        assert_eq!(ids(&page), vec!["c", "a"]);
    }

    #[test]
    fn unknown_cursor_is_rejected() {
        let err = evaluate(&[Query::cursor_after("zzz")], sample()).unwrap_err();
        assert_eq!(err.code, 400);
    }

    #[test]
    fn search_matches_any_word_case_insensitively() {
        let (_, page) = evaluate(&[Query::search("caption", "BEACH")], sample()).unwrap();
        assert_eq!(ids(&page), vec!["a", "c"]);

        let (_, page) = evaluate(&[Query::search("caption", "coffee sky")], sample()).unwrap();
        assert_eq!(ids(&page), vec!["b", "d"]);
    }

    #[test]
    fn limit_above_maximum_is_rejected() {
        assert!(evaluate(&[Query::limit(MAX_LIMIT + 1)], sample()).is_err());
    }

    #[test]
    fn missing_attributes_sort_first_ascending() {
        let docs = vec![
            doc("x", 0, json!({"rank": 2})),
            doc("y", 0, Value::Object(Map::new())),
            doc("z", 0, json!({"rank": 1})),
        ];
        let (_, page) = evaluate(&[Query::order_asc("rank")], docs).unwrap();
        assert_eq!(ids(&page), vec!["y", "z", "x"]);
    }

    #[test]
    fn descending_ties_put_later_inserts_first() {
        let docs = vec![
            doc("first", 0, json!({})),
            doc("second", 0, json!({})),
            doc("third", 0, json!({})),
        ];
        let (_, page) = evaluate(&[Query::order_desc("$createdAt")], docs.clone()).unwrap();
        assert_eq!(ids(&page), vec!["third", "second", "first"]);

        let (_, page) = evaluate(&[Query::order_asc("$createdAt")], docs).unwrap();
        assert_eq!(ids(&page), vec!["first", "second", "third"]);
    }
}
