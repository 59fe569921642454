use super::model::{Category, Status, CITY};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const RESPONSE_TYPE: &str = "JsonHtml";
const TEMPLATE: &str = "SearchContent";
const ASCENDING: &str = "asc";
const TOP_HITS_FIELD: &str = "TopHits";
const TOP_HITS_MAX_VALUES: u32 = 10;

/// Search for active and waitlisted events in the city, oldest first
#[derive(Debug, Serialize)]
pub struct SearchRequest {
    #[serde(rename = "ResponseType")]
    pub response_type: &'static str,
    #[serde(rename = "Template")]
    pub template: &'static str,
    pub facets: Facets,
    pub filters: BTreeMap<String, Value>,
    pub page: u32,
    pub query: &'static str,
    pub text: &'static str,
    pub traits: Vec<String>,
    pub sort: Sort,
    #[serde(rename = "rangeFacets")]
    pub range_facets: BTreeMap<String, Value>,
    #[serde(rename = "perPage")]
    pub per_page: u32,
    #[serde(rename = "enableRelatedSearches")]
    pub enable_related_searches: bool,
    #[serde(rename = "applyMultiLevelFacets")]
    pub apply_multi_level_facets: bool,
    #[serde(rename = "topHitsFields")]
    pub top_hits_fields: Vec<TopHitsField>,
}

impl SearchRequest {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            response_type: RESPONSE_TYPE,
            template: TEMPLATE,
            facets: Facets::default(),
            filters: BTreeMap::new(),
            page,
            query: "*",
            text: "",
            traits: vec![],
            sort: Sort {
                start_date: ASCENDING,
                date_published: ASCENDING,
            },
            range_facets: BTreeMap::new(),
            per_page,
            enable_related_searches: false,
            apply_multi_level_facets: true,
            top_hits_fields: vec![TopHitsField {
                field: TOP_HITS_FIELD,
                max_field_values: TOP_HITS_MAX_VALUES,
            }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Facets {
    pub category: Vec<&'static str>,
    pub course_category: Vec<String>,
    pub additional_type: Vec<String>,
    pub city: Vec<&'static str>,
    pub organizer: Vec<String>,
    pub course_language: Vec<String>,
    pub relevant_for: Vec<String>,
    #[serde(rename = "date")]
    pub date: Vec<String>,
    #[serde(rename = "range")]
    pub range: Vec<String>,
    pub status: Vec<&'static str>,
}

impl Default for Facets {
    fn default() -> Self {
        Self {
            category: vec![Category::Arrangementer.into()],
            course_category: vec![],
            additional_type: vec![],
            city: vec![CITY],
            organizer: vec![],
            course_language: vec![],
            relevant_for: vec![],
            date: vec![],
            range: vec![],
            status: vec![Status::Afholdes.into(), Status::Venteliste.into()],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Sort {
    #[serde(rename = "StartDate_date")]
    pub start_date: &'static str,
    #[serde(rename = "DatePublished_date")]
    pub date_published: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TopHitsField {
    pub field: &'static str,
    #[serde(rename = "maxFieldValues")]
    pub max_field_values: u32,
}

// Note: the result markup comes under either name depending on the response
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(rename = "SearchResult", default, deserialize_with = "deserialize_opt_str")]
    pub search_result: Option<String>,
    #[serde(
        rename = "SearchResultHtml",
        default,
        deserialize_with = "deserialize_opt_str"
    )]
    pub search_result_html: Option<String>,
    #[serde(rename = "TotalDocuments", default, deserialize_with = "deserialize_count")]
    pub total_documents: u64,
}

impl SearchResponse {
    pub fn html(&self) -> &str {
        self.search_result
            .as_deref()
            .or(self.search_result_html.as_deref())
            .unwrap_or_default()
    }
}

fn deserialize_opt_str<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn deserialize_count<'de, D>(d: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|n| *n >= 0.0).map(|n| n as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test_log::test]
    fn should_serialize_the_search_body() {
        let body = serde_json::to_value(SearchRequest::new(2, 50)).unwrap();

        assert_eq!(body["ResponseType"], "JsonHtml");
        assert_eq!(body["Template"], "SearchContent");
        assert_eq!(body["page"], 2);
        assert_eq!(body["perPage"], 50);
        assert_eq!(body["query"], "*");
        assert_eq!(body["facets"]["City"], json!(["København"]));
        assert_eq!(body["facets"]["Category"], json!(["Arrangementer"]));
        assert_eq!(body["facets"]["Status"], json!(["Afholdes", "Venteliste"]));
        assert_eq!(body["facets"]["CourseCategory"], json!([]));
        assert_eq!(body["facets"]["date"], json!([]));
        assert_eq!(body["facets"]["range"], json!([]));
        assert_eq!(
            body["sort"],
            json!({"StartDate_date": "asc", "DatePublished_date": "asc"})
        );
        assert_eq!(body["filters"], json!({}));
        assert_eq!(body["rangeFacets"], json!({}));
        assert_eq!(body["applyMultiLevelFacets"], true);
        assert_eq!(body["enableRelatedSearches"], false);
        assert_eq!(
            body["topHitsFields"],
            json!([{"field": "TopHits", "maxFieldValues": 10}])
        );
    }

    #[test_log::test]
    fn should_read_the_html_from_either_field() {
        let first: SearchResponse =
            serde_json::from_str(r#"{"SearchResult": "<a>1</a>", "TotalDocuments": 3}"#).unwrap();
        let second: SearchResponse =
            serde_json::from_str(r#"{"SearchResultHtml": "<a>2</a>"}"#).unwrap();

        assert_eq!(first.html(), "<a>1</a>");
        assert_eq!(first.total_documents, 3);
        assert_eq!(second.html(), "<a>2</a>");
    }

    #[test_log::test]
    fn when_fields_are_missing_should_default_to_no_events() {
        let response: SearchResponse = serde_json::from_str("{}").unwrap();

        assert_eq!(response.html(), "");
        assert_eq!(response.total_documents, 0);
    }

    #[test_log::test]
    fn should_be_lenient_with_the_total() {
        let numeric_string: SearchResponse =
            serde_json::from_str(r#"{"TotalDocuments": "120"}"#).unwrap();
        let garbage: SearchResponse =
            serde_json::from_str(r#"{"TotalDocuments": "mange"}"#).unwrap();
        let null: SearchResponse = serde_json::from_str(r#"{"TotalDocuments": null}"#).unwrap();

        assert_eq!(numeric_string.total_documents, 120);
        assert_eq!(garbage.total_documents, 0);
        assert_eq!(null.total_documents, 0);
    }
}
