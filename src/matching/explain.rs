//! "Why did this match" annotations.
//!
//! Reasons come from plain keyword and field overlap between the query
//! context and a candidate. They are descriptive only and never affect order.

use serde_json::Value;

use crate::{
    models::{ProductInfo, TechnicalMetadata, User},
    store::Payload,
};

use super::products::ProductQuery;

/// Produces human-readable match reasons for a candidate of type `C`
/// given a query context of type `Q`.
pub trait Explainer<Q: ?Sized, C: ?Sized>: Send + Sync {
    fn explain(&self, query: &Q, candidate: &C) -> Vec<String>;
}

fn words(query: &str) -> impl Iterator<Item = String> + '_ {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn dedup(words: impl Iterator<Item = String>) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in words {
        if !terms.contains(&word) {
            terms.push(word);
        }
    }
    terms
}

/// Lower-cased query words of three or more characters, deduplicated in order.
pub fn query_terms(query: &str) -> Vec<String> {
    dedup(words(query).filter(|t| t.chars().count() >= 3))
}

/// Words too short to match inside an item. They only match an item that
/// consists of exactly that word, such as "AI" or "UX".
fn short_terms(query: &str) -> Vec<String> {
    dedup(words(query).filter(|t| t.chars().count() < 3))
}

fn mentioning<'a>(items: &'a [String], terms: &[String], short: &[String]) -> Vec<&'a str> {
    items
        .iter()
        .filter(|item| {
            let item = item.trim().to_lowercase();
            terms.iter().any(|term| item.contains(term.as_str()))
                || short.iter().any(|term| item == *term)
        })
        .map(String::as_str)
        .collect()
}

/// Matches query words against a profile's interests, values, expertise and activities.
#[derive(Debug, Default, Clone, Copy)]
pub struct UserReasonExplainer;

impl Explainer<str, User> for UserReasonExplainer {
    fn explain(&self, query: &str, user: &User) -> Vec<String> {
        let terms = query_terms(query);
        let short = short_terms(query);
        let mut reasons = Vec::new();

        let interests = mentioning(&user.interests, &terms, &short);
        if !interests.is_empty() {
            reasons.push(format!("Shares interests in: {}", interests.join(", ")));
        }

        let values = mentioning(&user.values, &terms, &short);
        if !values.is_empty() {
            reasons.push(format!("Aligned values: {}", values.join(", ")));
        }

        let expertise = mentioning(&user.expertise.areas, &terms, &short);
        if !expertise.is_empty() {
            reasons.push(format!("Expert in: {}", expertise.join(", ")));
        }

        let activities = mentioning(&user.activities, &terms, &short);
        if !activities.is_empty() {
            reasons.push(format!("Active in: {}", activities.join(", ")));
        }

        if reasons.is_empty() {
            reasons.push("Profile aligns with search criteria".to_string());
        }
        reasons
    }
}

/// Compares the reference image payload with a candidate payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageAspectExplainer;

/// Pixel difference under which two sides count as similar.
const SIMILAR_SIDE_PX: i64 = 100;

impl ImageAspectExplainer {
    fn title_case(text: &str) -> String {
        text.split_whitespace()
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first
                        .to_uppercase()
                        .chain(chars.flat_map(char::to_lowercase))
                        .collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// `/styles/dark-fantasy` becomes `Dark Fantasy`.
    pub fn style_from_url(url: &str) -> String {
        Self::title_case(&url.replace("/styles/", "").replace('-', " "))
    }

    fn labels(payload: &Payload) -> Vec<String> {
        payload
            .get("labels")
            .and_then(Value::as_array)
            .map(|labels| {
                labels
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn technical(payload: &Payload) -> Option<TechnicalMetadata> {
        payload
            .get("technical_metadata")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
    }
}

impl Explainer<Payload, Payload> for ImageAspectExplainer {
    fn explain(&self, reference: &Payload, candidate: &Payload) -> Vec<String> {
        let mut aspects = Vec::new();

        if let Some(name) = candidate.get("name").and_then(Value::as_str) {
            aspects.push(format!("Artist/Style: {name}"));
        }

        if let Some(url) = candidate.get("url").and_then(Value::as_str) {
            aspects.push(format!("Art Style: {}", Self::style_from_url(url)));
        }

        let reference_labels: Vec<String> = Self::labels(reference)
            .iter()
            .map(|l| l.to_lowercase())
            .collect();
        let shared: Vec<String> = Self::labels(candidate)
            .into_iter()
            .filter(|label| reference_labels.contains(&label.to_lowercase()))
            .collect();
        if !shared.is_empty() {
            aspects.push(format!("Shared labels: {}", shared.join(", ")));
        }

        if let (
            Some(TechnicalMetadata::Local {
                dimensions: ref_dims,
                format: ref_format,
                ..
            }),
            Some(TechnicalMetadata::Local {
                dimensions: cand_dims,
                format: cand_format,
                ..
            }),
        ) = (Self::technical(reference), Self::technical(candidate))
        {
            if (ref_dims.width as i64 - cand_dims.width as i64).abs() < SIMILAR_SIDE_PX {
                aspects.push("Similar width".to_string());
            }
            if (ref_dims.height as i64 - cand_dims.height as i64).abs() < SIMILAR_SIDE_PX {
                aspects.push("Similar height".to_string());
            }
            if ref_format == cand_format {
                aspects.push(format!("Same format: {ref_format}"));
            }
        }

        if aspects.is_empty() {
            aspects.push("Visual similarity based on content analysis".to_string());
        }
        aspects
    }
}

/// Relates a product hit to a text or image query.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProductReasonExplainer;

impl Explainer<ProductQuery, ProductInfo> for ProductReasonExplainer {
    fn explain(&self, query: &ProductQuery, product: &ProductInfo) -> Vec<String> {
        match query {
            ProductQuery::Text(text) => {
                let terms = query_terms(text);
                let mut reasons = Vec::new();

                let category = product.category.to_lowercase();
                if terms.iter().any(|term| category.contains(term.as_str())) {
                    reasons.push(format!("Category match: {}", product.category));
                }

                let name = product.name.to_lowercase();
                let named: Vec<&str> = terms
                    .iter()
                    .filter(|term| name.contains(term.as_str()))
                    .map(String::as_str)
                    .collect();
                if !named.is_empty() {
                    reasons.push(format!("Name mentions: {}", named.join(", ")));
                }

                if reasons.is_empty() {
                    reasons.push(format!("Semantically related to \"{}\"", text.trim()));
                }
                reasons
            }
            ProductQuery::Image(_) => {
                if product.embedding_type == "image" {
                    vec!["Visually similar product image".to_string()]
                } else {
                    vec!["Product description matches the image content".to_string()]
                }
            }
        }
    }
}
