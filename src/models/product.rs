use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::Payload;

const UNKNOWN: &str = "Unknown";

/// Catalogue entry. Field names on the wire follow the product dataset columns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    #[serde(rename = "Product Name")]
    pub name: String,
    #[serde(rename = "Category", default)]
    pub category: String,
    #[serde(rename = "Selling Price", default)]
    pub price: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Product {
    pub fn text(&self) -> String {
        let mut text = format!("{}. {}", self.name, self.category);
        if let Some(description) = self.description.as_deref().filter(|d| !d.trim().is_empty()) {
            text.push_str(". ");
            text.push_str(description);
        }
        text
    }
}

/// User-facing subset of a product payload; missing fields read `"Unknown"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub name: String,
    pub category: String,
    pub price: String,
    pub image_path: String,
    pub embedding_type: String,
}

impl ProductInfo {
    pub fn from_payload(payload: &Payload) -> Self {
        let field = |key: &str| match payload.get(key) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => UNKNOWN.to_string(),
        };

        Self {
            name: field("Product Name"),
            category: field("Category"),
            price: field("Selling Price"),
            image_path: field("image_path"),
            embedding_type: field("embedding_type"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProductHit {
    /// Similarity in `[0, 1]`, higher is better.
    pub score: f32,
    pub similarity_percent: f32,
    pub product_info: ProductInfo,
    pub match_reasons: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProductSearchResponse {
    pub status: String,
    pub count: usize,
    pub results: Vec<ProductHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_product_info_defaults_to_unknown() {
        let payload = json!({
            "Product Name": "Trail Runner 2",
            "Selling Price": 89.5,
            "embedding_type": "image"
        });
        let info = ProductInfo::from_payload(payload.as_object().unwrap());

        assert_eq!(info.name, "Trail Runner 2");
        assert_eq!(info.price, "89.5");
        assert_eq!(info.category, "Unknown");
        assert_eq!(info.image_path, "Unknown");
        assert_eq!(info.embedding_type, "image");
    }

    #[test]
    fn test_product_text_skips_blank_description() {
        let mut product = Product {
            id: "p1".into(),
            name: "Camping Stove".into(),
            category: "Outdoor | Cooking".into(),
            price: "$45.00".into(),
            image_path: None,
            description: Some("  ".into()),
        };
        assert_eq!(product.text(), "Camping Stove. Outdoor | Cooking");

        product.description = Some("Compact butane stove".into());
        assert_eq!(product.text(), "Camping Stove. Outdoor | Cooking. Compact butane stove");
    }
}
