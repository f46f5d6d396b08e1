use crate::constants::limits::{MAX_PRICE, MAX_RATING};
use crate::domain::{CategoryId, ProductId, TemplateId};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A product listing as reported by the extraction collaborator.
///
/// Every field is optional because extractors return whatever the page
/// exposed; [`ExtractedProduct::sanitize`] decides what is storable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedProduct {
    #[serde(alias = "title", alias = "name", deserialize_with = "lenient_text")]
    pub product_name: Option<String>,

    /// Price text as displayed on the page.
    #[serde(alias = "raw_price", deserialize_with = "lenient_text")]
    pub original_price: Option<String>,

    #[serde(alias = "price", deserialize_with = "lenient_number")]
    pub current_price: Option<f64>,

    #[serde(alias = "url", deserialize_with = "lenient_text")]
    pub product_url: Option<String>,

    #[serde(alias = "image_url", deserialize_with = "lenient_text")]
    pub product_image_url: Option<String>,

    #[serde(deserialize_with = "lenient_text")]
    pub description: Option<String>,

    #[serde(deserialize_with = "lenient_number")]
    pub rating: Option<f64>,

    #[serde(alias = "review_count", deserialize_with = "lenient_count")]
    pub reviews: Option<i64>,

    #[serde(deserialize_with = "lenient_flag")]
    pub in_stock: Option<bool>,

    #[serde(deserialize_with = "lenient_text")]
    pub brand: Option<String>,
}

// Extractors are loose with types. A field of the wrong shape becomes
// `None` so one odd listing never rejects the whole response.

fn lenient_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[allow(clippy::cast_possible_truncation)]
fn lenient_count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let number = match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(number.filter(|n| n.is_finite()).map(|n| n as i64))
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "in stock" => Some(true),
            "false" | "no" | "out of stock" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

/// Where a batch of records came from.
#[derive(Debug, Clone, Copy)]
pub struct RecordOrigin<'a> {
    pub platform_url: &'a str,
    pub category_id: CategoryId,
    pub searched_product_id: ProductId,
    pub template_id: TemplateId,
}

/// A validated record ready for insertion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProductRecord {
    pub platform_url: String,
    pub product_name: String,
    pub original_price: Option<String>,
    pub current_price: Option<f64>,
    pub product_url: String,
    pub product_image_url: Option<String>,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub reviews: Option<i32>,
    pub in_stock: Option<bool>,
    pub brand: Option<String>,
    pub category_id: CategoryId,
    pub searched_product_id: ProductId,
    pub template_id: TemplateId,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl ExtractedProduct {
    /// Returns `None` when the listing lacks a name or product URL.
    ///
    /// Negative or non-finite prices are dropped and large ones capped;
    /// ratings are clamped to `0..=100` (sites mix 5, 10 and 100 point
    /// scales); negative review counts are dropped.
    #[must_use]
    pub fn sanitize(self, origin: RecordOrigin<'_>) -> Option<NewProductRecord> {
        let product_name = non_empty(self.product_name)?;
        let product_url = non_empty(self.product_url)?;

        let current_price = self
            .current_price
            .filter(|p| p.is_finite() && *p >= 0.0)
            .map(|p| round2(p.min(MAX_PRICE)));

        let rating = self
            .rating
            .filter(|r| r.is_finite())
            .map(|r| round2(r.clamp(0.0, MAX_RATING)));

        let reviews = self
            .reviews
            .filter(|r| *r >= 0)
            .map(|r| i32::try_from(r).unwrap_or(i32::MAX));

        Some(NewProductRecord {
            platform_url: origin.platform_url.to_string(),
            product_name,
            original_price: non_empty(self.original_price),
            current_price,
            product_url,
            product_image_url: non_empty(self.product_image_url),
            description: non_empty(self.description),
            rating,
            reviews,
            in_stock: self.in_stock,
            brand: non_empty(self.brand),
            category_id: origin.category_id,
            searched_product_id: origin.searched_product_id,
            template_id: origin.template_id,
        })
    }
}
