//! Derived-view computation for the admin product table: case-insensitive
//! multi-field substring filtering and stable column sorting.
//!
//! These functions are pure over the in-memory list; session state passes
//! snapshots in so the engine stays independently testable.

use shared::domain::Product;

/// Sortable product columns. The numeric set compares as numbers with missing
/// values treated as zero; everything else compares as case-insensitive
/// strings with missing values treated as empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Id,
    Name,
    Brand,
    Price,
    OriginalPrice,
    Rating,
    ReviewCount,
    Discount,
    ArticleNumber,
    Country,
    Code,
    Description,
}

impl SortField {
    fn is_numeric(self) -> bool {
        matches!(
            self,
            SortField::Price
                | SortField::OriginalPrice
                | SortField::Rating
                | SortField::ReviewCount
                | SortField::Discount
        )
    }
}

impl std::str::FromStr for SortField {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "id" => Ok(SortField::Id),
            "name" => Ok(SortField::Name),
            "brand" => Ok(SortField::Brand),
            "price" => Ok(SortField::Price),
            "originalprice" | "original_price" => Ok(SortField::OriginalPrice),
            "rating" => Ok(SortField::Rating),
            "reviewcount" | "review_count" => Ok(SortField::ReviewCount),
            "discount" => Ok(SortField::Discount),
            "articlenumber" | "article_number" => Ok(SortField::ArticleNumber),
            "country" => Ok(SortField::Country),
            "code" => Ok(SortField::Code),
            "description" => Ok(SortField::Description),
            other => Err(format!("unknown sort field: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// The ephemeral filter/sort intent of one admin table. Search and sort are
/// orthogonal: changing one never resets the other.
#[derive(Debug, Clone, Default)]
pub struct ViewSpec {
    pub search: String,
    pub sort_field: Option<SortField>,
    pub sort_direction: SortDirection,
}

impl ViewSpec {
    /// Column-header semantics: choosing the active column flips direction,
    /// choosing a new column sorts it ascending.
    pub fn sort_by(&mut self, field: SortField) {
        if self.sort_field == Some(field) {
            self.sort_direction = self.sort_direction.toggled();
        } else {
            self.sort_field = Some(field);
            self.sort_direction = SortDirection::Ascending;
        }
    }
}

/// Retains the products for which any searchable field contains the trimmed,
/// lowercased query as a substring. A blank query is the identity.
pub fn filter_products(products: &[Product], raw_query: &str) -> Vec<Product> {
    let query = raw_query.trim().to_lowercase();
    if query.is_empty() {
        return products.to_vec();
    }
    products
        .iter()
        .filter(|product| matches_query(product, &query))
        .cloned()
        .collect()
}

fn matches_query(product: &Product, query: &str) -> bool {
    searchable_fields(product)
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(query))
}

fn searchable_fields(product: &Product) -> [Option<String>; 9] {
    [
        Some(product.name.clone()),
        Some(product.brand.clone()),
        product.article_number.clone(),
        product.code.clone(),
        product.country.clone(),
        Some(product.description.clone()),
        Some(product.price.to_string()),
        product.original_price.map(|price| price.to_string()),
        Some(product.id.0.clone()),
    ]
}

/// Stable sort by the chosen column; `None` is the identity. Descending
/// reverses the comparator polarity, never the output array, so equal keys
/// keep their original relative order in both directions.
pub fn sort_products(
    products: &[Product],
    field: Option<SortField>,
    direction: SortDirection,
) -> Vec<Product> {
    let Some(field) = field else {
        return products.to_vec();
    };
    let mut sorted = products.to_vec();
    sorted.sort_by(|a, b| {
        let ordering = if field.is_numeric() {
            numeric_key(a, field).total_cmp(&numeric_key(b, field))
        } else {
            text_key(a, field).cmp(&text_key(b, field))
        };
        match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
    sorted
}

/// Filter first, then sort; the two are independent.
pub fn derive_view(products: &[Product], spec: &ViewSpec) -> Vec<Product> {
    let filtered = filter_products(products, &spec.search);
    sort_products(&filtered, spec.sort_field, spec.sort_direction)
}

fn numeric_key(product: &Product, field: SortField) -> f64 {
    match field {
        SortField::Price => product.price,
        SortField::OriginalPrice => product.original_price.unwrap_or(0.0),
        SortField::Rating => product.rating.unwrap_or(0.0),
        SortField::ReviewCount => product.review_count.map(f64::from).unwrap_or(0.0),
        SortField::Discount => product.discount.map(f64::from).unwrap_or(0.0),
        _ => 0.0,
    }
}

fn text_key(product: &Product, field: SortField) -> String {
    let value = match field {
        SortField::Id => Some(product.id.0.as_str()),
        SortField::Name => Some(product.name.as_str()),
        SortField::Brand => Some(product.brand.as_str()),
        SortField::ArticleNumber => product.article_number.as_deref(),
        SortField::Country => product.country.as_deref(),
        SortField::Code => product.code.as_deref(),
        SortField::Description => Some(product.description.as_str()),
        _ => None,
    };
    value.unwrap_or("").to_lowercase()
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
