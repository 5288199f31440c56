//! Catalog classification lookups (brands, animals, lines, ages, sizes).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLine {
    pub id: i64,
    pub name: String,
    pub brand_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubProductLine {
    pub id: i64,
    pub name: String,
    pub product_line: ProductLine,
}

/// Everything the product form needs, each list sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogAttributes {
    pub brands: Vec<NamedRef>,
    pub animals: Vec<NamedRef>,
    pub lines: Vec<ProductLine>,
    pub sub_product_lines: Vec<SubProductLine>,
    pub animal_ages: Vec<NamedRef>,
    pub animal_sizes: Vec<NamedRef>,
}

impl CatalogAttributes {
    pub fn sorted(mut self) -> Self {
        self.brands.sort_by(|a, b| a.name.cmp(&b.name));
        self.animals.sort_by(|a, b| a.name.cmp(&b.name));
        self.lines.sort_by(|a, b| a.name.cmp(&b.name));
        self.sub_product_lines.sort_by(|a, b| a.name.cmp(&b.name));
        self.animal_ages.sort_by(|a, b| a.name.cmp(&b.name));
        self.animal_sizes.sort_by(|a, b| a.name.cmp(&b.name));
        self
    }
}
