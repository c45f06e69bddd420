use serde::{Deserialize, Serialize};

use crate::domain::product::{Product, ProductId};
use crate::language::Language;

/// A product found in a message, with the name to show back in the caller's language.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogMatch {
    pub product: Product,
    pub display_name: String,
}

/// Lookup tables from localized product names to reference products.
///
/// Matching is substring containment against the whole message, so multi-word names
/// ("pomme de terre") and partial phrases both hit. Keys keep product table order and the
/// first match wins.
#[derive(Clone, Debug, Default)]
pub struct CatalogIndex {
    products: Vec<Product>,
    french: Vec<(String, usize)>,
    arabic: Vec<(String, usize)>,
    english: Vec<(String, usize)>,
}

impl CatalogIndex {
    pub fn new(products: Vec<Product>) -> Self {
        let key_table = |name_of: fn(&Product) -> String| {
            products
                .iter()
                .enumerate()
                .map(|(index, product)| (name_of(product), index))
                .filter(|(key, _)| !key.trim().is_empty())
                .collect::<Vec<_>>()
        };

        let french = key_table(|product| product.french_name.to_lowercase());
        // Arabic has no case; keys stay exact.
        let arabic = key_table(|product| product.arabic_name.clone());
        let english = key_table(|product| product.name.to_lowercase());

        Self { products, french, arabic, english }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn find(&self, product_id: ProductId) -> Option<&Product> {
        self.products.iter().find(|product| product.id == product_id)
    }

    /// Every product named in `message`, in table order.
    pub fn detect(&self, message: &str, language: Language) -> Vec<CatalogMatch> {
        let (keys, haystack) = match language {
            Language::French => (&self.french, message.to_lowercase()),
            Language::Arabic => (&self.arabic, message.to_string()),
            Language::English => (&self.english, message.to_lowercase()),
        };

        keys.iter()
            .filter(|(key, _)| haystack.contains(key.as_str()))
            .map(|(_, index)| self.to_match(*index, language))
            .collect()
    }

    /// First product named in `message`.
    pub fn resolve(&self, message: &str, language: Language) -> Option<CatalogMatch> {
        self.detect(message, language).into_iter().next()
    }

    pub fn display_name(&self, product_id: ProductId, language: Language) -> Option<String> {
        self.find(product_id).map(|product| localized_name(product, language))
    }

    fn to_match(&self, index: usize, language: Language) -> CatalogMatch {
        let product = self.products[index].clone();
        let display_name = localized_name(&product, language);
        CatalogMatch { product, display_name }
    }
}

pub fn localized_name(product: &Product, language: Language) -> String {
    match language {
        Language::French => product.french_name.clone(),
        Language::Arabic => product.arabic_name.clone(),
        Language::English => product.name.clone(),
    }
}
