//! Product catalog: default rates for line items and optional stock tracking.

use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, ErrorKind},
    money::{
        deserialize_bigdecimal, deserialize_optional_bigdecimal, serialize_bigdecimal,
        serialize_optional_bigdecimal,
    },
    totals::{LineItemInput, LineItemInputBuilder},
};

/// A sellable product with its default unit rate and GST rate.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into), pattern = "owned")]
pub struct Product {
    reference: String,
    name: String,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    unit_rate: BigDecimal,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    gst_rate_percent: BigDecimal,
    /// Units on hand; `None` means stock is not tracked for this product.
    #[builder(setter(into, strip_option), default)]
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_bigdecimal",
        deserialize_with = "deserialize_optional_bigdecimal"
    )]
    stock: Option<BigDecimal>,
}

impl Product {
    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit_rate(&self) -> &BigDecimal {
        &self.unit_rate
    }

    pub fn gst_rate_percent(&self) -> &BigDecimal {
        &self.gst_rate_percent
    }

    pub fn stock(&self) -> Option<&BigDecimal> {
        self.stock.as_ref()
    }
}

/// A line as requested by a user: a product and a quantity, optionally overriding the
/// catalog's rates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineRequest {
    product_reference: String,
    #[serde(
        serialize_with = "serialize_bigdecimal",
        deserialize_with = "deserialize_bigdecimal"
    )]
    quantity: BigDecimal,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_bigdecimal",
        deserialize_with = "deserialize_optional_bigdecimal"
    )]
    unit_rate: Option<BigDecimal>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_bigdecimal",
        deserialize_with = "deserialize_optional_bigdecimal"
    )]
    gst_rate_percent: Option<BigDecimal>,
}

impl LineRequest {
    pub fn new(product_reference: impl Into<String>, quantity: impl Into<BigDecimal>) -> Self {
        Self {
            product_reference: product_reference.into(),
            quantity: quantity.into(),
            unit_rate: None,
            gst_rate_percent: None,
        }
    }

    pub fn with_unit_rate(self, unit_rate: impl Into<BigDecimal>) -> Self {
        Self {
            unit_rate: Some(unit_rate.into()),
            ..self
        }
    }

    pub fn with_gst_rate_percent(self, gst_rate_percent: impl Into<BigDecimal>) -> Self {
        Self {
            gst_rate_percent: Some(gst_rate_percent.into()),
            ..self
        }
    }

    pub fn product_reference(&self) -> &str {
        &self.product_reference
    }
}

/// Products keyed by reference. Serialized as a plain list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Product>", into = "Vec<Product>")]
pub struct Catalog {
    products: BTreeMap<String, Product>,
}

impl From<Vec<Product>> for Catalog {
    fn from(products: Vec<Product>) -> Self {
        Self::new(products)
    }
}

impl From<Catalog> for Vec<Product> {
    fn from(catalog: Catalog) -> Self {
        catalog.products.into_values().collect()
    }
}

impl Catalog {
    /// Build a catalog; a later product replaces an earlier one with the same reference.
    pub fn new(products: impl IntoIterator<Item = Product>) -> Self {
        Self {
            products: products
                .into_iter()
                .map(|p| (p.reference.clone(), p))
                .collect(),
        }
    }

    pub fn get(&self, reference: &str) -> Option<&Product> {
        self.products.get(reference)
    }

    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }

    /// Turn a request into a line item, filling missing rates from the catalog.
    ///
    /// # Errors
    /// [`ErrorKind::UnknownProduct`] if the reference is not in the catalog.
    ///
    /// # Example
    /// ```rust
    /// use gst_invoice::{Catalog, LineRequest, ProductBuilder};
    /// use bigdecimal::BigDecimal;
    ///
    /// let catalog = Catalog::new([ProductBuilder::default()
    ///     .reference("TEA-250")
    ///     .name("Assam tea 250g")
    ///     .unit_rate(120)
    ///     .gst_rate_percent(5)
    ///     .build()
    ///     .unwrap()]);
    /// let line = catalog.resolve(&LineRequest::new("TEA-250", 3).with_unit_rate(110)).unwrap();
    /// assert_eq!(line.unit_rate(), &BigDecimal::from(110));
    /// assert_eq!(line.gst_rate_percent(), &BigDecimal::from(5));
    /// ```
    pub fn resolve(&self, request: &LineRequest) -> Result<LineItemInput, Error> {
        let product = self.get(&request.product_reference).ok_or_else(|| {
            Error::from(ErrorKind::UnknownProduct(request.product_reference.clone()))
        })?;
        LineItemInputBuilder::default()
            .product_reference(product.reference.clone())
            .quantity(request.quantity.clone())
            .unit_rate(
                request
                    .unit_rate
                    .clone()
                    .unwrap_or_else(|| product.unit_rate.clone()),
            )
            .gst_rate_percent(
                request
                    .gst_rate_percent
                    .clone()
                    .unwrap_or_else(|| product.gst_rate_percent.clone()),
            )
            .build()
            .map_err(|e| Error::from(format!("{e:?}")))
    }

    /// [`Catalog::resolve`] for every request, in order.
    pub fn resolve_all(&self, requests: &[LineRequest]) -> Result<Vec<LineItemInput>, Error> {
        requests.iter().map(|r| self.resolve(r)).collect()
    }

    /// Take the quantities of `lines` out of stock. Quantities of repeated products are added
    /// up first, and nothing changes unless every tracked product has enough stock.
    ///
    /// # Errors
    /// - [`ErrorKind::UnknownProduct`] for a line whose product is not in the catalog
    /// - [`ErrorKind::InsufficientStock`] for the first product that would go negative
    pub fn deduct_stock(&mut self, lines: &[LineItemInput]) -> Result<(), Error> {
        let mut requested: BTreeMap<&str, BigDecimal> = BTreeMap::new();
        for line in lines {
            let reference = line.product_reference();
            if !self.products.contains_key(reference) {
                return Err(Error::from(ErrorKind::UnknownProduct(reference.to_string())));
            }
            *requested.entry(reference).or_default() += line.quantity();
        }

        for (reference, quantity) in &requested {
            if let Some(available) = self.products.get(*reference).and_then(Product::stock) {
                if quantity > available {
                    return Err(Error::from(ErrorKind::InsufficientStock {
                        product: reference.to_string(),
                        requested: quantity.clone(),
                        available: available.clone(),
                    }));
                }
            }
        }

        for (reference, quantity) in requested {
            if let Some(stock) = self
                .products
                .get_mut(reference)
                .and_then(|p| p.stock.as_mut())
            {
                *stock -= quantity;
            }
        }
        Ok(())
    }
}
