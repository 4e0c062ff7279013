//! Reserve/consume request shapes and their validation.
//!
//! The wire shape ([`StockRequest`]) is permissive on purpose so that a missing
//! product id or a negative quantity surfaces as `InvalidRequest` with a precise
//! message instead of a deserializer error. [`Batch`] is the validated form the
//! engines accept.

use serde::{Deserialize, Serialize};

use lotkeeper_core::ProductId;

use crate::error::BatchError;

/// `{ "items": [ { "product_id": "...", "quantity": 3 } ] }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRequest {
    #[serde(default)]
    pub items: Vec<RequestedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedItem {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
}

impl RequestedItem {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        Self {
            product_id: Some(product_id.into()),
            quantity: Some(quantity),
        }
    }
}

/// A validated line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: u64,
}

/// A non-empty list of line items with positive quantities.
///
/// Repeated product ids are kept as separate entries; nothing is merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    items: Vec<LineItem>,
}

impl Batch {
    pub fn new(items: Vec<LineItem>) -> Result<Self, BatchError> {
        if items.is_empty() {
            return Err(BatchError::invalid("items must not be empty"));
        }
        if let Some(idx) = items.iter().position(|item| item.quantity == 0) {
            return Err(BatchError::invalid(format!(
                "item {idx}: quantity must be greater than zero"
            )));
        }
        Ok(Self { items })
    }

    /// Convenience for callers that already hold typed ids.
    pub fn of<I, P>(items: I) -> Result<Self, BatchError>
    where
        I: IntoIterator<Item = (P, u64)>,
        P: AsRef<str>,
    {
        let mut lines = Vec::new();
        for (idx, (product_id, quantity)) in items.into_iter().enumerate() {
            let product_id = ProductId::parse(product_id)
                .map_err(|e| BatchError::invalid(format!("item {idx}: {e}")))?;
            lines.push(LineItem { product_id, quantity });
        }
        Self::new(lines)
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Distinct products in order of first appearance.
    pub fn products(&self) -> Vec<ProductId> {
        let mut seen: Vec<ProductId> = Vec::new();
        for item in &self.items {
            if !seen.contains(&item.product_id) {
                seen.push(item.product_id.clone());
            }
        }
        seen
    }

    /// Sum of quantities requested for one product across all entries.
    pub fn quantity_for(&self, product_id: &ProductId) -> u64 {
        self.items
            .iter()
            .filter(|item| &item.product_id == product_id)
            .fold(0u64, |acc, item| acc.saturating_add(item.quantity))
    }
}

impl TryFrom<StockRequest> for Batch {
    type Error = BatchError;

    fn try_from(request: StockRequest) -> Result<Self, Self::Error> {
        if request.items.is_empty() {
            return Err(BatchError::invalid("items must not be empty"));
        }

        let mut lines = Vec::with_capacity(request.items.len());
        for (idx, item) in request.items.into_iter().enumerate() {
            let raw_id = item
                .product_id
                .ok_or_else(|| BatchError::invalid(format!("item {idx}: product_id is required")))?;
            let product_id = ProductId::parse(&raw_id)
                .map_err(|_| BatchError::invalid(format!("item {idx}: product_id must not be empty")))?;

            let quantity = match item.quantity {
                None => {
                    return Err(BatchError::invalid(format!("item {idx}: quantity is required")));
                }
                Some(q) if q <= 0 => {
                    return Err(BatchError::invalid(format!(
                        "item {idx}: quantity must be greater than zero (got {q})"
                    )));
                }
                Some(q) => q as u64,
            };

            lines.push(LineItem { product_id, quantity });
        }

        Batch::new(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(items: Vec<RequestedItem>) -> StockRequest {
        StockRequest { items }
    }

    fn invalid_message(result: Result<Batch, BatchError>) -> String {
        match result {
            Err(BatchError::InvalidRequest(msg)) => msg,
            other => panic!("expected InvalidRequest, got {other:?}"),
        }
    }

    #[test]
    fn valid_request_becomes_batch() {
        let batch = Batch::try_from(request(vec![
            RequestedItem::new("P1", 3),
            RequestedItem::new(" P2 ", 1),
        ]))
        .unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.items()[1].product_id.as_str(), "P2");
        assert_eq!(batch.items()[0].quantity, 3);
    }

    #[test]
    fn empty_item_list_is_invalid() {
        let msg = invalid_message(Batch::try_from(StockRequest::default()));
        assert!(msg.contains("must not be empty"));
    }

    #[test]
    fn missing_or_blank_product_id_is_invalid() {
        let missing = RequestedItem {
            product_id: None,
            quantity: Some(1),
        };
        assert!(invalid_message(Batch::try_from(request(vec![missing]))).contains("item 0"));

        let blank = RequestedItem::new("   ", 1);
        let msg = invalid_message(Batch::try_from(request(vec![RequestedItem::new("P1", 1), blank])));
        assert!(msg.contains("item 1"));
    }

    #[test]
    fn non_positive_quantity_is_invalid() {
        let msg = invalid_message(Batch::try_from(request(vec![RequestedItem::new("P1", -2)])));
        assert!(msg.contains("got -2"));
        assert!(Batch::try_from(request(vec![RequestedItem::new("P1", 0)])).is_err());

        let no_qty = RequestedItem {
            product_id: Some("P1".into()),
            quantity: None,
        };
        assert!(Batch::try_from(request(vec![no_qty])).is_err());
    }

    #[test]
    fn wire_shape_tolerates_missing_fields() {
        let parsed: StockRequest = serde_json::from_str(r#"{"items":[{"quantity":2}]}"#).unwrap();
        assert_eq!(parsed.items[0].product_id, None);
        assert!(Batch::try_from(parsed).is_err());
    }

    #[test]
    fn duplicate_products_are_kept_separate() {
        let batch = Batch::of([("P1", 2), ("P2", 1), ("P1", 3)]).unwrap();

        assert_eq!(batch.len(), 3);
        let products: Vec<_> = batch.products().into_iter().map(String::from).collect();
        assert_eq!(products, vec!["P1", "P2"]);
        assert_eq!(batch.quantity_for(&ProductId::parse("P1").unwrap()), 5);
    }

    #[test]
    fn zero_quantity_line_item_is_invalid() {
        assert!(matches!(Batch::of([("P1", 0)]), Err(BatchError::InvalidRequest(_))));
    }
}
