//! All-or-nothing stock admission for an order.

use crate::model::{LineItemRequest, StockQuote};

/// Outcome of checking an order's line items against a stock quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Every line item is covered.
    Admitted,
    /// The first line item (in request order) that is not covered.
    Rejected {
        /// SKU of that line
        sku: String,
        /// Quantity asked for on that line
        requested: u32,
        /// Quantity the stock quote reported (0 if the SKU was absent)
        available: u32,
    },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

/// Decides whether a quote covers an order.
///
/// Each line item is checked on its own against the quoted quantity for its SKU; a SKU the
/// quote does not mention counts as zero available. Repeated SKUs are not summed.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderAdmissionPolicy;

impl OrderAdmissionPolicy {
    pub fn decide(&self, line_items: &[LineItemRequest], quote: &StockQuote) -> Admission {
        line_items
            .iter()
            .find_map(|item| {
                let available = quote.available(&item.sku_code).unwrap_or(0);
                (available < item.quantity).then(|| Admission::Rejected {
                    sku: item.sku_code.clone(),
                    requested: item.quantity,
                    available,
                })
            })
            .unwrap_or(Admission::Admitted)
    }
}
