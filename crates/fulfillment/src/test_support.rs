use common::CustomerId;

use crate::sale::{Customer, Sale, SaleItem, ShippingAddress};

pub(crate) fn sample_sale() -> Sale {
    Sale::new(
        Customer {
            id: CustomerId::new(),
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
        },
        ShippingAddress {
            street: "Av. Corrientes 1234".to_string(),
            city: "Buenos Aires".to_string(),
            province: "CABA".to_string(),
            postal_code: "C1043".to_string(),
        },
    )
    .with_item(SaleItem::new("SKU-001", "Widget", 2, 1000))
    .with_item(SaleItem::new("SKU-002", "Gadget", 1, 2500))
}
