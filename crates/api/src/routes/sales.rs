//! Sale intake and lookup.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{CustomerId, SaleId};
use fulfillment::{
    Customer, SALE_CREATED, Sale, SaleCreated, SaleItem, SaleRepository, ShippingAddress,
};
use pipeline::RunOutcome;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateSaleRequest {
    pub customer: CustomerRequest,
    pub shipping_address: ShippingAddress,
    pub items: Vec<SaleItemRequest>,
    pub payment_state: String,
}

#[derive(Deserialize)]
pub struct CustomerRequest {
    pub id: Option<String>,
    pub name: String,
    pub email: String,
}

#[derive(Deserialize)]
pub struct SaleItemRequest {
    pub sku: String,
    pub description: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct SaleCreatedResponse {
    pub sale_id: String,
    pub outcome: RunOutcome,
}

// -- Handlers --

/// POST /sales: stores the sale and runs `sale.created` synchronously.
///
/// The pipeline only runs for approved payments; other sales are stored
/// and the outcome reports the skip.
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSaleRequest>,
) -> Result<(StatusCode, Json<SaleCreatedResponse>), ApiError> {
    let sale = build_sale(req.customer, req.shipping_address, req.items)?;

    state.sales.save(sale.clone()).await?;

    let event = SaleCreated::new(&sale, req.payment_state);
    let payload = event.to_payload()?;
    let outcome = state
        .executor
        .run_handlers_and_emit(SALE_CREATED, payload)
        .await;

    tracing::info!(
        sale_id = %sale.id,
        payment_state = %event.payment_state,
        skipped = outcome.is_skipped(),
        "sale processed"
    );

    Ok((
        StatusCode::CREATED,
        Json(SaleCreatedResponse {
            sale_id: sale.id.to_string(),
            outcome,
        }),
    ))
}

/// GET /sales/{id}: the sale as currently stored, tracking number included.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Sale>, ApiError> {
    let sale_id: SaleId = id
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid sale id: {e}")))?;

    let sale = state
        .sales
        .get(sale_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Sale {id} not found")))?;

    Ok(Json(sale))
}

fn build_sale(
    customer: CustomerRequest,
    shipping_address: ShippingAddress,
    items: Vec<SaleItemRequest>,
) -> Result<Sale, ApiError> {
    if items.is_empty() {
        return Err(ApiError::BadRequest("A sale needs at least one item".to_string()));
    }
    if let Some(item) = items.iter().find(|i| i.quantity == 0 || i.unit_price_cents < 0) {
        return Err(ApiError::BadRequest(format!(
            "Invalid quantity or price for {}",
            item.sku
        )));
    }

    let customer_id = match customer.id {
        Some(id) => {
            let uuid = uuid::Uuid::parse_str(&id)
                .map_err(|e| ApiError::BadRequest(format!("Invalid customer id: {e}")))?;
            CustomerId::from_uuid(uuid)
        }
        None => CustomerId::new(),
    };

    let sale = items.into_iter().fold(
        Sale::new(
            Customer {
                id: customer_id,
                name: customer.name,
                email: customer.email,
            },
            shipping_address,
        ),
        |sale, item| {
            sale.with_item(SaleItem::new(
                item.sku,
                item.description,
                item.quantity,
                item.unit_price_cents,
            ))
        },
    );
    if sale.total_cents().is_none() {
        return Err(ApiError::BadRequest("Sale total is too large".to_string()));
    }
    Ok(sale)
}
