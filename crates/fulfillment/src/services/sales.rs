//! Sale repository trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::SaleId;
use tokio::sync::RwLock;

use crate::error::{FulfillmentError, Result};
use crate::sale::{InvoicingStatus, Sale};

/// Persistence for sales.
#[async_trait]
pub trait SaleRepository: Send + Sync {
    async fn get(&self, id: SaleId) -> Result<Option<Sale>>;

    /// Inserts or replaces a sale.
    async fn save(&self, sale: Sale) -> Result<()>;

    /// Records the carrier tracking number on an existing sale.
    async fn set_tracking_number(&self, id: SaleId, tracking_number: &str) -> Result<()>;

    async fn set_invoicing_status(&self, id: SaleId, status: InvoicingStatus) -> Result<()>;
}

#[derive(Debug, Default)]
struct InMemorySalesState {
    sales: HashMap<SaleId, Sale>,
    fail_on_update: bool,
}

/// In-memory sale repository.
#[derive(Debug, Clone, Default)]
pub struct InMemorySaleRepository {
    state: Arc<RwLock<InMemorySalesState>>,
}

impl InMemorySaleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent update fail.
    pub async fn set_fail_on_update(&self, fail: bool) {
        self.state.write().await.fail_on_update = fail;
    }

    pub async fn sale_count(&self) -> usize {
        self.state.read().await.sales.len()
    }

    async fn update(&self, id: SaleId, apply: impl FnOnce(&mut Sale) + Send) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_update {
            return Err(FulfillmentError::Repository(
                "Sale store unavailable".to_string(),
            ));
        }

        let sale = state
            .sales
            .get_mut(&id)
            .ok_or(FulfillmentError::SaleNotFound(id))?;
        apply(sale);
        Ok(())
    }
}

#[async_trait]
impl SaleRepository for InMemorySaleRepository {
    async fn get(&self, id: SaleId) -> Result<Option<Sale>> {
        Ok(self.state.read().await.sales.get(&id).cloned())
    }

    async fn save(&self, sale: Sale) -> Result<()> {
        self.state.write().await.sales.insert(sale.id, sale);
        Ok(())
    }

    async fn set_tracking_number(&self, id: SaleId, tracking_number: &str) -> Result<()> {
        let tracking_number = tracking_number.to_string();
        self.update(id, move |sale| sale.tracking_number = Some(tracking_number))
            .await
    }

    async fn set_invoicing_status(&self, id: SaleId, status: InvoicingStatus) -> Result<()> {
        self.update(id, move |sale| sale.invoicing_status = status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_sale;

    #[tokio::test]
    async fn save_and_get() {
        let repo = InMemorySaleRepository::new();
        let sale = sample_sale();

        repo.save(sale.clone()).await.unwrap();

        assert_eq!(repo.get(sale.id).await.unwrap(), Some(sale));
        assert_eq!(repo.sale_count().await, 1);
        assert!(repo.get(SaleId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn updates_existing_sale() {
        let repo = InMemorySaleRepository::new();
        let sale = sample_sale();
        repo.save(sale.clone()).await.unwrap();

        repo.set_tracking_number(sale.id, "TRACK-0001").await.unwrap();
        repo.set_invoicing_status(sale.id, InvoicingStatus::Pending)
            .await
            .unwrap();

        let stored = repo.get(sale.id).await.unwrap().unwrap();
        assert_eq!(stored.tracking_number.as_deref(), Some("TRACK-0001"));
        assert_eq!(stored.invoicing_status, InvoicingStatus::Pending);
    }

    #[tokio::test]
    async fn update_of_missing_sale_fails() {
        let repo = InMemorySaleRepository::new();
        let id = SaleId::new();

        let result = repo.set_invoicing_status(id, InvoicingStatus::Pending).await;
        assert!(matches!(result, Err(FulfillmentError::SaleNotFound(missing)) if missing == id));
    }

    #[tokio::test]
    async fn fail_on_update() {
        let repo = InMemorySaleRepository::new();
        let sale = sample_sale();
        repo.save(sale.clone()).await.unwrap();
        repo.set_fail_on_update(true).await;

        let result = repo.set_tracking_number(sale.id, "TRACK-0001").await;
        assert!(matches!(result, Err(FulfillmentError::Repository(_))));
    }
}
