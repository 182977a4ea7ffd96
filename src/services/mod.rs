//! Business logic services

pub mod catalog;
pub mod inventory;
pub mod loans;

use std::sync::Arc;

use crate::repository::LoanStore;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
}

impl Services {
    /// Create all services over the given store
    pub fn new(store: Arc<dyn LoanStore>) -> Self {
        Self {
            catalog: catalog::CatalogService::new(store.clone()),
            loans: loans::LoansService::new(store),
        }
    }
}
