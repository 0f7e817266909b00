//! Application state shared across request handlers.

use std::sync::Arc;

use mdm_warehouse::Warehouse;

use crate::auth::Authenticator;
use crate::partnerships::PartnershipStore;

/// Shared application state.
///
/// Built once at startup and passed to handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    authenticator: Authenticator,
    partnerships: PartnershipStore,
    warehouse: Arc<dyn Warehouse>,
}

impl AppState {
    pub fn new(
        authenticator: Authenticator,
        partnerships: PartnershipStore,
        warehouse: Arc<dyn Warehouse>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                authenticator,
                partnerships,
                warehouse,
            }),
        }
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.inner.authenticator
    }

    pub fn partnerships(&self) -> &PartnershipStore {
        &self.inner.partnerships
    }

    pub fn warehouse(&self) -> &Arc<dyn Warehouse> {
        &self.inner.warehouse
    }
}
