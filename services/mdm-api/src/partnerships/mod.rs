//! Partnership records: model, statement construction, and storage.

pub mod csv;
pub mod error;
pub mod model;
pub mod query;
pub mod store;

pub use error::{PartnershipError, ValidationError};
pub use model::{
    CreatePartnership, Partnership, PartnershipPatch, PartnershipStatus, Patch, SourceType,
};
pub use query::{Pagination, PartnershipFilter};
pub use store::{BulkCreateOutcome, PartnershipStats, PartnershipStore};
