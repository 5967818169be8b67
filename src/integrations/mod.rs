//! External service integrations.

pub mod dadata {
    pub use crate::dadata_client::*;
    pub use crate::dadata_models::*;
}

pub mod storage {
    pub use crate::db_storage::*;
    pub use crate::memory_storage::*;
}
