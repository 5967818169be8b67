// Thin namespace wrapper for API-layer components
pub mod handlers {
    pub use crate::handlers::*;
}

pub mod router {
    pub use crate::router::*;
}

pub mod openapi {
    pub use crate::openapi::*;
}
