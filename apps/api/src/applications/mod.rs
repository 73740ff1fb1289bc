pub mod dedup;
pub mod export;
pub mod handlers;
pub mod store;
pub mod validation;
