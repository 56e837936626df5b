pub mod constants;
pub mod crypto;
pub mod serde_helper;
