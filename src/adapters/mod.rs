pub mod http;
pub mod persistence;
pub mod proof_storage;
