pub mod data_delete;
pub mod upload;
