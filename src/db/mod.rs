pub mod repository;
pub mod schema;
