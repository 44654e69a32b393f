pub mod job;
pub mod product;
