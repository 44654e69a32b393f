pub mod categories;
pub mod dedup;
pub mod feed;
pub mod runner;
