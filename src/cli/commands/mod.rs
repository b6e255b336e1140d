pub mod compile;
pub mod find;
