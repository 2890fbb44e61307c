pub mod matching;
pub mod store;
