//! JSON 저장소

mod store;

pub use store::{write_atomic, JsonStore};
