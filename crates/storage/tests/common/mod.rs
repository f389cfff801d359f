pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{new_backend, patterned_bytes};
