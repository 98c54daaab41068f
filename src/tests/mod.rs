#[cfg(test)]
pub mod common;

mod bootstrap_rebuild;
