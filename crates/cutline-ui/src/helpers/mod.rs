// crates/cutline-ui/src/helpers/mod.rs

pub mod format;
