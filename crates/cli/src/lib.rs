#![forbid(unsafe_code)]

mod runner;

pub use runner::{Runner, load_script};
