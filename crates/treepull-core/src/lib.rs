pub mod category;
pub(crate) mod command_adapter;
pub mod command_runner;
pub mod config;
pub mod controller;
pub mod doctor;
pub mod git;
pub mod history;
pub mod lifecycle;
pub mod listing;
pub mod names;
pub mod placement;
pub mod selection;
pub mod snapshot;
#[cfg(test)]
pub(crate) mod test_support;
pub mod time;
pub mod transport;
pub mod tree;
