pub mod app;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod ledger;
pub mod reconciler;
pub mod stream;
pub mod types;
pub mod ui;
pub mod wallet;

#[cfg(test)]
mod test_support;
