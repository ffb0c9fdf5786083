// Library for tests to access modules

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod documents;
pub mod error;
pub mod models;
pub mod poller;
pub mod rpc;
pub mod transport;
