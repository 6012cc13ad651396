// Library for tests to access modules

pub mod alerts;
pub mod config;
pub mod live_queue;
pub mod models;
pub mod report;
pub mod rollup;
pub mod routes;
pub mod sample_store;
pub mod sampler;
pub mod scheduler;
