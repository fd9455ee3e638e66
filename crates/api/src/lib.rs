//! HTTP API for the Product and Transaction services.

pub mod app;
