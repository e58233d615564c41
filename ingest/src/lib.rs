//! Hourly air quality ingestion: fetch per-city time series from the
//! Open-Meteo air quality API, flatten them into per-pollutant observations
//! and store both the raw response and the observations with deduplication.

pub mod cities;
pub mod cli;
pub mod config;
pub mod db;
pub mod models;
pub mod normalize;
pub mod open_meteo;
pub mod pipeline;
pub mod repos;
pub mod retry;
pub mod store;
