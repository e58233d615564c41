pub mod observations;
pub mod raw_payloads;
