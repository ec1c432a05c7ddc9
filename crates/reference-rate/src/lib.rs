//! Reference Rate Module
//!
//! Fetches the CME CF Bitcoin Reference Rate (New York variant), a once a day
//! (4pm ET) benchmark price in US dollars per bitcoin, and caches it for the
//! flow calculations of every watched fund.

pub mod cache;
pub mod client;

pub use cache::{select_price, ReferencePriceCache};
pub use client::{parse_reference_rates, CmeReferenceRateClient};
