//! listingscout - scheduled real-estate listing scraper.
//!
//! Periodically searches a listing provider for every active search
//! configuration, normalizes listing attribution, replaces the stored
//! properties per search term and records each run in an execution log.
//! Listing agents found in stored properties can be messaged over SMS.

pub mod cli;
pub mod config;
pub mod models;
pub mod repository;
pub mod schema;
pub mod scrapers;
pub mod services;
