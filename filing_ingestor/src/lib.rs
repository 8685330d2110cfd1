//! Network side of the fund holdings pipeline.
//!
//! This crate owns everything that talks to an external service:
//! - [`client`]: a rate-limited, retrying HTTP request executor shared by all
//!   callers, with a [`client::Transport`] seam for offline tests.
//! - [`edgar`]: the filing discovery scraper (series/class lookup pages,
//!   filings-by-series pages, primary document downloads).
//! - [`figi`]: the OpenFIGI mapping client that resolves CUSIP/ISIN
//!   identifiers to ticker symbols.
//! - [`nport`]: a streaming parser for N-PORT primary documents.
//!
//! It deliberately knows nothing about persistence; candidates and parsed
//! documents are handed to the store crate as plain structs ([`models`]).

pub mod client;
pub mod edgar;
pub mod figi;
pub mod models;
pub mod nport;
