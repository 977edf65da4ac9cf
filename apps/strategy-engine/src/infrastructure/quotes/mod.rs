//! Quote source adapters.

mod static_source;

pub use static_source::StaticQuoteSource;
