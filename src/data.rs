//! # Market Data
//!
//! $$
//! P_i = \{(t_k, c_{i,k})\}_{k}, \quad t_1 < t_2 < \dots
//! $$
//!
//! Daily close series and the sources they are fetched from.

pub mod csv_source;
pub mod fetcher;
pub mod series;
pub mod source;
#[cfg(feature = "yahoo")]
pub mod yahoo;

pub use csv_source::CsvSource;
pub use fetcher::PriceSeriesFetcher;
pub use series::DailyBar;
pub use series::PriceSeries;
pub use source::InMemorySource;
pub use source::PriceSource;
#[cfg(feature = "yahoo")]
pub use yahoo::YahooSource;
