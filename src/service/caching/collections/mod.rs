pub mod events;
pub mod outcomes;
pub mod prices;
pub mod tickers;
