pub mod caching;
pub mod events;
pub mod finance;
pub mod outcomes;
pub mod pipeline;
