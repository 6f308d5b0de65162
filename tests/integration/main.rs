//! Integration tests: drive the full router + coordinator + aggregator
//! stack with fake stage capabilities over a temp media root.

mod api;
mod helpers;
mod scenarios;
