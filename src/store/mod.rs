//! Persistence backends for users and tokens.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;
