//! Database layer: async connection pool and embedded migrations.

mod pool;

pub use pool::{establish_async_connection_pool, run_migrations, AsyncDbPool, MIGRATIONS};
