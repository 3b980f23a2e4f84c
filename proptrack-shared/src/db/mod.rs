/// Database layer
///
/// - `pool`: PostgreSQL connection pool with health check
/// - `migrations`: Embedded migration runner
///
/// Row types and their queries are in `models`; the `Store` implementations
/// that compose them are in `store`.

pub mod migrations;
pub mod pool;
