//! Adapters that refuse every operation without touching the network.
//!
//! The `define_unavailable_adapter!` macro generates a unit struct and an
//! [`EngineAdapter`](crate::adapters::EngineAdapter) implementation whose
//! methods all fail with the same error. It covers the switched-off document
//! store and engines whose driver feature was not compiled in.
//!
//! # Example
//!
//! ```rust,ignore
//! define_unavailable_adapter!(
//!     /// Adapter for the switched-off document store.
//!     MongoAdapter,
//!     EngineType::MongoDB,
//!     EngineError::disabled
//! );
//! ```

/// Generates an adapter whose every operation fails immediately.
///
/// # Parameters
///
/// - `$adapter_name`: name of the generated unit struct
/// - `$engine`: the `EngineType` the adapter reports
/// - `$error`: `fn(EngineType) -> EngineError` building the failure
macro_rules! define_unavailable_adapter {
    (
        $(#[$meta:meta])*
        $adapter_name:ident,
        $engine:expr,
        $error:path
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $adapter_name;

        #[async_trait::async_trait]
        impl $crate::adapters::EngineAdapter for $adapter_name {
            fn engine(&self) -> $crate::models::EngineType {
                $engine
            }

            async fn probe(
                &self,
                _target: &$crate::dsn::ConnectionTarget,
            ) -> $crate::adapters::EngineResult<()> {
                Err($error($engine))
            }

            async fn check_database_exists(
                &self,
                _target: &$crate::dsn::ConnectionTarget,
                _database: &str,
            ) -> $crate::adapters::EngineResult<bool> {
                Err($error($engine))
            }

            async fn list_tables(
                &self,
                _target: &$crate::dsn::ConnectionTarget,
                _database: Option<&str>,
            ) -> $crate::adapters::EngineResult<Vec<String>> {
                Err($error($engine))
            }

            async fn preview_rows(
                &self,
                _target: &$crate::dsn::ConnectionTarget,
                _table: &str,
                _limit: u32,
            ) -> $crate::adapters::EngineResult<Vec<$crate::models::Row>> {
                Err($error($engine))
            }
        }
    };
}
