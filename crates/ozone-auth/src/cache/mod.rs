//! Caching of introspection results.

mod introspection;

pub use introspection::{
    CacheStats, IntrospectionCache, LocalIntrospectionCache, NoOpIntrospectionCache,
    create_introspection_cache, introspection_expiry, introspection_ttl, spawn_cleanup_task,
};
