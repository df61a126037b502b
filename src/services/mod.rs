// Service exports
pub mod kv;
pub mod memory;
pub mod postgres;
pub mod rematch;
pub mod store;
pub mod supabase;

pub use kv::{KeyValueStore, KvError, MemoryStore, RedisStore, StoreKey};
pub use memory::{MemoryDirectory, MemoryMatchStore};
pub use postgres::{PostgresClient, PostgresError};
pub use rematch::{RematchDecision, RematchLimiter};
pub use store::{DirectoryError, InvestorDirectory, MatchStore, PersistenceError, StartupDirectory};
pub use supabase::{SupabaseClient, SupabaseTables};
