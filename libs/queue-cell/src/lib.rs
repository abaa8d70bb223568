pub mod models;
pub mod services;
pub mod store;
pub mod error;
pub mod handlers;
pub mod router;

pub use models::*;
pub use error::*;
pub use services::*;
pub use store::{InMemoryQueueStore, MemorySeed, QueueStore, SupabaseQueueStore};
pub use handlers::QueueState;
pub use router::queue_routes;
