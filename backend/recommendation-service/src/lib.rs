pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod services;
pub mod sources;
pub mod utils;

pub use config::Config;
pub use error::{RecommendationError, Result};
pub use jobs::{ModelRefresher, RefreshReport, RefreshScheduler};
pub use models::{
    EngineStats, Feedback, Interaction, ItemContent, ItemId, Recommendation,
    RecommendationReason, Strategy, UserId,
};
pub use services::RecommendationEngine;
pub use sources::{CatalogReader, InMemoryCatalog, InMemoryInteractionLog, InteractionReader};
