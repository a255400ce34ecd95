//! Error types for the simulation crate

use thiserror::Error;

use crate::sim::EntityId;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Tic duration must be positive and finite, got {0}")]
    InvalidTicDuration(f32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid terrain: {0}")]
    InvalidTerrain(String),

    #[error("No such entity: {0}")]
    NoSuchEntity(EntityId),

    #[error("Food {0} is still in flight")]
    FoodInFlight(EntityId),

    #[error("Expected {expected} bots but only {found} materialized within {tics} tics")]
    EntityBudgetExhausted { expected: usize, found: usize, tics: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
