pub mod generate;
pub mod health;
pub mod metrics;
pub mod status;
