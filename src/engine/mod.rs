pub mod constants;
pub mod decay;
pub mod error;
pub mod history;
pub mod orchestrator;
pub mod partitions;
pub mod points;
pub mod positions;
pub mod ranking_model;
pub mod standings;
pub mod structures;
