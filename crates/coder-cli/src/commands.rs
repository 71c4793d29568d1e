pub mod agent;
pub mod complete;
