pub mod agent;
pub mod errors;
pub mod filesystem;
pub mod models;
pub mod patch;
pub mod providers;
pub mod sandbox;
pub mod shell;
pub mod tool;
