pub mod identifier;
pub mod message;
pub mod state;
pub mod tags;
