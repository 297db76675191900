pub mod energy;
pub mod health;
pub mod links;
