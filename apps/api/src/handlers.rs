pub mod health;
pub mod rows;
