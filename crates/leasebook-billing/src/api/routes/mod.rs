pub mod contracts;
pub mod health;
pub mod receivables;
