pub mod brix;
pub mod ingredient;
pub mod matcher;
pub mod scaler;
