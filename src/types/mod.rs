pub mod reading;
pub mod weather;
