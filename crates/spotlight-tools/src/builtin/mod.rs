pub mod calculator;
pub mod time;
