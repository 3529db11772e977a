pub mod hrv;
pub mod intervals;
pub mod irregularity;
