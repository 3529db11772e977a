pub mod buffer;
pub mod config;
pub mod detectors;
pub mod error;
pub mod filter;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod plot;
pub mod signal;
pub mod worker;

pub use config::*;
pub use error::*;
pub use pipeline::*;
pub use signal::*;
