pub mod aggregate;
pub mod branches;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod github;
pub mod model;
pub mod normalize;
pub mod report;
pub mod roster;
pub mod session;
pub mod util;
pub mod weekly;
pub mod window;

pub use error::{Result, TrendError};
