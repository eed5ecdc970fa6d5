pub mod bands;

pub use bands::{BB_MULTIPLIER, BB_PERIOD, Bands, compute_bands};
