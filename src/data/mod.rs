//! Data Normalization Module
//!
//! Element-wise scalers applied to model inputs and outputs:
//! - Identity, max, z-score, min-max and log scaling
//! - Fitted from data or built from known statistics

pub mod scaler;

pub use scaler::{
    LogScaler, MinMax01Scaler, MinMax11Scaler, NoneScaler, NormalScaler, Scaler, StandardScaler,
};
