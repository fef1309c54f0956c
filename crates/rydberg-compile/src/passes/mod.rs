//! Built-in compilation passes.
//!
//! Passes run in two groups:
//! - binding and normalization ([`AssignVariables`], [`RecordScan`],
//!   [`Normalize`]), which every target needs
//! - [`validate`]: target-specific checks that read the capabilities from
//!   the [`PropertySet`](crate::PropertySet)

pub mod binding;
pub mod normalize;
pub mod validate;

pub use binding::{AssignVariables, RecordScan};
pub use normalize::{ChannelKey, Normalize, is_normalized, normalize_sequence};
pub use validate::{
    ValidateDeviceLimits, ValidateGeometry, ValidateLevelCoupling, ValidateSpatialModulation,
    ValidateWaveforms,
};
