//! Built-in jurisdiction drivers.

pub mod colorado;

pub use colorado::ColoradoDriver;

use crate::driver::{DriverContext, JurisdictionDriver};
use std::sync::Arc;

/// Every built-in driver, sharing one context.
pub fn builtin(ctx: &Arc<DriverContext>) -> Vec<Arc<dyn JurisdictionDriver>> {
    vec![Arc::new(ColoradoDriver::new(Arc::clone(ctx)))]
}
