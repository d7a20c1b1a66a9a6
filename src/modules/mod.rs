pub mod demo;

use crate::core::registry::Registry;
use crate::utils::error::Result;

/// 載入所有內建模組
pub fn builtin_registry() -> Result<Registry> {
    let mut registry = Registry::new();
    registry.register(demo::module()?)?;
    Ok(registry)
}
