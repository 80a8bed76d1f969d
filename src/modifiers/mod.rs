// Built-in modifier families

pub mod advanced;
pub mod date;
pub mod logical;
pub mod math;
pub mod path;
pub mod text;

use crate::domain::template::ModifierRegistry;

/// Register every built-in family
pub fn register_builtins(registry: &mut ModifierRegistry) {
    text::register(registry);
    date::register(registry);
    math::register(registry);
    logical::register(registry);
    path::register(registry);
    advanced::register(registry);
}

/// Positional argument, if present
pub(crate) fn arg(args: &[String], index: usize) -> Option<&str> {
    args.get(index).map(|s| s.as_str())
}
