// HTTP handlers

pub mod tokens;
