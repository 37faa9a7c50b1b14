pub mod analyze;
pub mod health;
pub mod static_assets;
