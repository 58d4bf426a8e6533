pub mod columns;
pub mod config;
pub mod frame;
pub mod model;
pub mod smoke;
pub mod util;
pub mod xgb_json;
