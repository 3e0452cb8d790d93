use std::env;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_DB_NAME: &str = "devevent";
const DEFAULT_PORT: u16 = 3001;

pub struct Config {
    pub mongodb_uri: String,
    pub db_name: String,
    pub port: u16,
    pub cloudinary_cloud_name: Option<String>,
    pub cloudinary_upload_preset: Option<String>,
}

impl Config {
    /// Reads configuration from the environment. A missing `MONGODB_URI` is
    /// startup-fatal; everything else has a default or is optional.
    pub fn from_env() -> Self {
        Self {
            mongodb_uri: env::var("MONGODB_URI")
                .expect("MONGODB_URI must be set (see .env.example)"),
            db_name: env::var("MONGODB_DB").unwrap_or_else(|_| DEFAULT_DB_NAME.to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            cloudinary_cloud_name: env::var("CLOUDINARY_CLOUD_NAME").ok(),
            cloudinary_upload_preset: env::var("CLOUDINARY_UPLOAD_PRESET").ok(),
        }
    }
}
