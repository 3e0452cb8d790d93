//! Thin client for the third-party media host (Cloudinary unsigned upload).
//! Uploaded event images are stored remotely; only the returned secure URL
//! is persisted.

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::info;

use crate::utils::error::AppError;

const UPLOAD_FOLDER: &str = "DevEvent";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Clone)]
pub struct MediaClient {
    http: reqwest::Client,
    upload_url: String,
    upload_preset: String,
}

impl MediaClient {
    pub fn new(cloud_name: &str, upload_preset: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            upload_url: format!("https://api.cloudinary.com/v1_1/{cloud_name}/image/upload"),
            upload_preset: upload_preset.to_string(),
        }
    }

    /// Uploads image bytes and returns the hosted secure URL.
    pub async fn upload_image(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<String, AppError> {
        let part = Part::bytes(bytes).file_name(filename.to_string());
        let form = Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone())
            .text("folder", UPLOAD_FOLDER);

        let response = self
            .http
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Image upload failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "Image upload failed with status {}",
                response.status()
            )));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Invalid upload response: {e}")))?;

        info!(url = %body.secure_url, "Image uploaded to media host");
        Ok(body.secure_url)
    }
}
