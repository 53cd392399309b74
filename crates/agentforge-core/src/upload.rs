//! Form-level input and file uploads
//!
//! An [`AgentForm`] carries uploaded files as raw bytes. After form
//! validation it is converted into the action-level [`ForgeAgentInput`]:
//! the avatar becomes a base64 data URI and an uploaded training file is
//! decoded as UTF-8 text.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::contracts::{
    ForgeAgentInput, AGENT_FORM_SCHEMA, AVATAR_POLICY, TRAINING_FILE_POLICY,
};
use crate::engine::{check_profile, Validate, Validated, ValidationFailure, Validator};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{file_name}' is not a readable {mime_type} image")]
    UnreadableImage { file_name: String, mime_type: String },

    #[error("'{file_name}' is not valid UTF-8 text")]
    NotUtf8 { file_name: String },
}

/// A file held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| UploadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self::new(file_name, mime_from_extension(path), bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Encode as `data:<mime>;base64,<payload>`
    ///
    /// Fails when the content does not carry the signature of its declared
    /// image type.
    pub fn to_image_data_uri(&self) -> Result<String, UploadError> {
        if !has_image_signature(&self.mime_type, &self.bytes) {
            return Err(UploadError::UnreadableImage {
                file_name: self.file_name.clone(),
                mime_type: self.mime_type.clone(),
            });
        }
        Ok(format!(
            "data:{};base64,{}",
            self.mime_type.to_ascii_lowercase(),
            STANDARD.encode(&self.bytes)
        ))
    }

    pub fn read_text(&self) -> Result<String, UploadError> {
        String::from_utf8(self.bytes.clone()).map_err(|_| UploadError::NotUtf8 {
            file_name: self.file_name.clone(),
        })
    }
}

fn mime_from_extension(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "txt" | "text" | "md" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Whether the content sniffs as the accepted image format it declares
fn has_image_signature(mime_type: &str, bytes: &[u8]) -> bool {
    let declared = match ImageFormat::from_mime_type(mime_type.trim().to_ascii_lowercase()) {
        Some(format @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP)) => format,
        _ => return false,
    };
    matches!(image::guess_format(bytes), Ok(detected) if detected == declared)
}

/// Where the agent's training text comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainingSource {
    Pasted(String),
    Uploaded(UploadedFile),
}

/// Agent creation form as submitted by a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentForm {
    pub agent_name: String,
    pub avatar: Option<UploadedFile>,
    pub introductory_message: String,
    pub tone: String,
    pub response_length: String,
    pub areas_of_expertise: String,
    pub knowledge_boundaries: String,
    pub training: TrainingSource,
}

impl Validate for AgentForm {
    type Output = Validated<AgentForm>;

    fn validate(&self) -> Result<Self::Output, ValidationFailure> {
        let mut v = Validator::new(AGENT_FORM_SCHEMA.id);
        check_profile(
            &mut v,
            &[
                ("agentName", self.agent_name.as_str()),
                ("introductoryMessage", self.introductory_message.as_str()),
                ("tone", self.tone.as_str()),
                ("responseLength", self.response_length.as_str()),
                ("areasOfExpertise", self.areas_of_expertise.as_str()),
                ("knowledgeBoundaries", self.knowledge_boundaries.as_str()),
            ],
        );

        match &self.training {
            TrainingSource::Pasted(text) => {
                v.text(&AGENT_FORM_SCHEMA, "uploadedData", text);
            }
            TrainingSource::Uploaded(file) => {
                v.file(&TRAINING_FILE_POLICY, Some((file.mime_type.as_str(), file.len())));
            }
        }

        v.file(
            &AVATAR_POLICY,
            self.avatar.as_ref().map(|f| (f.mime_type.as_str(), f.len())),
        );

        v.finish()?;
        Ok(Validated::new(self.clone()))
    }
}

impl Validated<AgentForm> {
    /// Convert uploads into the action-level input
    pub fn into_forge_input(self) -> Result<ForgeAgentInput, UploadError> {
        let form = self.into_inner();

        let avatar = form
            .avatar
            .as_ref()
            .map(UploadedFile::to_image_data_uri)
            .transpose()?;

        let uploaded_data = match form.training {
            TrainingSource::Pasted(text) => text,
            TrainingSource::Uploaded(file) => file.read_text()?,
        };

        Ok(ForgeAgentInput {
            agent_name: form.agent_name,
            avatar,
            introductory_message: form.introductory_message,
            uploaded_data,
            tone: form.tone,
            response_length: form.response_length,
            areas_of_expertise: form.areas_of_expertise,
            knowledge_boundaries: form.knowledge_boundaries,
        })
    }
}
