use thiserror::Error;

/// Startup failures of the shadow renderer.
///
/// None of these are recoverable at runtime: once a [`crate::Scene`] has been
/// built, frames are rendered without an error path.
#[derive(Debug, Error)]
pub enum ShadowError {
    #[error("failed to compile shader program `{program}`:\n{log}")]
    ShaderCompile { program: String, log: String },

    #[error("failed to link shader program `{program}`:\n{log}")]
    ShaderLink { program: String, log: String },

    #[error("mesh `{mesh}` rejected: {reason}")]
    MeshValidation { mesh: String, reason: String },

    #[error("cannot create {width}x{height} render target: {reason}")]
    TargetCreation {
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ShadowError {
    pub(crate) fn mesh(mesh: &str, reason: impl Into<String>) -> Self {
        Self::MeshValidation {
            mesh: mesh.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn target(width: u32, height: u32, reason: impl Into<String>) -> Self {
        Self::TargetCreation {
            width,
            height,
            reason: reason.into(),
        }
    }
}
