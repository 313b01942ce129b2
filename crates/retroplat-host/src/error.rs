use thiserror::Error;

pub type Result<T> = std::result::Result<T, HostError>;

/// Errors surfaced through the driver callbacks.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("{driver} driver: {source}")]
    Driver {
        driver: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("{0} is not supported by this driver")]
    Unsupported(&'static str),

    #[error("invalid parameter: {0}")]
    InvalidParam(&'static str),

    #[error("window {0} has no framebuffer")]
    NoFramebuffer(u32),

    #[error("no driver available (tried: {tried})")]
    NoDriver { tried: String },
}

impl HostError {
    pub fn driver<E>(driver: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Driver {
            driver,
            source: Box::new(source),
        }
    }
}
