use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Registry does not know instance {service}/{instance_id}")]
    NotFound { service: String, instance_id: String },

    #[error("Instance {service}/{instance_id} already registered with a different address")]
    Duplicate { service: String, instance_id: String },

    #[error("Unexpected registry response status: {0}")]
    UnexpectedStatus(u16),

    #[error("Registry transport error: {0}")]
    Transport(#[from] reqwest::Error),
}
