use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Instance not found: {0}/{1}")]
    InstanceNotFound(String, String),

    #[error("Instance already registered with a different address: {0}/{1}")]
    DuplicateInstance(String, String),
}
