use branchlog_core::Message;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct GeneratorError(pub String);

/// Produces assistant reply text from the recent messages of a path.
/// The engine treats the output as opaque.
pub trait ResponseGenerator {
    fn generate(&self, context: &[Message]) -> Result<String, GeneratorError>;
}

impl<F> ResponseGenerator for F
where
    F: Fn(&[Message]) -> Result<String, GeneratorError>,
{
    fn generate(&self, context: &[Message]) -> Result<String, GeneratorError> {
        self(context)
    }
}
