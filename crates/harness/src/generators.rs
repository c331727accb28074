use std::cell::RefCell;
use std::rc::Rc;

use branchlog_core::Message;
use branchlog_engine::{GeneratorError, ResponseGenerator};

/// Replies with the content of the last context message, prefixed.
pub struct EchoGenerator;

impl ResponseGenerator for EchoGenerator {
    fn generate(&self, context: &[Message]) -> Result<String, GeneratorError> {
        let last = context
            .last()
            .ok_or_else(|| GeneratorError("empty context".into()))?;
        Ok(format!("echo: {}", last.content))
    }
}

/// Always fails, for exercising the error path.
pub struct FailingGenerator;

impl ResponseGenerator for FailingGenerator {
    fn generate(&self, _context: &[Message]) -> Result<String, GeneratorError> {
        Err(GeneratorError("model unavailable".into()))
    }
}

/// Echoes like `EchoGenerator` and keeps every context it was handed.
#[derive(Clone, Default)]
pub struct RecordingGenerator {
    contexts: Rc<RefCell<Vec<Vec<Message>>>>,
}

impl RecordingGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contexts(&self) -> Vec<Vec<Message>> {
        self.contexts.borrow().clone()
    }
}

impl ResponseGenerator for RecordingGenerator {
    fn generate(&self, context: &[Message]) -> Result<String, GeneratorError> {
        self.contexts.borrow_mut().push(context.to_vec());
        EchoGenerator.generate(context)
    }
}
