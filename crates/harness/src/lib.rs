pub mod conversation;
pub mod generators;

pub use conversation::TestConversation;
pub use generators::{EchoGenerator, FailingGenerator, RecordingGenerator};

/// Route `tracing` output to the test writer. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
