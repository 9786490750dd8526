use facadex_common::error::StorageError;
use facadex_model::Quad;

/// Destination of the quads produced by one triplification build.
pub trait QuadSink {
    /// Inserts `quad` into the sink.
    ///
    /// Returns `true` if the sink did not already contain the quad.
    fn put(&mut self, quad: Quad) -> Result<bool, StorageError>;

    /// Called once after the producer has emitted every quad.
    fn finish(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Whether the consumer asked to cancel the build.
    ///
    /// Producers should poll this between emitted quads and abort early.
    fn is_cancelled(&self) -> bool {
        false
    }
}
