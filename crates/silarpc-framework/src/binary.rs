use uuid::Uuid;

/// Out-of-band store for large binary payloads referenced by call
/// parameters and responses.
///
/// The server owns one handler and injects it into every registered
/// feature; transfer chunking and the upload/download wire protocol are
/// the handler's concern, behind this narrow interface.
pub trait BinaryTransferHandler: Send + Sync {
    /// Stores a payload and returns the identifier to reference it by.
    fn store(&self, data: Vec<u8>) -> Uuid;

    /// Retrieves a previously stored payload.
    fn retrieve(&self, id: &Uuid) -> Option<Vec<u8>>;

    /// Deletes a stored payload. Returns whether it existed.
    fn delete(&self, id: &Uuid) -> bool;
}
