//! Source that decodes snapshots from a raw byte payload.

use super::UpstreamSource;
use crate::error::{Result, SyncError};
use crate::types::{PayloadEncoding, Snapshot, Timestamp};

/// Adapts any byte-producing transport (HTTP body, message queue, file) into
/// an [`UpstreamSource`].
pub struct EncodedUpstream<F> {
    fetch: F,
    encoding: PayloadEncoding,
}

impl<F> EncodedUpstream<F>
where
    F: Fn() -> std::result::Result<Vec<u8>, String> + Send + Sync,
{
    pub fn new(encoding: PayloadEncoding, fetch: F) -> Self {
        Self { fetch, encoding }
    }

    pub fn encoding(&self) -> PayloadEncoding {
        self.encoding
    }
}

impl<F> UpstreamSource for EncodedUpstream<F>
where
    F: Fn() -> std::result::Result<Vec<u8>, String> + Send + Sync,
{
    fn fetch_snapshot(&self) -> Result<Snapshot> {
        let bytes = (self.fetch)().map_err(SyncError::Upstream)?;
        let mut snapshot = Snapshot::decode(&bytes, self.encoding)?;
        snapshot.fetched_at.get_or_insert_with(Timestamp::now);
        Ok(snapshot)
    }
}
