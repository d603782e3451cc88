#[derive(Debug, PartialEq)]
pub enum ReadResult<'r> {
    /// The operation was successful.
    /// Contains a reference to the populated bytes.
    Ok(&'r mut [u8]),
    /// The operation was not successful and cannot be polled again.
    Error,
}

/// A `Read`-like trait for feeding data into an encoder, available in
/// `no_std` environments.
pub trait Readable {
    fn read<'r>(&self, buf: &'r mut [u8]) -> ReadResult<'r>;
}

impl<'a> Readable for &'a [u8] {
    fn read<'r>(&self, buf: &'r mut [u8]) -> ReadResult<'r> {
        let len = core::cmp::min(buf.len(), self.len());
        let buf = &mut buf[..len];
        buf.copy_from_slice(&self[..len]);
        ReadResult::Ok(buf)
    }
}
