//! The byte stream the roaster is reached through.

/// A serial-like link to the roaster.
///
/// Reads may return fewer bytes than asked for. A read which times out should either return
/// `Ok(0)` or an error whose kind is [`embedded_io::ErrorKind::TimedOut`], both are treated as
/// the end of the current frame.
pub trait Transport: embedded_io::Read + embedded_io::Write {
    /// Open the underlying link. Opening an already open link is not an error.
    fn open(&mut self) -> Result<(), Self::Error>;

    /// Whether the link is currently open.
    fn is_open(&self) -> bool;

    /// Discard any received bytes not yet read.
    fn flush_input(&mut self) -> Result<(), Self::Error>;

    /// Discard or push out any bytes not yet transmitted.
    fn flush_output(&mut self) -> Result<(), Self::Error> {
        self.flush()
    }
}

/// Whether a read error only means the device had nothing more to say.
pub fn is_timeout<E: embedded_io::Error>(err: &E) -> bool {
    matches!(err.kind(), embedded_io::ErrorKind::TimedOut)
}
