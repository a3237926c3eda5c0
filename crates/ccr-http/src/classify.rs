//! Classifies a transport-level `wreq::Error` into a retry-relevant kind.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Dns,
    Tls,
    Io,
    Other,
}

impl TransportErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            TransportErrorKind::Timeout
                | TransportErrorKind::Connect
                | TransportErrorKind::Dns
                | TransportErrorKind::Tls
                | TransportErrorKind::Io
        )
    }
}

pub fn classify(err: &wreq::Error) -> TransportErrorKind {
    let message = err.to_string().to_ascii_lowercase();
    if err.is_timeout() {
        return TransportErrorKind::Timeout;
    }
    if err.is_connect() {
        if message.contains("dns") || message.contains("resolve") {
            return TransportErrorKind::Dns;
        }
        if message.contains("tls") || message.contains("ssl") {
            return TransportErrorKind::Tls;
        }
        return TransportErrorKind::Connect;
    }
    if err.is_connection_reset() {
        return TransportErrorKind::Connect;
    }
    if message.contains("tls") || message.contains("ssl") {
        return TransportErrorKind::Tls;
    }
    // Body-read failures and broken pipes surface as a wrapped io::Error
    // rather than through `is_connect`/`is_connection_reset`, since those
    // only cover the connect phase. A socket reset mid-transfer is this path.
    if has_io_source(err) {
        return TransportErrorKind::Io;
    }
    TransportErrorKind::Other
}

fn has_io_source(err: &wreq::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if cause.downcast_ref::<std::io::Error>().is_some() {
            return true;
        }
        source = cause.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds_exclude_other() {
        assert!(TransportErrorKind::Timeout.is_retryable());
        assert!(TransportErrorKind::Connect.is_retryable());
        assert!(TransportErrorKind::Dns.is_retryable());
        assert!(TransportErrorKind::Tls.is_retryable());
        assert!(TransportErrorKind::Io.is_retryable());
        assert!(!TransportErrorKind::Other.is_retryable());
    }
}
