//! # Call Policy
//!
//! Per-method flags that steer how the runtime carries a call: which
//! transport class to use, whether a response exists at all, whether the
//! caller waits for it, and how long.

/// The call policy attached to one method descriptor.
///
/// Policies are plain data and const-constructible so descriptor tables can
/// live in statics. Builder-style `const fn`s toggle individual flags:
///
/// ```
/// use farwire::CallPolicy;
///
/// const LOGGING: CallPolicy = CallPolicy::DEFAULT.no_return().unreliable();
/// assert!(LOGGING.no_return && LOGGING.use_unreliable_transport);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CallPolicy {
    /// Send on the unordered datagram class instead of the reliable one.
    pub use_unreliable_transport: bool,
    /// Fire-and-forget: no execution frame is ever produced.
    pub no_return: bool,
    /// Return a zero immediately; the result is fetched later by transaction id.
    pub non_blocking: bool,
    /// Elide the call entirely and return a zero. No frame is sent.
    pub closed: bool,
    /// Milliseconds a waiter blocks for the execution frame. `<= 0` is unbounded.
    pub response_timeout_ms: i64,
    /// Serve stringification from the local delegate instead of going remote.
    pub delegate_identity: bool,
    /// Serve hashing from the local delegate instead of going remote.
    pub delegate_hash: bool,
}

impl CallPolicy {
    pub const DEFAULT: CallPolicy = CallPolicy {
        use_unreliable_transport: false,
        no_return: false,
        non_blocking: false,
        closed: false,
        response_timeout_ms: 0,
        delegate_identity: false,
        delegate_hash: false,
    };

    pub const fn unreliable(mut self) -> Self {
        self.use_unreliable_transport = true;
        self
    }

    pub const fn no_return(mut self) -> Self {
        self.no_return = true;
        self
    }

    pub const fn non_blocking(mut self) -> Self {
        self.non_blocking = true;
        self
    }

    pub const fn closed(mut self) -> Self {
        self.closed = true;
        self
    }

    pub const fn response_timeout(mut self, millis: i64) -> Self {
        self.response_timeout_ms = millis;
        self
    }

    pub const fn delegate_identity(mut self) -> Self {
        self.delegate_identity = true;
        self
    }

    pub const fn delegate_hash(mut self) -> Self {
        self.delegate_hash = true;
        self
    }

    /// True when the waiter blocks without a deadline.
    pub fn unbounded(&self) -> bool {
        self.response_timeout_ms <= 0
    }
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}
