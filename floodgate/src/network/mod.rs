//! Network abstraction layer and stream shims.
//!
//! Trait-based networking keeps the harness and the server under test
//! decoupled from any concrete transport; the shims wrap accepted
//! streams to observe backpressure or inject write failures without
//! touching the server's own code.

/// Core networking traits.
pub mod traits;

/// Real networking implementation using Tokio.
pub mod tokio;

/// Fault-injecting and stall-observing stream wrappers.
pub mod shim;

pub use self::tokio::TokioNetworkProvider;
pub use shim::{HeadOnlyWriteFault, WriteStallProbe};
pub use traits::{NetworkProvider, TcpListenerTrait};

use ::tokio::io::{AsyncRead, AsyncWrite};

/// A bidirectional byte stream usable across tasks.
pub trait ByteStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> ByteStream for T {}

/// An owned, type-erased byte stream.
pub type BoxedByteStream = Box<dyn ByteStream>;

/// Behavior injected around every stream the server accepts.
///
/// Decorators are supplied as configuration at server construction time;
/// the server applies them to each accepted connection before any
/// handler sees it.
pub trait StreamDecorator: Send + Sync {
    /// Wrap an accepted stream.
    fn decorate(&self, stream: BoxedByteStream) -> BoxedByteStream;
}
