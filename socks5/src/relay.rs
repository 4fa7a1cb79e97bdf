//! Bidirectional copy between the client and the upstream connection.

use std::io;
use std::sync::Arc;

use log::debug;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;

/// Single-fire completion signal shared by the two copy directions.
#[derive(Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fires the signal. Returns `true` only for the call that fired it.
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    /// Resolves once the signal has fired, immediately if it already has.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives in `self`, so this cannot fail
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Copies `a -> b` and `b -> a` until either side ends.
///
/// The first direction to hit EOF or an error fires the shared signal; the
/// other stops copying when it sees it. Both write sides are shut down and
/// both connections dropped before this returns. Copy errors are logged and
/// otherwise ignored.
pub async fn run<A, B>(a: A, b: B)
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    let (a_read, a_write) = tokio::io::split(a);
    let (b_read, b_write) = tokio::io::split(b);
    let shutdown = Shutdown::new();

    let forward = tokio::spawn(pipe(a_read, b_write, shutdown.clone(), "client -> upstream"));
    let backward = tokio::spawn(pipe(b_read, a_write, shutdown.clone(), "upstream -> client"));

    shutdown.wait().await;

    // halves are dropped when the tasks end, closing both connections
    let _ = forward.await;
    let _ = backward.await;
}

async fn pipe<R, W>(mut reader: R, mut writer: W, shutdown: Shutdown, direction: &'static str)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let result = tokio::select! {
        copied = tokio::io::copy(&mut reader, &mut writer) => copied.map(|_| ()),
        _ = shutdown.wait() => Ok(()),
    };

    match result {
        Ok(()) => debug!("{} finished", direction),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => debug!("{} finished", direction),
        Err(e) => debug!("{} ended with error: {}", direction, e),
    }

    let _ = writer.shutdown().await;
    shutdown.trigger();
}
