use tokio::sync::watch;

/// Construct a linked shutdown handle/listener pair.
///
/// Every service `run` loop takes a [`Shutdown`] listener and drains cleanly when
/// it resolves; dropping the [`ShutdownHandle`] without signalling also resolves
/// listeners, so aborted owners never leave loops running.
pub fn channel() -> (ShutdownHandle, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, Shutdown { rx })
}

/// Signals cooperating service loops to stop consuming, drain and return.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// Listener side of a shutdown signal.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Resolves once shutdown is signalled (or the handle is dropped).
    pub async fn recv(&mut self) {
        while !*self.rx.borrow() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recv_resolves_on_signal() {
        let (handle, mut shutdown) = channel();
        assert!(!shutdown.is_shutdown());

        handle.shutdown();
        shutdown.recv().await;
        assert!(shutdown.is_shutdown());
    }

    #[tokio::test]
    async fn test_recv_resolves_on_dropped_handle() {
        let (handle, mut shutdown) = channel();
        drop(handle);
        shutdown.recv().await;
    }
}
