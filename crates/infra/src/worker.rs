use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use entitlekit_events::{EventBus, Subscription};

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            if j.join().is_err() {
                warn!(worker = self.name, "worker thread panicked");
            }
        }
    }
}

/// Background loop delivering bus messages to a handler, one at a time.
///
/// - Subscribes before the thread starts, so nothing published after
///   `spawn` returns is missed
/// - Handler errors are logged and the loop continues
/// - Stops on shutdown or when every publisher is gone
#[derive(Debug)]
pub struct NotificationWorker;

impl NotificationWorker {
    pub fn spawn<M, B, H, E>(name: &'static str, bus: &B, mut handler: H) -> io::Result<WorkerHandle>
    where
        M: Send + 'static,
        B: EventBus<M> + ?Sized,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: core::fmt::Debug + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub: Subscription<M> = bus.subscribe();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, sub, shutdown_rx, &mut handler))?;

        Ok(WorkerHandle {
            name,
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn worker_loop<M, H, E>(
    name: &'static str,
    sub: Subscription<M>,
    shutdown_rx: mpsc::Receiver<()>,
    handler: &mut H,
) where
    H: FnMut(M) -> Result<(), E>,
    E: core::fmt::Debug,
{
    let tick = Duration::from_millis(250);
    debug!(worker = name, "worker started");

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(msg) => {
                if let Err(err) = handler(msg) {
                    warn!(worker = name, error = ?err, "worker handler failed");
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!(worker = name, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use entitlekit_events::InMemoryEventBus;
    use std::sync::Arc;

    #[test]
    fn delivers_messages_until_shutdown() {
        let bus = Arc::new(InMemoryEventBus::<u32>::new());
        let (seen_tx, seen_rx) = mpsc::channel();

        let handle = NotificationWorker::spawn("test-worker", &bus, move |n: u32| {
            seen_tx.send(n).map_err(|e| e.to_string())
        })
        .unwrap();

        bus.publish(1).unwrap();
        bus.publish(2).unwrap();

        let timeout = Duration::from_secs(2);
        assert_eq!(seen_rx.recv_timeout(timeout), Ok(1));
        assert_eq!(seen_rx.recv_timeout(timeout), Ok(2));

        handle.shutdown();
    }

    #[test]
    fn handler_errors_do_not_stop_the_loop() {
        let bus = Arc::new(InMemoryEventBus::<u32>::new());
        let (seen_tx, seen_rx) = mpsc::channel();

        let handle = NotificationWorker::spawn("flaky-worker", &bus, move |n: u32| {
            if n % 2 == 0 {
                return Err("even");
            }
            let _ = seen_tx.send(n);
            Ok(())
        })
        .unwrap();

        for n in 1..=5 {
            bus.publish(n).unwrap();
        }

        let timeout = Duration::from_secs(2);
        let received: Vec<u32> = (0..3).filter_map(|_| seen_rx.recv_timeout(timeout).ok()).collect();
        assert_eq!(received, vec![1, 3, 5]);

        handle.shutdown();
    }
}
