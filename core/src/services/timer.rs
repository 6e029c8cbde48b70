use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    time::{self, Duration, Instant},
};

/// Input side of a debouncer. Dropping every handle flushes the last pending
/// value and closes the output.
#[derive(Clone)]
pub struct Debouncer<T> {
    tx: UnboundedSender<T>,
}

impl<T> Debouncer<T> {
    /// Offer a new value, restarting the quiet period.
    pub fn push(&self, value: T) {
        let _ = self.tx.send(value);
    }
}

/// Spawn a task that forwards only the latest value once no new value has
/// arrived for `quiet`.
pub fn spawn_debouncer<T: Send + 'static>(quiet: Duration) -> (Debouncer<T>, UnboundedReceiver<T>) {
    let (in_tx, mut in_rx) = unbounded_channel::<T>();
    let (out_tx, out_rx) = unbounded_channel();
    tokio::spawn(async move {
        let mut pending: Option<T> = None;
        let deadline = time::sleep(quiet);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                value = in_rx.recv() => match value {
                    Some(value) => {
                        pending = Some(value);
                        deadline.as_mut().reset(Instant::now() + quiet);
                    }
                    None => {
                        if let Some(value) = pending.take() {
                            let _ = out_tx.send(value);
                        }
                        break;
                    }
                },
                _ = &mut deadline, if pending.is_some() => {
                    if let Some(value) = pending.take() {
                        if out_tx.send(value).is_err() {
                            break;
                        }
                    }
                }
            }
        }
    });
    (Debouncer { tx: in_tx }, out_rx)
}
