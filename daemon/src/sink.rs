/// One-way delivery of filtered telemetry to the external sink.
///
/// The event loop only ever enqueues; a separate worker performs the HTTP
/// requests so a slow or dead sink never delays local event processing.
/// Each delivery is attempted at most once.
use std::time::Duration;
use tokio::sync::mpsc;

/// Pending deliveries held before new ones are dropped.
const QUEUE_CAPACITY: usize = 256;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub name: String,
    pub data: String,
}

/// Cheap cloneable handle for enqueuing deliveries.
#[derive(Clone)]
pub struct SinkHandle {
    tx: mpsc::Sender<Delivery>,
}

impl SinkHandle {
    /// Creates a handle and the receiver a worker should drain.
    pub fn channel() -> (Self, mpsc::Receiver<Delivery>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        (Self { tx }, rx)
    }

    /// Fire-and-forget. A full or closed queue drops the delivery and logs it.
    pub fn deliver(&self, name: impl Into<String>, data: impl Into<String>) {
        let delivery = Delivery {
            name: name.into(),
            data: data.into(),
        };
        if let Err(e) = self.tx.try_send(delivery) {
            let dropped = match &e {
                mpsc::error::TrySendError::Full(d) | mpsc::error::TrySendError::Closed(d) => d,
            };
            tracing::warn!(target: "sink", "Dropped delivery '{}': {e}", dropped.name);
        }
    }
}

/// Drains `rx`, sending each delivery as
/// `GET <endpoint>?name=<name>&data=<url-encoded data>`.
/// Failures are logged and never retried.
pub async fn run(endpoint: String, mut rx: mpsc::Receiver<Delivery>) {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(REQUEST_TIMEOUT))
        .build()
        .into();

    tracing::info!(target: "sink", "Forwarding telemetry to {endpoint}");

    while let Some(delivery) = rx.recv().await {
        let agent = agent.clone();
        let endpoint = endpoint.clone();
        let name = delivery.name.clone();

        // ureq is blocking; keep it off the async workers.
        let result = tokio::task::spawn_blocking(move || send(&agent, &endpoint, &delivery)).await;

        match result {
            Ok(Ok(())) => tracing::debug!(target: "sink", "Sent '{name}'"),
            Ok(Err(e)) => tracing::warn!(target: "sink", "Failed to send '{name}': {e}"),
            Err(e) => tracing::error!(target: "sink", "Delivery task for '{name}' panicked: {e}"),
        }
    }
}

fn send(agent: &ureq::Agent, endpoint: &str, delivery: &Delivery) -> Result<(), ureq::Error> {
    agent
        .get(endpoint)
        .query("name", &delivery.name)
        .query("data", &delivery.data)
        .call()?;
    Ok(())
}
