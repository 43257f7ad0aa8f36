//! # LogWriter — event logger
//!
//! A minimal consumer that subscribes to the bus and writes every event it
//! receives through `tracing` at `info` level. Use it for debugging or demos.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO eventcast::events: [container] id="c1" from=Some("alpine") action="create"
//! INFO eventcast::events: [image] id="alpine" action="pull"
//! INFO eventcast::events: [network] actor="bridge" action="connect"
//! ```

use tokio::task::JoinHandle;

use crate::bus::{Events, Signal};
use crate::error::BusError;
use crate::events::{EventMessage, EventType};
use crate::filter::Filter;

/// Event writer.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

impl LogWriter {
    /// Subscribes to `events` and logs each matching event until `signal` fires.
    ///
    /// The returned task resolves to the subscription's terminal result.
    pub fn spawn(
        events: &Events,
        signal: impl Into<Signal>,
        filter: Option<Filter>,
    ) -> JoinHandle<Result<(), BusError>> {
        let (mut stream, mut errors) = events.subscribe(signal, filter).into_parts();

        tokio::spawn(async move {
            while let Some(ev) = stream.recv().await {
                Self::write(&ev);
            }
            errors.recv().await.unwrap_or(Err(BusError::DispatchAborted))
        })
    }

    fn write(e: &EventMessage) {
        match e.kind() {
            EventType::Container => {
                tracing::info!(
                    target: "eventcast::events",
                    "[container] id={:?} from={:?} action={:?}",
                    e.actor().id,
                    e.from(),
                    e.action()
                );
            }
            EventType::Image => {
                tracing::info!(
                    target: "eventcast::events",
                    "[image] id={:?} action={:?}",
                    e.actor().id,
                    e.action()
                );
            }
            kind => {
                tracing::info!(
                    target: "eventcast::events",
                    "[{}] actor={:?} action={:?}",
                    kind,
                    e.actor().id,
                    e.action()
                );
            }
        }
    }
}
