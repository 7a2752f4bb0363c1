//! Periodic device polling.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::{IngestHandle, Origin};
use crate::data::duration::format_duration;
use crate::source::InputSource;

/// Poll `source` every `period`, forwarding at most one token per tick.
///
/// The task ends when the ingestion loop goes away. Source errors are logged
/// once per change, not on every tick.
pub fn spawn_poller(
    mut source: Box<dyn InputSource>,
    period: Duration,
    handle: IngestHandle,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_error: Option<String> = None;

        tracing::info!(
            source = source.description(),
            period = %format_duration(period),
            "device poller started"
        );
        loop {
            ticker.tick().await;

            if let Some(token) = source.poll() {
                // Waits for room, so a slow writer back-pressures the device.
                if handle.submit(token, Origin::Device).await.is_err() {
                    break;
                }
            }

            let error = source.error();
            if error != last_error {
                match &error {
                    Some(e) => tracing::warn!(source = source.description(), error = %e, "device source error"),
                    None => tracing::info!(source = source.description(), "device source recovered"),
                }
                last_error = error;
            }
        }
        tracing::info!(source = source.description(), "device poller stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::Submission;
    use std::collections::VecDeque;

    #[derive(Debug)]
    struct ScriptedSource {
        tokens: VecDeque<String>,
    }

    impl InputSource for ScriptedSource {
        fn poll(&mut self) -> Option<String> {
            self.tokens.pop_front()
        }

        fn description(&self) -> &str {
            "scripted"
        }

        fn error(&self) -> Option<String> {
            None
        }
    }

    fn scripted(tokens: &[&str]) -> Box<dyn InputSource> {
        Box::new(ScriptedSource {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_token_per_tick() {
        let (handle, mut receiver) = IngestHandle::channel(8);
        let task = spawn_poller(scripted(&["0", "1", "01"]), Duration::from_secs(1), handle);

        // First tick fires immediately.
        let first = receiver.recv().await.unwrap();
        assert_eq!(
            first,
            Submission {
                token: "0".to_string(),
                origin: Origin::Device
            }
        );
        assert!(receiver.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(receiver.recv().await.unwrap().token, "1");
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(receiver.recv().await.unwrap().token, "01");

        drop(receiver);
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_stops_when_loop_is_gone() {
        let (handle, receiver) = IngestHandle::channel(8);
        drop(receiver);
        let task = spawn_poller(scripted(&["1"]), Duration::from_millis(10), handle);
        task.await.unwrap();
    }
}
