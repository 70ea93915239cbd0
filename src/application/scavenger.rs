//! Periodic removal of expired counters.
//!
//! Expired counters never influence a decision, so removing them only bounds
//! memory. Nothing runs in the background unless the host starts a
//! [`Scavenger`] explicitly.

use crate::application::{
    metrics::Metrics,
    ports::{CounterStore, StoreError},
    registry::CounterRegistry,
};
use std::time::Duration;

#[cfg(feature = "async")]
use tokio::{sync::oneshot, task::JoinHandle, time::interval};

/// Error returned when scavenger configuration validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScavengerConfigError {
    /// Sweep interval duration must be greater than zero
    ZeroInterval,
}

impl std::fmt::Display for ScavengerConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScavengerConfigError::ZeroInterval => {
                write!(f, "scavenge interval must be greater than 0")
            }
        }
    }
}

impl std::error::Error for ScavengerConfigError {}

/// Configuration for background scavenging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScavengerConfig {
    /// How often to sweep the store
    pub interval: Duration,
}

impl Default for ScavengerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

impl ScavengerConfig {
    /// Create a new scavenger config with the specified interval.
    ///
    /// # Errors
    /// Returns `ScavengerConfigError::ZeroInterval` if `interval` is zero.
    pub fn new(interval: Duration) -> Result<Self, ScavengerConfigError> {
        if interval.is_zero() {
            return Err(ScavengerConfigError::ZeroInterval);
        }
        Ok(Self { interval })
    }
}

/// Remove expired counters once, recording the count in `metrics`.
pub(crate) fn sweep<S>(registry: &CounterRegistry<S>, metrics: &Metrics) -> Result<usize, StoreError>
where
    S: CounterStore + Clone,
{
    let removed = registry.scavenge()?;
    metrics.record_scavenged(removed);
    if removed > 0 {
        tracing::debug!(removed, remaining = registry.len(), "scavenged expired counters");
    }
    Ok(removed)
}

/// Sweeps expired counters out of a store.
pub struct Scavenger<S>
where
    S: CounterStore + Clone,
{
    registry: CounterRegistry<S>,
    metrics: Metrics,
    config: ScavengerConfig,
}

impl<S> Scavenger<S>
where
    S: CounterStore + Clone,
{
    /// Create a new scavenger.
    pub fn new(registry: CounterRegistry<S>, metrics: Metrics, config: ScavengerConfig) -> Self {
        Self {
            registry,
            metrics,
            config,
        }
    }

    /// Run one sweep now.
    ///
    /// # Returns
    /// The number of counters removed.
    pub fn sweep(&self) -> Result<usize, StoreError> {
        sweep(&self.registry, &self.metrics)
    }

    /// Start sweeping periodically on the current tokio runtime.
    ///
    /// Store errors are logged and the next tick tries again. The task runs
    /// until [`ScavengerHandle::shutdown`] is called; dropping the handle
    /// leaves it running.
    #[cfg(feature = "async")]
    pub fn start(self) -> ScavengerHandle
    where
        S: Send + Sync + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let period = self.config.interval;

        let join_handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        tracing::debug!("scavenger shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(error) = self.sweep() {
                            tracing::warn!(error = %error, "scavenge sweep failed");
                        }
                    }
                }
            }
        });

        ScavengerHandle {
            shutdown_tx: Some(shutdown_tx),
            join_handle,
        }
    }

    /// Get the scavenger configuration.
    pub fn config(&self) -> &ScavengerConfig {
        &self.config
    }

    /// Get a reference to the registry.
    pub fn registry(&self) -> &CounterRegistry<S> {
        &self.registry
    }
}

/// Error returned when a background task fails to stop cleanly.
#[cfg(feature = "async")]
#[derive(Debug)]
pub enum ShutdownError {
    /// The task panicked before it could stop
    TaskPanicked,
    /// The task was cancelled by the runtime
    TaskCancelled,
    /// The task did not stop within the allotted time
    Timeout,
}

#[cfg(feature = "async")]
impl std::fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownError::TaskPanicked => write!(f, "scavenger task panicked"),
            ShutdownError::TaskCancelled => write!(f, "scavenger task was cancelled"),
            ShutdownError::Timeout => write!(f, "scavenger task did not stop in time"),
        }
    }
}

#[cfg(feature = "async")]
impl std::error::Error for ShutdownError {}

/// Handle to a running [`Scavenger`].
#[cfg(feature = "async")]
#[derive(Debug)]
pub struct ScavengerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    join_handle: JoinHandle<()>,
}

#[cfg(feature = "async")]
impl ScavengerHandle {
    const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

    /// Stop the task and wait for it to finish.
    ///
    /// # Errors
    /// Returns an error if the task panicked, was cancelled, or did not stop
    /// within ten seconds.
    pub async fn shutdown(mut self) -> Result<(), ShutdownError> {
        if let Some(tx) = self.shutdown_tx.take() {
            // The task may already have exited; the join below reports why
            let _ = tx.send(());
        }

        match tokio::time::timeout(Self::SHUTDOWN_TIMEOUT, &mut self.join_handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) if error.is_panic() => Err(ShutdownError::TaskPanicked),
            Ok(Err(_)) => Err(ShutdownError::TaskCancelled),
            Err(_) => {
                self.join_handle.abort();
                Err(ShutdownError::Timeout)
            }
        }
    }

    /// Whether the task has stopped.
    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }
}
