//! Application wiring: builds every component and runs the task set.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, ApiServer};
use crate::bus::LineBus;
use crate::config::{ConfigError, PrismConfig};
use crate::display;
use crate::event::{
    run_subscriber, ClassifierError, EventClassifier, EventPipeline, EventSink, SubscriberStats,
};
use crate::shell::{run_console, stdin_lines, ShellError, ShellSupervisor, TERMINATION_SENTINEL};
use crate::webhook::{WebhookError, WebhookForwarder};

/// How long shutdown waits for the game to exit after the stop command.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// How long shutdown waits for pending lines and webhook deliveries.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Top-level error type.
#[derive(thiserror::Error, Debug)]
pub enum PrismError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Shell(#[from] ShellError),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error(transparent)]
    Webhook(#[from] WebhookError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Switches for one `run`.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Start the game immediately (still subject to `shell.autostart`).
    pub autostart: bool,
    /// Read operator input from stdin.
    pub console: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            autostart: true,
            console: true,
        }
    }
}

/// A fully wired prism instance.
#[derive(Debug)]
pub struct Prism {
    config: PrismConfig,
    shell: Arc<ShellSupervisor>,
    sink: Arc<EventSink>,
    forwarders: Vec<WebhookForwarder>,
    cancel: CancellationToken,
}

impl Prism {
    /// Build all components from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a component
    /// cannot be built.
    pub fn new(config: PrismConfig) -> Result<Self, PrismError> {
        config.validate()?;

        let bus = Arc::new(LineBus::new());
        let shell = ShellSupervisor::new(config.shell.clone(), bus)?;
        let sink = Arc::new(EventSink::new());

        let classifier = EventClassifier::new(TERMINATION_SENTINEL)?;
        shell.add_line_handler(Arc::new(EventPipeline::new(classifier, Arc::clone(&sink))));

        let forwarders = config
            .webhooks
            .iter()
            .map(WebhookForwarder::new)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config,
            shell,
            sink,
            forwarders,
            cancel: CancellationToken::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &PrismConfig {
        &self.config
    }

    #[must_use]
    pub fn shell(&self) -> &Arc<ShellSupervisor> {
        &self.shell
    }

    #[must_use]
    pub fn sink(&self) -> &Arc<EventSink> {
        &self.sink
    }

    /// Token that stops `run` when cancelled.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until Ctrl-C, a console `exit`, the cancel token, or a fatal
    /// task error. The game is stopped on the way out, and events it
    /// produced while stopping are still delivered.
    ///
    /// # Errors
    ///
    /// Returns the first fatal task error, such as the API failing to bind.
    pub async fn run(self, options: RunOptions) -> Result<(), PrismError> {
        let mut tasks: JoinSet<Result<(), PrismError>> = JoinSet::new();

        let dispatch_stop = CancellationToken::new();
        let mut dispatch = {
            let shell = Arc::clone(&self.shell);
            let stop = dispatch_stop.clone().cancelled_owned();
            tokio::spawn(async move { shell.dispatch_until(stop).await })
        };

        let mut deliveries = JoinSet::new();
        for forwarder in self.forwarders {
            let subscription = self.sink.subscribe();
            deliveries.spawn(async move {
                tracing::info!(url = %forwarder.url(), "Webhook forwarder started");
                run_subscriber(&forwarder, subscription).await
            });
        }

        if self.config.api.enabled {
            let server = ApiServer::new(
                self.config.api.clone(),
                Arc::clone(&self.shell),
                self.cancel.clone(),
            );
            tasks.spawn(async move { server.run().await.map_err(PrismError::from) });
        }

        if options.autostart && self.config.shell.autostart {
            display::print_notice("starting game");
            if let Err(e) = self.shell.start().await {
                tracing::error!(error = %e, "Failed to start game");
                display::print_error(&format!("failed to start game: {e}"));
            }
        }

        if options.console {
            let shell = Arc::clone(&self.shell);
            let cancel = self.cancel.clone();
            tasks.spawn(async move {
                run_console(shell, cancel, stdin_lines()).await;
                Ok(())
            });
        }

        let result = loop {
            tokio::select! {
                () = self.cancel.cancelled() => break Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
                    }
                    tracing::info!("Interrupt received");
                    break Ok(());
                }
                Some(joined) = tasks.join_next() => match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => break Err(e),
                    Err(e) => tracing::error!(error = %e, "Task failed"),
                },
            }
        };

        self.cancel.cancel();
        shutdown_game(&self.shell).await;

        dispatch_stop.cancel();
        if tokio::time::timeout(DRAIN_TIMEOUT, &mut dispatch).await.is_err() {
            tracing::warn!(timeout = ?DRAIN_TIMEOUT, "Line dispatch did not finish in time");
            dispatch.abort();
        }
        self.sink.close();
        drain_deliveries(&mut deliveries).await;

        tasks.shutdown().await;
        display::print_notice("bye");
        result
    }
}

/// Let forwarders deliver what is queued, then abort the stragglers.
async fn drain_deliveries(deliveries: &mut JoinSet<SubscriberStats>) {
    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while let Some(joined) = deliveries.join_next().await {
            match joined {
                Ok(stats) => tracing::debug!(?stats, "Webhook forwarder finished"),
                Err(e) => tracing::error!(error = %e, "Webhook forwarder failed"),
            }
        }
    })
    .await;

    if drained.is_err() {
        tracing::warn!(
            pending = deliveries.len(),
            timeout = ?DRAIN_TIMEOUT,
            "Dropping undelivered events"
        );
        deliveries.shutdown().await;
    }
}

async fn shutdown_game(shell: &ShellSupervisor) {
    if !shell.is_running() {
        return;
    }

    display::print_notice("stopping game");
    match shell.stop().await {
        Ok(()) => {
            if tokio::time::timeout(SHUTDOWN_GRACE, shell.wait_stopped())
                .await
                .is_err()
            {
                tracing::warn!(grace = ?SHUTDOWN_GRACE, "Game did not stop in time, killing");
            }
        }
        Err(e) => tracing::warn!(error = %e, "Failed to send stop command"),
    }

    if let Err(e) = shell.kill().await {
        tracing::error!(error = %e, "Failed to kill game process");
    }
}
