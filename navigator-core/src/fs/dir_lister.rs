//! ``src/fs/dir_lister.rs``
//!
//! # `DirectoryLister`: Asynchronous, Cancellable Directory Listing
//!
//! Enumerates the immediate children of one directory, classifies each one
//! and returns them as an ordered `Listing`. `spawn` runs the listing on the
//! tokio runtime and reports back over a channel; a cancelled listing sends
//! nothing at all.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::ListingConfig;
use crate::error::AppError;
use crate::fs::classifier::{Classify, ExtensionClassifier, classify_child};
use crate::fs::entry::{Entry, Listing};
use crate::fs::source::{DirectorySource, LocalFs, RawChild};

/// Result of one spawned listing, tagged with the generation that requested it.
#[derive(Debug)]
pub struct ListingOutcome {
    pub generation: u64,
    pub directory: PathBuf,
    pub result: Result<Listing, AppError>,
}

/// Handle to a listing running in the background.
#[derive(Debug)]
pub struct ListingTask {
    pub generation: u64,
    pub directory: PathBuf,
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ListingTask {
    /// Request cooperative cancellation. The task stops at its next check
    /// and never delivers a result.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Wait for the background task to exit.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            warn!(
                marker = "LISTING_TASK_JOIN_FAILED",
                operation_type = "directory_listing",
                generation = self.generation,
                error = %e,
                "Listing task did not exit cleanly"
            );
        }
    }
}

pub struct DirectoryLister<S: DirectorySource = LocalFs> {
    source: Arc<S>,
    classifier: Arc<dyn Classify>,
    config: ListingConfig,
}

impl<S: DirectorySource> Clone for DirectoryLister<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            classifier: Arc::clone(&self.classifier),
            config: self.config.clone(),
        }
    }
}

impl DirectoryLister<LocalFs> {
    /// Lister over the local file system with the built-in extension table.
    #[must_use]
    pub fn local(config: ListingConfig) -> Self {
        Self::new(LocalFs, config)
    }
}

impl<S: DirectorySource> DirectoryLister<S> {
    #[must_use]
    pub fn new(source: S, config: ListingConfig) -> Self {
        Self {
            source: Arc::new(source),
            classifier: Arc::new(ExtensionClassifier),
            config,
        }
    }

    /// Replace the classification strategy.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn Classify>) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    #[must_use]
    pub const fn config(&self) -> &ListingConfig {
        &self.config
    }

    /// List `dir` to completion.
    pub async fn list(&self, dir: &Path) -> Result<Listing, AppError> {
        self.list_cancellable(dir, &CancellationToken::new()).await
    }

    /// List `dir`, returning `AppError::Cancelled` as soon as `token` fires.
    pub async fn list_cancellable(
        &self,
        dir: &Path,
        token: &CancellationToken,
    ) -> Result<Listing, AppError> {
        let start_time: Instant = Instant::now();

        if token.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let children: Vec<RawChild> = tokio::select! {
            biased;

            () = token.cancelled() => return Err(AppError::Cancelled),

            read = self.source.read_children(dir) => read?,
        };

        let mut entries: Vec<Entry> = Vec::with_capacity(children.len());
        let yield_every: usize = self.config.yield_every.max(1);

        for (processed, child) in children.into_iter().enumerate() {
            if !self.config.show_hidden && child.name.starts_with('.') {
                continue;
            }

            let path: PathBuf = dir.join(child.name.as_str());
            let category = classify_child(&path, child.is_dir, self.classifier.as_ref());

            entries.push(Entry::new(path, child.is_dir, category));

            // Yield control periodically so cancellation can land
            if (processed + 1) % yield_every == 0 {
                tokio::task::yield_now().await;

                if token.is_cancelled() {
                    return Err(AppError::Cancelled);
                }
            }
        }

        let listing: Listing = Listing::new(dir.to_path_buf(), entries, self.config.sort);
        let duration: Duration = start_time.elapsed();

        info!(
            marker = "LISTING_COMPLETED",
            operation_type = "directory_listing",
            directory = %dir.display(),
            entries = listing.len(),
            duration_us = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX),
            "Directory listed in {:?}",
            duration
        );

        Ok(listing)
    }

    /// Run a listing of `dir` in the background and deliver the outcome on `tx`.
    pub fn spawn(
        &self,
        dir: PathBuf,
        generation: u64,
        tx: UnboundedSender<ListingOutcome>,
    ) -> ListingTask {
        let cancel_token = CancellationToken::new();
        let task_token = cancel_token.clone();
        let lister = self.clone();
        let task_dir = dir.clone();

        let span = info_span!(
            "listing",
            marker = "LISTING_TASK",
            operation_type = "directory_listing",
            generation,
            directory = %dir.display()
        );

        let handle: JoinHandle<()> = tokio::spawn(
            async move {
                let listing_dir = task_dir.clone();
                let listing_token = task_token.clone();

                // Run the listing in its own task so a panic still reports back.
                let listing: JoinHandle<Result<Listing, AppError>> = tokio::spawn(
                    async move { lister.list_cancellable(&listing_dir, &listing_token).await }
                        .in_current_span(),
                );

                let result: Result<Listing, AppError> = match listing.await {
                    Ok(result) => result,
                    Err(e) if e.is_cancelled() => Err(AppError::Cancelled),
                    Err(e) => Err(AppError::Other(format!(
                        "listing of {} aborted: {e}",
                        task_dir.display()
                    ))
                    .trace()),
                };

                if task_token.is_cancelled() || matches!(result, Err(AppError::Cancelled)) {
                    debug!(marker = "LISTING_CANCELLED", "Listing cancelled, result dropped");
                    return;
                }

                let outcome = ListingOutcome {
                    generation,
                    directory: task_dir,
                    result,
                };

                if tx.send(outcome).is_err() {
                    debug!("Listing receiver dropped before delivery");
                }
            }
            .instrument(span),
        );

        ListingTask {
            generation,
            directory: dir,
            cancel_token,
            handle,
        }
    }
}
