//! ``src/controller/session.rs``
//! ============================================================================
//! # `NavigationSession`: single-flight directory navigation
//!
//! Holds the current/root directory and the latest listing, and runs at most
//! one listing at a time. Starting a new navigation cancels the one in
//! flight; a result that still slips through is recognised by its
//! generation number and dropped.
//!
//! All methods are meant to be called from one control task. Background
//! listings report back over a single channel which that task drains with
//! [`NavigationSession::next_event`] or [`NavigationSession::try_next_event`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::fs::dir_lister::{DirectoryLister, ListingOutcome, ListingTask};
use crate::fs::entry::Listing;
use crate::fs::source::{DirectorySource, LocalFs};
use crate::model::nav_state::{NavigationState, SavedSession, SourceInfo, absolutize};

/// Presentation-layer callbacks.
pub trait SessionObserver: Send {
    /// A navigation committed; `listing` is the new current listing.
    fn on_listing(&mut self, listing: &Listing);

    /// A navigation failed and the session rolled back to `current_dir`.
    fn on_error(&mut self, _current_dir: &Path, _error: &AppError) {}
}

#[derive(Debug, Clone)]
pub enum SessionPhase {
    Idle,

    /// A listing of `target` is in flight.
    Listing { target: PathBuf },

    /// The last navigation committed; see [`NavigationSession::listing`].
    Ready,

    Failed(AppError),
}

/// Transition applied by `next_event` / `try_next_event`.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Ready { directory: PathBuf, entries: usize },

    Failed { directory: PathBuf, error: AppError },
}

/// Result of `navigate_up`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpOutcome {
    /// Already at the root: the caller should close the session.
    Exit,

    Navigating(PathBuf),
}

struct InFlight {
    task: ListingTask,
    /// Directory to fall back to if this listing fails.
    previous: PathBuf,
}

pub struct NavigationSession<S: DirectorySource = LocalFs> {
    state: NavigationState,
    phase: SessionPhase,
    lister: DirectoryLister<S>,
    source: Option<SourceInfo>,
    observer: Option<Box<dyn SessionObserver>>,
    in_flight: Option<InFlight>,
    generation: u64,
    outcome_tx: UnboundedSender<ListingOutcome>,
    outcome_rx: UnboundedReceiver<ListingOutcome>,
}

impl<S: DirectorySource> NavigationSession<S> {
    fn idle(
        root: PathBuf,
        lister: DirectoryLister<S>,
        observer: Box<dyn SessionObserver>,
    ) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        Self {
            state: NavigationState::new(root),
            phase: SessionPhase::Idle,
            lister,
            source: None,
            observer: Some(observer),
            in_flight: None,
            generation: 0,
            outcome_tx,
            outcome_rx,
        }
    }

    /// Open a session at `root` and start listing it.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start<P: AsRef<Path>>(
        root: P,
        lister: DirectoryLister<S>,
        observer: Box<dyn SessionObserver>,
    ) -> Result<Self, AppError> {
        let root: PathBuf = absolutize(root.as_ref())?;
        let mut session = Self::idle(root.clone(), lister, observer);

        info!(
            marker = "SESSION_STARTED",
            operation_type = "navigation",
            root = %root.display(),
            "Navigation session started"
        );

        session.begin_listing(root);

        Ok(session)
    }

    /// Rebuild a session from a saved record.
    ///
    /// A persisted listing of the saved directory is reused as-is (unless
    /// older than `max_listing_age`); otherwise the directory is listed
    /// again. A saved directory outside the saved root falls back to the root.
    pub fn restore(
        saved: SavedSession,
        lister: DirectoryLister<S>,
        observer: Box<dyn SessionObserver>,
        max_listing_age: Option<Duration>,
    ) -> Result<Self, AppError> {
        let root: PathBuf = absolutize(&saved.root_dir)?;
        let mut session = Self::idle(root.clone(), lister, observer);
        session.source.clone_from(&saved.source);

        let current: PathBuf = match session.state.resolve(&saved.current_dir) {
            Ok(dir) => dir,
            Err(e) => {
                warn!(
                    marker = "SESSION_RESTORE_OUTSIDE_ROOT",
                    operation_type = "navigation",
                    error = %e,
                    "Saved directory is outside the root, restoring at root"
                );
                root
            }
        };

        let reusable: Option<Listing> = saved
            .reusable_listing(max_listing_age)
            .filter(|listing: &&Listing| -> bool { listing.is_for(&current) })
            .cloned();

        match reusable {
            Some(listing) => {
                info!(
                    marker = "SESSION_RESTORED",
                    operation_type = "navigation",
                    current_dir = %current.display(),
                    relisted = false,
                    "Session restored from saved listing"
                );

                session.state.commit(listing);
                session.phase = SessionPhase::Ready;
                session.notify_listing();
            }

            None => {
                info!(
                    marker = "SESSION_RESTORED",
                    operation_type = "navigation",
                    current_dir = %current.display(),
                    relisted = true,
                    "Session restored, re-listing directory"
                );

                session.begin_listing(current);
            }
        }

        Ok(session)
    }

    #[must_use]
    pub fn with_source(mut self, source: SourceInfo) -> Self {
        self.source = Some(source);
        self
    }

    // ------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------

    /// Navigate into `target` (absolute, or relative to the current directory).
    ///
    /// Cancels any listing in flight. Fails with `OutsideRoot`, leaving the
    /// session untouched, if `target` is not under the root.
    pub fn navigate_to<P: AsRef<Path>>(&mut self, target: P) -> Result<(), AppError> {
        let dir: PathBuf = self.state.resolve(target.as_ref()).map_err(AppError::trace)?;

        self.begin_listing(dir);

        Ok(())
    }

    /// Go to the parent directory, or signal exit when already at the root.
    pub fn navigate_up(&mut self) -> Result<UpOutcome, AppError> {
        if self.state.is_at_root() {
            debug!(marker = "SESSION_EXIT_SIGNAL", "navigate_up at root");
            return Ok(UpOutcome::Exit);
        }

        let parent: PathBuf = self
            .state
            .current_dir()
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| AppError::invalid_state("current directory has no parent").trace())?;

        self.navigate_to(&parent)?;

        Ok(UpOutcome::Navigating(parent))
    }

    /// List the current directory again.
    pub fn refresh(&mut self) {
        let dir: PathBuf = self.state.current_dir().to_path_buf();

        self.begin_listing(dir);
    }

    fn begin_listing(&mut self, dir: PathBuf) {
        let previous: PathBuf = match self.in_flight.take() {
            Some(superseded) => {
                superseded.task.cancel();

                debug!(
                    marker = "LISTING_SUPERSEDED",
                    operation_type = "navigation",
                    generation = superseded.task.generation,
                    directory = %superseded.task.directory.display(),
                    "Cancelled in-flight listing"
                );

                superseded.previous
            }

            None => self.state.current_dir().to_path_buf(),
        };

        self.generation += 1;

        let task: ListingTask =
            self.lister
                .spawn(dir.clone(), self.generation, self.outcome_tx.clone());

        self.state.set_tentative(dir.clone());
        self.phase = SessionPhase::Listing { target: dir };
        self.in_flight = Some(InFlight { task, previous });
    }

    // ------------------------------------------------------------
    // Delivery
    // ------------------------------------------------------------

    /// Wait for the in-flight listing and apply its result.
    ///
    /// Returns `None` when nothing is in flight.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        while self.in_flight.is_some() {
            let outcome: ListingOutcome = self.outcome_rx.recv().await?;

            if let Some(event) = self.apply(outcome) {
                return Some(event);
            }
        }

        None
    }

    /// Apply a result if one has already arrived, without waiting.
    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        loop {
            match self.outcome_rx.try_recv() {
                Ok(outcome) => {
                    if let Some(event) = self.apply(outcome) {
                        return Some(event);
                    }
                }

                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return None,
            }
        }
    }

    fn apply(&mut self, outcome: ListingOutcome) -> Option<SessionEvent> {
        let is_current: bool = self
            .in_flight
            .as_ref()
            .is_some_and(|f: &InFlight| -> bool { f.task.generation == outcome.generation });

        if !is_current {
            debug!(
                marker = "LISTING_STALE_DISCARDED",
                operation_type = "navigation",
                generation = outcome.generation,
                directory = %outcome.directory.display(),
                "Discarded result of a superseded listing"
            );
            return None;
        }

        let in_flight: InFlight = self.in_flight.take()?;

        match outcome.result {
            Ok(listing) => {
                let entries: usize = listing.len();

                self.state.commit(listing);
                self.phase = SessionPhase::Ready;
                self.notify_listing();

                Some(SessionEvent::Ready {
                    directory: outcome.directory,
                    entries,
                })
            }

            Err(error) => {
                let error: AppError = error.trace();

                self.state.set_tentative(in_flight.previous);
                self.phase = SessionPhase::Failed(error.clone());

                if let Some(observer) = self.observer.as_mut() {
                    observer.on_error(self.state.current_dir(), &error);
                }

                Some(SessionEvent::Failed {
                    directory: outcome.directory,
                    error,
                })
            }
        }
    }

    fn notify_listing(&mut self) {
        if let Some(observer) = self.observer.as_mut() {
            observer.on_listing(self.state.last_listing());
        }
    }

    // ------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------

    #[must_use]
    pub const fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    #[must_use]
    pub const fn state(&self) -> &NavigationState {
        &self.state
    }

    #[must_use]
    pub fn current_dir(&self) -> &Path {
        self.state.current_dir()
    }

    #[must_use]
    pub fn root_dir(&self) -> &Path {
        self.state.root_dir()
    }

    #[must_use]
    pub const fn listing(&self) -> &Listing {
        self.state.last_listing()
    }

    #[must_use]
    pub const fn source_info(&self) -> Option<&SourceInfo> {
        self.source.as_ref()
    }

    #[must_use]
    pub const fn is_listing(&self) -> bool {
        self.in_flight.is_some()
    }

    #[must_use]
    pub const fn lister(&self) -> &DirectoryLister<S> {
        &self.lister
    }

    // ------------------------------------------------------------
    // Persistence & teardown
    // ------------------------------------------------------------

    /// Flat record for persisting this session.
    ///
    /// Only committed state is saved: while a listing is in flight the
    /// record points at the directory that would be restored on failure.
    #[must_use]
    pub fn save(&self) -> SavedSession {
        let listing: &Listing = self.state.last_listing();
        let current: &Path = match &self.in_flight {
            Some(in_flight) => &in_flight.previous,
            None => self.state.current_dir(),
        };

        SavedSession {
            version: SavedSession::CURRENT_VERSION,
            root_dir: self.state.root_dir().to_path_buf(),
            current_dir: current.to_path_buf(),
            source: self.source.clone(),
            last_listing: listing.is_for(current).then(|| listing.clone()),
            saved_at: Utc::now(),
        }
    }

    /// Cancel in-flight work and drop the observer. Nothing is delivered
    /// after this returns.
    pub fn dispose(mut self) {
        self.cancel_in_flight();
        self.observer = None;
        self.outcome_rx.close();

        info!(
            marker = "SESSION_DISPOSED",
            operation_type = "navigation",
            current_dir = %self.state.current_dir().display(),
            "Navigation session disposed"
        );
    }

    fn cancel_in_flight(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.cancel();
        }
    }
}

impl<S: DirectorySource> Drop for NavigationSession<S> {
    fn drop(&mut self) {
        self.cancel_in_flight();
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records every observer callback.
    #[derive(Clone, Default)]
    pub struct Recorder {
        pub listings: Arc<Mutex<Vec<PathBuf>>>,
        pub errors: Arc<Mutex<Vec<(PathBuf, String)>>>,
    }

    impl Recorder {
        pub fn boxed(&self) -> Box<dyn SessionObserver> {
            Box::new(self.clone())
        }

        pub fn listing_count(&self) -> usize {
            self.listings.lock().unwrap().len()
        }

        pub fn error_count(&self) -> usize {
            self.errors.lock().unwrap().len()
        }
    }

    impl SessionObserver for Recorder {
        fn on_listing(&mut self, listing: &Listing) {
            self.listings.lock().unwrap().push(listing.directory.clone());
        }

        fn on_error(&mut self, current_dir: &Path, error: &AppError) {
            self.errors
                .lock()
                .unwrap()
                .push((current_dir.to_path_buf(), error.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::Recorder;
    use super::*;
    use crate::config::ListingConfig;
    use crate::fs::classifier::Category;
    use crate::fs::dir_lister::test_support::{FakeSource, sample_tree};
    use std::sync::atomic::Ordering;

    fn lister(source: FakeSource) -> DirectoryLister<FakeSource> {
        DirectoryLister::new(source, ListingConfig::default())
    }

    async fn started(source: FakeSource, recorder: &Recorder) -> NavigationSession<FakeSource> {
        let mut session =
            NavigationSession::start("/out/app", lister(source), recorder.boxed()).unwrap();

        assert!(matches!(session.next_event().await, Some(SessionEvent::Ready { .. })));
        session
    }

    #[tokio::test]
    async fn start_lists_root() {
        let recorder = Recorder::default();
        let session = started(sample_tree(), &recorder).await;

        assert!(matches!(session.phase(), SessionPhase::Ready));
        assert_eq!(session.current_dir(), Path::new("/out/app"));
        assert_eq!(recorder.listing_count(), 1);

        let got: Vec<(&str, Category)> = session
            .listing()
            .iter()
            .map(|e| (e.display_name.as_str(), e.category))
            .collect();
        assert_eq!(
            got,
            [
                ("icon.png", Category::Image),
                ("MainActivity.java", Category::TextLike),
                ("res", Category::Directory),
            ]
        );
    }

    #[tokio::test]
    async fn second_navigation_supersedes_first() {
        let recorder = Recorder::default();
        let source = sample_tree().with_delay("/out/app/res", Duration::from_millis(200));
        let mut session = started(source, &recorder).await;

        session.navigate_to("res").unwrap();
        session.navigate_to("/out/app/res/layout").unwrap();
        assert!(matches!(
            session.phase(),
            SessionPhase::Listing { target } if target == Path::new("/out/app/res/layout")
        ));

        match session.next_event().await {
            Some(SessionEvent::Ready { directory, entries }) => {
                assert_eq!(directory, PathBuf::from("/out/app/res/layout"));
                assert_eq!(entries, 1);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(session.try_next_event().is_none());
        assert_eq!(session.current_dir(), Path::new("/out/app/res/layout"));
        assert_eq!(
            *recorder.listings.lock().unwrap(),
            vec![PathBuf::from("/out/app"), PathBuf::from("/out/app/res/layout")]
        );
    }

    #[tokio::test]
    async fn stale_result_that_raced_cancellation_is_discarded() {
        let recorder = Recorder::default();
        let mut session = started(sample_tree(), &recorder).await;

        session.navigate_to("res").unwrap();
        let stale_generation = session.generation;
        session.navigate_to("/out/app/res/layout").unwrap();

        // Simulate the superseded task having sent just before it was cancelled.
        session
            .outcome_tx
            .send(ListingOutcome {
                generation: stale_generation,
                directory: PathBuf::from("/out/app/res"),
                result: Ok(Listing::empty(PathBuf::from("/out/app/res"))),
            })
            .unwrap();

        match session.next_event().await {
            Some(SessionEvent::Ready { directory, .. }) => {
                assert_eq!(directory, PathBuf::from("/out/app/res/layout"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(recorder.listing_count(), 2);
    }

    #[tokio::test]
    async fn failed_navigation_rolls_back() {
        let recorder = Recorder::default();
        let mut session = started(sample_tree().with_denied("/out/app/res"), &recorder).await;
        let before = session.listing().clone();

        session.navigate_to("res").unwrap();
        assert_eq!(session.current_dir(), Path::new("/out/app/res"));

        match session.next_event().await {
            Some(SessionEvent::Failed { directory, error }) => {
                assert_eq!(directory, PathBuf::from("/out/app/res"));
                assert!(matches!(error, AppError::AccessDenied(_)));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        assert_eq!(session.current_dir(), Path::new("/out/app"));
        assert_eq!(session.listing(), &before);
        assert!(matches!(session.phase(), SessionPhase::Failed(AppError::AccessDenied(_))));
        assert_eq!(recorder.listing_count(), 1);
        assert_eq!(recorder.error_count(), 1);
        assert_eq!(recorder.errors.lock().unwrap()[0].0, PathBuf::from("/out/app"));
    }

    #[tokio::test]
    async fn panicking_listing_fails_instead_of_hanging() {
        let recorder = Recorder::default();
        let mut session = started(sample_tree().with_panic("/out/app/res"), &recorder).await;

        session.navigate_to("res").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), session.next_event())
            .await
            .expect("next_event hung on a panicked listing");

        assert!(matches!(event, Some(SessionEvent::Failed { .. })));
        assert_eq!(session.current_dir(), Path::new("/out/app"));
        assert_eq!(recorder.error_count(), 1);
    }

    #[tokio::test]
    async fn superseded_then_failed_rolls_back_to_last_committed() {
        let recorder = Recorder::default();
        let mut session = started(sample_tree(), &recorder).await;

        session.navigate_to("res").unwrap();
        session.navigate_to("missing").unwrap();

        assert!(matches!(session.next_event().await, Some(SessionEvent::Failed { .. })));
        assert_eq!(session.current_dir(), Path::new("/out/app"));
    }

    #[tokio::test]
    async fn navigate_up_exits_at_root() {
        let recorder = Recorder::default();
        let mut session = started(sample_tree(), &recorder).await;

        assert_eq!(session.navigate_up().unwrap(), UpOutcome::Exit);
        assert!(!session.is_listing());
        assert_eq!(recorder.listing_count(), 1);

        session.navigate_to("res/layout").unwrap();
        session.next_event().await.unwrap();

        assert_eq!(
            session.navigate_up().unwrap(),
            UpOutcome::Navigating(PathBuf::from("/out/app/res"))
        );
        session.next_event().await.unwrap();
        assert_eq!(session.current_dir(), Path::new("/out/app/res"));
    }

    #[tokio::test]
    async fn navigate_outside_root_is_rejected() {
        let recorder = Recorder::default();
        let mut session = started(sample_tree(), &recorder).await;

        assert!(matches!(session.navigate_to(".."), Err(AppError::OutsideRoot { .. })));
        assert!(matches!(session.navigate_to("/etc"), Err(AppError::OutsideRoot { .. })));
        assert!(!session.is_listing());
        assert_eq!(session.current_dir(), Path::new("/out/app"));
    }

    #[tokio::test]
    async fn refresh_relists_current_directory() {
        let recorder = Recorder::default();
        let mut session = started(sample_tree(), &recorder).await;

        session.refresh();
        session.next_event().await.unwrap();

        assert_eq!(session.lister().source().reads.load(Ordering::SeqCst), 2);
        assert_eq!(recorder.listing_count(), 2);
    }

    #[tokio::test]
    async fn save_and_restore_without_relisting() {
        let recorder = Recorder::default();
        let mut session = started(sample_tree(), &recorder)
            .await
            .with_source(SourceInfo::new("com.example.app"));

        session.navigate_to("res").unwrap();
        session.next_event().await.unwrap();
        let saved = session.save();
        session.dispose();

        let restored_recorder = Recorder::default();
        let restored = NavigationSession::restore(
            saved,
            lister(sample_tree()),
            restored_recorder.boxed(),
            None,
        )
        .unwrap();

        assert_eq!(restored.current_dir(), Path::new("/out/app/res"));
        assert_eq!(restored.root_dir(), Path::new("/out/app"));
        assert_eq!(restored.listing().len(), 2);
        assert!(matches!(restored.phase(), SessionPhase::Ready));
        assert_eq!(restored.source_info().unwrap().package_name.as_str(), "com.example.app");
        assert_eq!(restored.lister().source().reads.load(Ordering::SeqCst), 0);
        assert_eq!(restored_recorder.listing_count(), 1);
    }

    #[tokio::test]
    async fn save_while_listing_keeps_committed_directory() {
        let recorder = Recorder::default();
        let source = sample_tree().with_delay("/out/app/res/layout", Duration::from_millis(200));
        let mut session = started(source, &recorder).await;

        session.navigate_to("res").unwrap();
        session.next_event().await.unwrap();
        session.navigate_to("layout").unwrap();

        let saved = session.save();
        session.dispose();

        assert_eq!(saved.current_dir, PathBuf::from("/out/app/res"));
        assert!(saved.last_listing.as_ref().is_some_and(|l| l.len() == 2));

        // The layout directory became unreadable since; restore must not depend on it.
        let restored_recorder = Recorder::default();
        let restored = NavigationSession::restore(
            saved,
            lister(sample_tree().with_denied("/out/app/res/layout")),
            restored_recorder.boxed(),
            None,
        )
        .unwrap();

        assert!(!restored.is_listing());
        assert_eq!(restored.current_dir(), Path::new("/out/app/res"));
        assert_eq!(restored.listing().len(), 2);
        assert_eq!(restored_recorder.error_count(), 0);
    }

    #[tokio::test]
    async fn restore_without_listing_relists() {
        let recorder = Recorder::default();
        let saved = SavedSession {
            version: SavedSession::CURRENT_VERSION,
            root_dir: PathBuf::from("/out/app"),
            current_dir: PathBuf::from("/out/app/res"),
            source: None,
            last_listing: None,
            saved_at: Utc::now(),
        };

        let mut session =
            NavigationSession::restore(saved, lister(sample_tree()), recorder.boxed(), None)
                .unwrap();

        assert!(session.is_listing());
        assert!(matches!(session.next_event().await, Some(SessionEvent::Ready { .. })));
        assert_eq!(session.current_dir(), Path::new("/out/app/res"));
        assert_eq!(session.listing().len(), 2);
    }

    #[tokio::test]
    async fn restore_outside_root_falls_back_to_root() {
        let recorder = Recorder::default();
        let saved = SavedSession {
            version: SavedSession::CURRENT_VERSION,
            root_dir: PathBuf::from("/out/app"),
            current_dir: PathBuf::from("/somewhere/else"),
            source: None,
            last_listing: Some(Listing::empty(PathBuf::from("/somewhere/else"))),
            saved_at: Utc::now(),
        };

        let mut session =
            NavigationSession::restore(saved, lister(sample_tree()), recorder.boxed(), None)
                .unwrap();

        session.next_event().await.unwrap();
        assert_eq!(session.current_dir(), Path::new("/out/app"));
    }

    #[tokio::test]
    async fn dispose_cancels_and_silences_observer() {
        let recorder = Recorder::default();
        let source = sample_tree().with_delay("/out/app/res", Duration::from_millis(100));
        let mut session = started(source, &recorder).await;

        session.navigate_to("res").unwrap();
        session.dispose();

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(recorder.listing_count(), 1);
        assert_eq!(recorder.error_count(), 0);
    }
}
