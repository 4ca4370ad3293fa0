pub mod error;

pub mod config;

pub mod logging;

pub mod fs {
    pub mod classifier;
    pub use classifier::{Category, Classify, ExtensionClassifier, classify, mime_for};

    pub mod entry;
    pub use entry::{Entry, Listing};

    pub mod source;
    pub use source::{DirectorySource, LocalFs, RawChild};

    pub mod dir_lister;
    pub use dir_lister::{DirectoryLister, ListingOutcome, ListingTask};
}

pub mod model {
    pub mod nav_state;
    pub use nav_state::{NavigationState, SavedSession, SourceInfo};

    pub mod persistence;
    pub use persistence::SessionStore;
}

pub mod controller {
    pub mod session;
    pub use session::{NavigationSession, SessionEvent, SessionObserver, SessionPhase, UpOutcome};

    pub mod open_dispatch;
    pub use open_dispatch::{OpenAction, ViewerHost, open_entry, resolve_open};
}

pub mod view {
    pub mod terminal;
    pub use terminal::TerminalHost;
}

pub use error::AppError;
