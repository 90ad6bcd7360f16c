//! Deprecation warnings for renamed and removed option keys.
//!
//! Warnings point at the code that wrote or read the option, not at the
//! hook that noticed the deprecated key. Entry points capture their
//! caller with `#[track_caller]` and hand a [`CallSite`] down; the
//! reporter never inspects the stack.
//!
//! The reported `stacklevel` counts frames from the emit site up to the
//! user frame: `3` for a write through [`SessionOptions::set`], `4` for a
//! read through a getter, plus one when the call came in through
//! [`Session`]'s `set_option`/`get_option`.
//!
//! [`SessionOptions::set`]: crate::options::SessionOptions::set
//! [`Session`]: crate::session::Session

use std::collections::HashSet;
use std::panic::Location;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::warn;

/// Keys already logged by this process; later occurrences are recorded
/// but not logged again.
static LOGGED_KEYS: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Which operation touched the deprecated key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningPath {
    Set,
    Get,
}

impl WarningPath {
    const fn base_stacklevel(self) -> u8 {
        match self {
            Self::Set => 3,
            Self::Get => 4,
        }
    }
}

/// Where an option operation entered the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    location: &'static Location<'static>,
    via_session: bool,
}

impl CallSite {
    /// Capture the caller of the surrounding `#[track_caller]` chain.
    #[track_caller]
    pub fn here() -> Self {
        Self {
            location: Location::caller(),
            via_session: false,
        }
    }

    /// Tag the call site as having passed through the session façade.
    #[must_use]
    pub(crate) fn through_session(mut self) -> Self {
        self.via_session = true;
        self
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    pub fn via_session(&self) -> bool {
        self.via_session
    }

    pub fn stacklevel(&self, path: WarningPath) -> u8 {
        path.base_stacklevel() + u8::from(self.via_session)
    }
}

/// One deprecated-key occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeprecationWarning {
    pub key: String,
    pub replacement: Option<String>,
    pub message: String,
    pub path: WarningPath,
    pub stacklevel: u8,
    pub file: &'static str,
    pub line: u32,
}

/// Records and logs deprecation warnings for one session.
#[derive(Debug, Default)]
pub struct DeprecationReporter {
    history: Mutex<Vec<DeprecationWarning>>,
}

impl DeprecationReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a deprecated-key occurrence and log it the first time the
    /// key is seen by this process.
    pub fn report(
        &self,
        key: &str,
        replacement: Option<&str>,
        path: WarningPath,
        site: CallSite,
    ) -> DeprecationWarning {
        let message = match replacement {
            Some(new) => format!("`{key}` has been deprecated in favor of the `{new}` option"),
            None => format!("`{key}` has been deprecated"),
        };
        let warning = DeprecationWarning {
            key: key.to_string(),
            replacement: replacement.map(str::to_string),
            message,
            path,
            stacklevel: site.stacklevel(path),
            file: site.location().file(),
            line: site.location().line(),
        };

        if LOGGED_KEYS.lock().insert(key.to_string()) {
            warn!(
                target: "streamtap::deprecation",
                key,
                replacement,
                file = warning.file,
                line = warning.line,
                stacklevel = warning.stacklevel,
                "{}",
                warning.message
            );
        }

        self.history.lock().push(warning.clone());
        warning
    }

    /// All warnings recorded so far.
    pub fn warnings(&self) -> Vec<DeprecationWarning> {
        self.history.lock().clone()
    }

    /// Drain the recorded warnings.
    pub fn take(&self) -> Vec<DeprecationWarning> {
        std::mem::take(&mut *self.history.lock())
    }

    pub fn count_for(&self, key: &str) -> usize {
        self.history.lock().iter().filter(|w| w.key == key).count()
    }
}
