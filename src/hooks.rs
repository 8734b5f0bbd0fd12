//! Hook library configuration and the loader seam.
//!
//! Actually opening shared objects is the job of an external loader; this
//! module describes the libraries a configuration asks for and defines the
//! [`HookLibraryLoader`] contract the engine drives. Loading happens last in
//! the commit phase and is not undone if a load fails halfway.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::document::Position;
use crate::error::{Error, Result, ValidationError};

/// One library entry from `hooks-libraries`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HookLibrary {
    pub path: PathBuf,
    /// Free-form parameters handed to the library on load.
    pub parameters: Option<serde_json::Value>,
    #[serde(skip)]
    pub position: Position,
}

/// Libraries requested by a configuration, in load order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct HooksConfig {
    libraries: Vec<HookLibrary>,
}

impl HooksConfig {
    pub fn add(&mut self, library: HookLibrary) {
        self.libraries.push(library);
    }

    pub fn libraries(&self) -> &[HookLibrary] {
        &self.libraries
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.libraries.iter().map(|library| library.path.as_path())
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

/// Loads the hook libraries of a committed configuration.
pub trait HookLibraryLoader: Send {
    /// Checks that every library could be loaded, without loading any.
    ///
    /// Called while the configuration is still being validated, so a failure
    /// here rejects the configuration.
    fn validate(&self, hooks: &HooksConfig) -> Result<()>;

    /// Replaces the loaded set with `hooks`. Not reversible.
    fn load(&mut self, hooks: &HooksConfig) -> Result<()>;
}

/// Loader that checks library files on disk and records what was loaded.
#[derive(Debug, Default)]
pub struct FsHookLoader {
    loaded: Vec<PathBuf>,
}

impl FsHookLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loaded(&self) -> &[PathBuf] {
        &self.loaded
    }

    fn check(library: &HookLibrary) -> std::result::Result<(), String> {
        if !library.path.is_absolute() {
            return Err(format!(
                "hook library path '{}' is not absolute",
                library.path.display()
            ));
        }
        if !library.path.is_file() {
            return Err(format!(
                "hook library '{}' does not exist or is not a file",
                library.path.display()
            ));
        }
        Ok(())
    }
}

impl HookLibraryLoader for FsHookLoader {
    fn validate(&self, hooks: &HooksConfig) -> Result<()> {
        for library in hooks.libraries() {
            Self::check(library).map_err(|message| {
                Error::Validation(ValidationError::invalid(
                    format!("hooks libraries failed to validate: {}", message),
                    library.position,
                ))
            })?;
        }
        Ok(())
    }

    fn load(&mut self, hooks: &HooksConfig) -> Result<()> {
        self.loaded.clear();
        for library in hooks.libraries() {
            Self::check(library).map_err(|message| {
                Error::Commit(format!("failed to load hook library: {}", message))
            })?;
            info!("hook library {} loaded", library.path.display());
            self.loaded.push(library.path.clone());
        }
        Ok(())
    }
}
