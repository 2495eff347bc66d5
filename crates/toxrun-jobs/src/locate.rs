//! Discovery of the external pieces a run needs: the Java runtime, the
//! tool's jar and `Database` folder, and the optional display launcher.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, warn};

use toxrun_core::{Result, ToxError};

use crate::builder::{VirtualDisplay, JAR_NAME};

/// Name of the virtual-display launcher looked up on `PATH`.
pub const XVFB_LAUNCHER: &str = "xvfb-run";

const DATABASE_DIR: &str = "Database";

fn is_executable(path: &Path) -> bool {
    let Ok(meta) = path.metadata() else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Look `name` up on `PATH`.
pub fn which(name: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

/// Resolve the Java executable.
///
/// A value containing a path separator must point at an executable file;
/// failing that, its basename is looked up on `PATH`. A bare name is looked
/// up on `PATH` directly.
pub fn resolve_java(candidate: &str) -> Result<PathBuf> {
    let path = Path::new(candidate);
    let has_separator = path.is_absolute() || candidate.contains(std::path::MAIN_SEPARATOR) || candidate.contains('/');

    let resolved = if has_separator {
        if is_executable(path) {
            Some(path.to_path_buf())
        } else {
            path.file_name()
                .and_then(|name| name.to_str())
                .and_then(which)
        }
    } else {
        which(candidate)
    };

    let resolved = resolved.ok_or_else(|| ToxError::ExecutableNotFound(candidate.to_string()))?;
    debug!(java = %resolved.display(), "resolved java executable");
    Ok(resolved)
}

fn jar_candidates(home: &Path) -> Vec<PathBuf> {
    vec![
        home.join(JAR_NAME),
        home.join("..").join(JAR_NAME),
        home.join("target").join(JAR_NAME),
    ]
}

/// Find `WebTEST.jar` in the tool home, its parent, or `target/`.
pub fn find_jar(home: &Path) -> Result<PathBuf> {
    jar_candidates(home)
        .into_iter()
        .find(|p| p.is_file())
        .ok_or_else(|| ToxError::JarNotFound(home.to_path_buf()))
}

/// Find the tool's `Database` folder in the home or its parent.
pub fn find_database(home: &Path) -> Option<PathBuf> {
    [home.join(DATABASE_DIR), home.join("..").join(DATABASE_DIR)]
        .into_iter()
        .find(|p| p.is_dir())
}

/// The virtual display to wrap jobs in, unless disabled.
///
/// Only Unix hosts use one. A missing launcher is not fatal: the tool is
/// invoked directly.
pub fn resolve_virtual_display(disabled: bool) -> Option<VirtualDisplay> {
    if disabled || !cfg!(unix) {
        return None;
    }
    match which(XVFB_LAUNCHER) {
        Some(launcher) => Some(VirtualDisplay::new(launcher)),
        None => {
            warn!(launcher = XVFB_LAUNCHER, "virtual display launcher not found, running without it");
            None
        }
    }
}

/// First line of `java -version`, which the JVM prints on stderr.
pub async fn java_version(java: &Path) -> Option<String> {
    let child = Command::new(java)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .ok()?;

    let output = tokio::time::timeout(Duration::from_secs(10), child.wait_with_output())
        .await
        .ok()?
        .ok()?;
    if !output.status.success() {
        return None;
    }

    let text = if output.stderr.is_empty() {
        output.stdout
    } else {
        output.stderr
    };
    String::from_utf8_lossy(&text)
        .lines()
        .next()
        .map(|line| line.trim().to_string())
}

/// One line of the environment check.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ComponentCheck {
    pub name: String,
    pub required: bool,
    pub location: Option<PathBuf>,
    pub detail: Option<String>,
}

impl ComponentCheck {
    pub fn found(&self) -> bool {
        self.location.is_some()
    }
}

/// Availability of everything a run depends on.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EnvironmentReport {
    pub components: Vec<ComponentCheck>,
}

impl EnvironmentReport {
    /// Whether every required component was found.
    pub fn ok(&self) -> bool {
        self.components.iter().all(|c| c.found() || !c.required)
    }

    pub fn missing_required(&self) -> impl Iterator<Item = &ComponentCheck> {
        self.components.iter().filter(|c| c.required && !c.found())
    }
}

/// Probe the Java runtime, the tool home and the display launcher.
pub async fn check_environment(java: &str, home: &Path) -> EnvironmentReport {
    let java_path = resolve_java(java).ok();
    let version = match &java_path {
        Some(path) => java_version(path).await,
        None => None,
    };

    let java = ComponentCheck {
        name: "java".to_string(),
        required: true,
        detail: version.or_else(|| java_path.is_none().then(|| format!("'{java}' not found on PATH"))),
        location: java_path,
    };

    let jar = ComponentCheck {
        name: JAR_NAME.to_string(),
        required: true,
        location: find_jar(home).ok(),
        detail: None,
    };

    let database = ComponentCheck {
        name: DATABASE_DIR.to_string(),
        required: true,
        location: find_database(home),
        detail: None,
    };

    let xvfb = ComponentCheck {
        name: XVFB_LAUNCHER.to_string(),
        required: false,
        location: if cfg!(unix) { which(XVFB_LAUNCHER) } else { None },
        detail: Some("optional, used on Linux hosts without a display".to_string()),
    };

    EnvironmentReport {
        components: vec![java, jar, database, xvfb],
    }
}
