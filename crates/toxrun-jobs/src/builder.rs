//! Job construction.
//!
//! Pure: given the tool invocation, the requested endpoints and the run's
//! file layout, produce one [`Job`] per endpoint. Nothing here touches the
//! filesystem or spawns a process.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use toxrun_core::Job;

/// Main class of the prediction tool's command-line entry point.
pub const DEFAULT_MAIN_CLASS: &str = "ToxPredictor.Application.Calculations.RunFromCommandLine";

/// Computation method passed with `-m`.
pub const DEFAULT_MODE: &str = "consensus";

/// File name of the prediction tool's jar.
pub const JAR_NAME: &str = "WebTEST.jar";

/// How to start the prediction tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolInvocation {
    pub java_bin: PathBuf,
    pub jar_path: PathBuf,
    pub main_class: String,
    pub mode: String,
    /// The tool home; the tool resolves its `Database` folder relative to it.
    pub working_dir: PathBuf,
}

impl ToolInvocation {
    pub fn new(java_bin: impl Into<PathBuf>, jar_path: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            java_bin: java_bin.into(),
            jar_path: jar_path.into(),
            main_class: DEFAULT_MAIN_CLASS.to_string(),
            mode: DEFAULT_MODE.to_string(),
            working_dir: working_dir.into(),
        }
    }

    /// Full argument vector for one endpoint.
    pub fn command(&self, input: &Path, output: &Path, endpoint: &str) -> Vec<String> {
        vec![
            self.java_bin.to_string_lossy().into_owned(),
            "-cp".to_string(),
            self.jar_path.to_string_lossy().into_owned(),
            self.main_class.clone(),
            "-i".to_string(),
            input.to_string_lossy().into_owned(),
            "-o".to_string(),
            output.to_string_lossy().into_owned(),
            "-e".to_string(),
            endpoint.to_string(),
            "-m".to_string(),
            self.mode.clone(),
        ]
    }
}

/// Headless display wrapper for tools that insist on a display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VirtualDisplay {
    pub launcher: PathBuf,
    pub display: u32,
    pub server_args: String,
}

impl VirtualDisplay {
    pub fn new(launcher: impl Into<PathBuf>) -> Self {
        Self {
            launcher: launcher.into(),
            display: 99,
            server_args: "-screen 0 1024x768x24".to_string(),
        }
    }

    /// Arguments placed in front of the tool command.
    pub fn prefix(&self) -> Vec<String> {
        vec![
            self.launcher.to_string_lossy().into_owned(),
            "-n".to_string(),
            self.display.to_string(),
            format!("--server-args={}", self.server_args),
        ]
    }
}

/// Artifact file name for one endpoint of a run.
pub fn artifact_file_name(token: &str, endpoint: &str) -> String {
    format!("pred_{token}_{endpoint}.csv")
}

/// Input file name for a run.
pub fn input_file_name(token: &str) -> String {
    format!("input_{token}.smi")
}

/// Builds the per-endpoint jobs of a run.
#[derive(Debug, Clone)]
pub struct JobBuilder {
    tool: ToolInvocation,
    display: Option<VirtualDisplay>,
}

impl JobBuilder {
    pub fn new(tool: ToolInvocation) -> Self {
        Self { tool, display: None }
    }

    pub fn with_virtual_display(mut self, display: Option<VirtualDisplay>) -> Self {
        self.display = display;
        self
    }

    pub fn virtual_display(&self) -> Option<&VirtualDisplay> {
        self.display.as_ref()
    }

    /// One job per endpoint, in the order given.
    pub fn build(&self, endpoints: &[String], token: &str, input: &Path, output_dir: &Path) -> Vec<Job> {
        endpoints
            .iter()
            .map(|endpoint| {
                let artifact_path = output_dir.join(artifact_file_name(token, endpoint));
                let mut command = self
                    .display
                    .as_ref()
                    .map(VirtualDisplay::prefix)
                    .unwrap_or_default();
                command.extend(self.tool.command(input, &artifact_path, endpoint));

                Job {
                    endpoint: endpoint.clone(),
                    command,
                    working_dir: self.tool.working_dir.clone(),
                    artifact_path,
                    virtual_display: self.display.is_some(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> ToolInvocation {
        ToolInvocation::new("/usr/bin/java", "/opt/test/WebTEST.jar", "/opt/test")
    }

    #[test]
    fn test_build_direct_command() {
        let jobs = JobBuilder::new(tool()).build(
            &["LC50".to_string()],
            "ab12cd34",
            Path::new("/tmp/run/input_ab12cd34.smi"),
            Path::new("/tmp/run/output"),
        );
        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(
            job.command,
            vec![
                "/usr/bin/java",
                "-cp",
                "/opt/test/WebTEST.jar",
                DEFAULT_MAIN_CLASS,
                "-i",
                "/tmp/run/input_ab12cd34.smi",
                "-o",
                "/tmp/run/output/pred_ab12cd34_LC50.csv",
                "-e",
                "LC50",
                "-m",
                "consensus",
            ]
        );
        assert_eq!(job.working_dir, PathBuf::from("/opt/test"));
        assert!(!job.virtual_display);
        assert_eq!(job.artifact_name(), "pred_ab12cd34_LC50.csv");
    }

    #[test]
    fn test_build_with_virtual_display() {
        let jobs = JobBuilder::new(tool())
            .with_virtual_display(Some(VirtualDisplay::new("/usr/bin/xvfb-run")))
            .build(
                &["BP".to_string(), "MP".to_string()],
                "ab12cd34",
                Path::new("/tmp/in.smi"),
                Path::new("/tmp/out"),
            );
        assert_eq!(jobs.len(), 2);
        assert!(jobs[0].virtual_display);
        assert_eq!(
            &jobs[0].command[..5],
            &[
                "/usr/bin/xvfb-run",
                "-n",
                "99",
                "--server-args=-screen 0 1024x768x24",
                "/usr/bin/java",
            ]
        );
        assert_eq!(jobs[1].endpoint, "MP");
        assert_ne!(jobs[0].artifact_path, jobs[1].artifact_path);
    }

    #[test]
    fn test_names() {
        assert_eq!(artifact_file_name("0011aabb", "WS"), "pred_0011aabb_WS.csv");
        assert_eq!(input_file_name("0011aabb"), "input_0011aabb.smi");
    }
}
