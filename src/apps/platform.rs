//! Operating-system side of the application launcher.

use crate::core::error::{Error, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// An application bundle found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledApp {
    pub name: String,
    pub path: PathBuf,
}

/// Queries and actions the application cache needs from the OS.
#[async_trait]
pub trait AppPlatform: Send + Sync {
    /// Installed application bundles, sorted by name
    async fn installed_apps(&self) -> Result<Vec<InstalledApp>>;

    /// Names of the applications currently running
    async fn running_app_names(&self) -> Result<Vec<String>>;

    /// Bring a running application to the foreground
    async fn activate(&self, name: &str) -> Result<()>;

    /// Start an application from its bundle path
    async fn launch(&self, path: &Path) -> Result<()>;

    /// Icon for a bundle as a data URL. May block on disk reads.
    fn icon(&self, path: &Path) -> Option<String>;
}

/// [`AppPlatform`] backed by the local machine.
#[derive(Debug, Clone)]
pub struct SystemPlatform {
    application_dirs: Vec<PathBuf>,
}

impl SystemPlatform {
    pub fn new(application_dirs: Vec<PathBuf>) -> Self {
        Self { application_dirs }
    }
}

#[async_trait]
impl AppPlatform for SystemPlatform {
    async fn installed_apps(&self) -> Result<Vec<InstalledApp>> {
        let app_dirs = self.application_dirs.clone();
        tokio::task::spawn_blocking(move || scan_bundles(&app_dirs))
            .await
            .map_err(|e| Error::OsQuery(format!("bundle scan failed: {}", e)))
    }

    async fn running_app_names(&self) -> Result<Vec<String>> {
        if cfg!(target_os = "macos") {
            let output = run_command(
                "osascript",
                &[
                    "-e",
                    "tell application \"System Events\" to get name of every process whose background only is false",
                ],
            )
            .await?;
            Ok(parse_osascript_list(&output))
        } else {
            let output = run_command("ps", &["-A", "-o", "comm="]).await?;
            Ok(parse_ps_output(&output))
        }
    }

    async fn activate(&self, name: &str) -> Result<()> {
        if cfg!(target_os = "macos") {
            let script = format!("tell application \"{}\" to activate", name.replace('"', "\\\""));
            run_command("osascript", &["-e", script.as_str()]).await?;
        } else {
            run_command("wmctrl", &["-a", name]).await?;
        }
        Ok(())
    }

    async fn launch(&self, path: &Path) -> Result<()> {
        let opener = if cfg!(target_os = "macos") {
            "open"
        } else {
            "xdg-open"
        };
        let path = path.to_string_lossy();
        run_command(opener, &[&*path]).await?;
        Ok(())
    }

    fn icon(&self, path: &Path) -> Option<String> {
        let icon_path = find_icon_file(path)?;
        match fs::read(&icon_path) {
            Ok(bytes) => Some(format!("data:image/icns;base64,{}", BASE64.encode(bytes))),
            Err(e) => {
                debug!("Could not read icon {}: {}", icon_path.display(), e);
                None
            }
        }
    }
}

async fn run_command(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| Error::OsQuery(format!("failed to run {}: {}", program, e)))?;

    if !output.status.success() {
        return Err(Error::OsQuery(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Background helpers ship as bundles too; they are not user-facing apps.
fn is_helper_name(name: &str) -> bool {
    name.contains("Helper") || name.contains("Agent") || name.ends_with("Assistant")
}

/// Collect `.app` bundles directly under each directory. Unreadable
/// directories are ignored; duplicate names keep the first bundle seen.
pub fn scan_bundles(dirs: &[PathBuf]) -> Vec<InstalledApp> {
    let mut apps = Vec::new();

    for dir in dirs {
        let Ok(entries) = fs::read_dir(dir) else {
            debug!("Skipping application directory {}", dir.display());
            continue;
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() || path.extension().and_then(|e| e.to_str()) != Some("app") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|n| n.to_str()) else {
                continue;
            };
            if is_helper_name(name) {
                continue;
            }
            apps.push(InstalledApp {
                name: name.to_string(),
                path,
            });
        }
    }

    apps.sort_by(|a, b| a.name.cmp(&b.name));
    apps.dedup_by(|a, b| a.name == b.name);
    apps
}

/// `osascript` prints AppleScript lists as `a, b, c`
fn parse_osascript_list(output: &str) -> Vec<String> {
    output
        .trim()
        .split(", ")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `ps -o comm=` prints one command per line, sometimes as a full path
fn parse_ps_output(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            Path::new(line)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| line.to_string())
        })
        .collect()
}

fn find_icon_file(bundle: &Path) -> Option<PathBuf> {
    let resources = bundle.join("Contents").join("Resources");
    let name = bundle.file_stem().and_then(|n| n.to_str()).unwrap_or_default();

    let candidates = [
        format!("{}.icns", name),
        "AppIcon.icns".to_string(),
        "Icon.icns".to_string(),
        "electron.icns".to_string(),
    ];
    if let Some(found) = candidates
        .iter()
        .map(|file| resources.join(file))
        .find(|path| path.is_file())
    {
        return Some(found);
    }

    let plist = fs::read_to_string(bundle.join("Contents").join("Info.plist")).ok()?;
    let icon_file = plist_icon_file(&plist)?;
    let path = resources.join(icon_file);
    path.is_file().then_some(path)
}

/// Value of `CFBundleIconFile` in an XML plist, with `.icns` appended if missing
fn plist_icon_file(plist: &str) -> Option<String> {
    let key = plist.find("<key>CFBundleIconFile</key>")?;
    let rest = &plist[key..];
    let start = rest.find("<string>")? + "<string>".len();
    let end = rest[start..].find("</string>")? + start;
    let value = rest[start..end].trim();
    if value.is_empty() {
        return None;
    }
    if value.ends_with(".icns") {
        Some(value.to_string())
    } else {
        Some(format!("{}.icns", value))
    }
}


