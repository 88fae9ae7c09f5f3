use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

pub const DEFAULT_DEBUGGING_PORT: u16 = 9222;

/// Starts Chrome with an unpacked extension loaded and remote debugging enabled
pub struct ChromeLauncher {
    chrome_path: PathBuf,
    profile_path: PathBuf,
    extension_path: Option<PathBuf>,
    debugging_port: u16,
    headless: bool,
}

impl ChromeLauncher {
    pub fn new(chrome_path: PathBuf, profile_path: PathBuf) -> Self {
        Self {
            chrome_path,
            profile_path,
            extension_path: None,
            debugging_port: DEFAULT_DEBUGGING_PORT,
            headless: false,
        }
    }

    /// Load the unpacked extension at `path` and no other
    pub fn with_extension(mut self, path: &Path) -> Self {
        self.extension_path = Some(path.to_path_buf());
        self
    }

    pub fn with_debugging_port(mut self, port: u16) -> Self {
        self.debugging_port = port;
        self
    }

    /// Use the new headless mode, the only headless mode that runs extensions
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn launch(&self) -> Result<Child> {
        if let Some(ext) = &self.extension_path
            && !ext.join("manifest.json").is_file()
        {
            return Err(Error::Browser(format!(
                "No manifest.json in extension directory: {}",
                ext.display()
            )));
        }

        let args = self.build_args();
        tracing::debug!("Launching {} {:?}", self.chrome_path.display(), args);

        Command::new(&self.chrome_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Browser(format!("Failed to launch Chrome: {}", e)))
    }

    fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--remote-debugging-port={}", self.debugging_port),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            format!("--user-data-dir={}", self.profile_path.display()),
        ];

        if let Some(ext) = &self.extension_path {
            args.push(format!("--disable-extensions-except={}", ext.display()));
            args.push(format!("--load-extension={}", ext.display()));
        }

        if self.headless {
            args.push("--headless=new".to_string());
        }

        args.push("about:blank".to_string());
        args
    }

    pub fn debugging_port(&self) -> u16 {
        self.debugging_port
    }
}
