use std::path::{Path, PathBuf};
use std::process::Command;
use termbg_common::error::ProcessError;
use termbg_common::{Result, TermbgError};

/// Hands the displayed images to something that can show them.
pub trait ImageOpener: Send {
    fn open(&self, paths: &[PathBuf]) -> Result<()>;
}

const OPENERS: [&str; 2] = ["xdg-open", "open"];

/// Opens images with the desktop's default viewer.
#[derive(Debug, Clone, Default)]
pub struct SystemOpener;

impl SystemOpener {
    fn find_opener() -> Result<PathBuf> {
        OPENERS
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or_else(|| TermbgError::Process(ProcessError::OpenerNotFound {
                tried: OPENERS.join(", "),
            }))
    }

    fn open_one(opener: &Path, image: &Path) -> Result<()> {
        let mut cmd = Command::new(opener);
        cmd.arg(image);

        log::info!("Executing viewer command: {:?}", cmd);

        let output = cmd.output()
            .map_err(|e| TermbgError::Process(ProcessError::Execution {
                command: format!("{:?}", cmd),
                source: e,
            }))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::error!("viewer failed with exit code {}: {}",
                output.status.code().unwrap_or(-1), stderr);

            return Err(TermbgError::Process(ProcessError::NonZeroExit {
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.to_string(),
            }));
        }

        Ok(())
    }
}

impl ImageOpener for SystemOpener {
    fn open(&self, paths: &[PathBuf]) -> Result<()> {
        let opener = Self::find_opener()?;
        for image in paths {
            Self::open_one(&opener, image)?;
        }
        Ok(())
    }
}
