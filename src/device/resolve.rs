// SPDX-License-Identifier: GPL-3.0-only
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, WatchError};

/// Identifier of the volume backing a path (`st_dev` on unix).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolve the device containing `path`.
///
/// The path itself does not have to exist yet: the nearest existing ancestor
/// decides. Symlinks are followed, so a link and its target resolve to the
/// target's device. Fails when nothing along the chain exists or when a
/// lookup fails for any reason other than absence (permissions, link loops).
pub fn device_for_path(path: impl AsRef<Path>) -> Result<DeviceId> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(WatchError::DeviceResolution {
            path: PathBuf::new(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "empty path"),
        });
    }

    // Relative paths climb into the working directory once their own
    // components are exhausted.
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|source| WatchError::DeviceResolution {
                path: path.to_path_buf(),
                source,
            })?
            .join(path)
    };

    for candidate in absolute.ancestors() {
        match std::fs::metadata(candidate) {
            Ok(metadata) => {
                let device = device_of(&metadata);
                debug!(path = %path.display(), resolved = %candidate.display(), %device, "Resolved device");
                return Ok(device);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // A dangling symlink, the watched path included, is a broken
                // chain rather than a path yet to be created.
                if is_symlink(candidate) {
                    return Err(WatchError::DeviceResolution {
                        path: path.to_path_buf(),
                        source: e,
                    });
                }
                continue;
            }
            Err(source) => {
                return Err(WatchError::DeviceResolution {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
    }

    Err(WatchError::DeviceResolution {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::NotFound, "no existing ancestor"),
    })
}

fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

#[cfg(unix)]
fn device_of(metadata: &std::fs::Metadata) -> DeviceId {
    use std::os::unix::fs::MetadataExt;
    DeviceId(metadata.dev())
}

#[cfg(not(unix))]
fn device_of(_metadata: &std::fs::Metadata) -> DeviceId {
    DeviceId(0)
}
