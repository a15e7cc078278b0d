//! Unpacking of workflow run log archives.

use pipeprobe_core::{Error, LogBundle, Result};
use std::io::{Cursor, Read};

/// Turn a run's zip log archive into one entry per text file.
///
/// GitHub stores a combined log per job at the top level and one file per
/// step inside a directory named after the job; both are kept, in archive order.
pub fn extract(archive: &[u8]) -> Result<LogBundle> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))
        .map_err(|e| Error::api(crate::PLATFORM, None, format!("invalid log archive: {e}")))?;

    let mut bundle = LogBundle::default();
    for index in 0..zip.len() {
        let mut file = zip
            .by_index(index)
            .map_err(|e| Error::api(crate::PLATFORM, None, format!("invalid log archive: {e}")))?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let mut raw = Vec::new();
        file.read_to_end(&mut raw)
            .map_err(|e| Error::io("read log archive entry", None, e))?;
        bundle.push(name, String::from_utf8_lossy(&raw));
    }
    Ok(bundle)
}
