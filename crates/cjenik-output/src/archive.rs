//! Dated ZIP archival of a day's CSV output.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::OutputError;

/// Notice text bundled into every archive, embedded at compile time.
pub const ARCHIVE_INFO: &str = include_str!("../archive-info.txt");

/// Write the bundled `archive-info.txt` notice into the date directory.
///
/// # Errors
///
/// Returns [`OutputError::Io`] if the file cannot be written.
pub fn copy_archive_info(date_dir: &Path) -> Result<(), OutputError> {
    fs::write(date_dir.join("archive-info.txt"), ARCHIVE_INFO)?;
    Ok(())
}

/// Build a deflate level-9 ZIP of `date_dir` at `output`.
///
/// Entry paths are relative to `date_dir` (no leading date component).
/// Entry order follows filesystem iteration and is not a contract.
///
/// # Errors
///
/// Returns [`OutputError`] on any filesystem or ZIP failure.
pub fn create_archive(date_dir: &Path, output: &Path) -> Result<(), OutputError> {
    let file = File::create(output)?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9));

    add_dir(&mut writer, date_dir, date_dir, options)?;
    writer.finish()?;
    Ok(())
}

fn add_dir(
    writer: &mut ZipWriter<BufWriter<File>>,
    root: &Path,
    dir: &Path,
    options: SimpleFileOptions,
) -> Result<(), OutputError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            add_dir(writer, root, &path, options)?;
        } else {
            let relative = path
                .strip_prefix(root)
                .map_err(io::Error::other)?
                .to_string_lossy()
                .replace('\\', "/");
            writer.start_file(relative, options)?;
            let mut source = File::open(&path)?;
            io::copy(&mut source, writer)?;
        }
    }
    Ok(())
}
