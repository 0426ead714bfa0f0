use crate::error::{Result, SpectralEventsError};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// Open a file and map it into memory (read-only)
pub fn mmap_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path).map_err(SpectralEventsError::Io)?;
    if file.metadata()?.len() == 0 {
        return Err(SpectralEventsError::EmptyInput(format!(
            "{} is empty",
            path.display()
        )));
    }
    let mmap = unsafe { Mmap::map(&file).map_err(SpectralEventsError::Io)? };
    Ok(mmap)
}
