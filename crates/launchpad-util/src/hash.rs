use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Hex BLAKE3 digest of a file's contents.
///
/// A local checkout uses this as the id of each listed file, and callers hand
/// the id back to fetch the contents. Identical files share an id. The file is
/// streamed, never read whole.
///
/// # Errors
/// Returns an error if the file cannot be opened or read.
pub fn object_id_for_file(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}
