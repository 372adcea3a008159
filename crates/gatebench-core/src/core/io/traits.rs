use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Common interface of single-file artifact formats.
///
/// Implementors parse from any buffered reader and serialize to any writer; the path
/// helpers open and buffer the file.
pub trait ArtifactFile {
    /// The in-memory value this format persists.
    type Artifact;

    /// The error type for I/O and format failures.
    type Error: Error + From<io::Error>;

    /// Reads an artifact from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or the reader fails.
    fn read_from(reader: &mut impl BufRead) -> Result<Self::Artifact, Self::Error>;

    /// Writes an artifact to a writer.
    fn write_to(artifact: &Self::Artifact, writer: &mut impl Write) -> Result<(), Self::Error>;

    /// Reads an artifact from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self::Artifact, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Writes an artifact to a file path, creating or truncating the file.
    fn write_to_path<P: AsRef<Path>>(
        artifact: &Self::Artifact,
        path: P,
    ) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(artifact, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
