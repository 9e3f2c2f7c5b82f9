//! Report assembly: model commentary plus the essay it grades, then `.docx`.

use crate::docx::markdown_to_docx_bytes;
use crate::error::GradeError;
use crate::pipeline::artifacts::write_atomic;
use std::path::Path;
use tracing::info;

/// Join the commentary and, when `source` is given, the graded essay under
/// its own `###` heading.
///
/// `source` is `(heading, essay)`. The essay keeps its own paragraph breaks,
/// so it comes out of the classifier as plain paragraphs.
pub fn compose_report(commentary: &str, source: Option<(&str, &str)>) -> String {
    let commentary = commentary.trim_end();
    match source {
        Some((heading, essay)) => format!(
            "{}\n\n### {}\n\n{}\n",
            commentary,
            heading.trim(),
            essay.trim()
        ),
        None => format!("{}\n", commentary),
    }
}

/// Classify `markdown` and write it to `path` as a Word document.
pub async fn markdown_to_docx(markdown: &str, path: impl AsRef<Path>) -> Result<(), GradeError> {
    let path = path.as_ref();
    let bytes = markdown_to_docx_bytes(markdown)?;
    write_atomic(path, &bytes).await?;
    info!("Wrote {}", path.display());
    Ok(())
}
