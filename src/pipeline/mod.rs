//! Pipeline stages for grading handwritten homework.
//!
//! Each submodule implements one step; the entry points in
//! [`crate::grade`] wire them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ llm::transcribe ──▶ postprocess
//! (URL/path) (pdfium)  (PNG/b64)  (vision model)      (cleanup)
//!
//!       ──▶ llm::score ──▶ postprocess ──▶ report ──▶ artifacts
//!           (rubric)       (cleanup)      (md+docx)  (atomic writes)
//! ```
//!
//! 1. [`input`]  resolves the user-supplied path or URL to a local PDF
//! 2. [`render`] rasterises selected pages in `spawn_blocking`
//! 3. [`encode`] PNG-encodes each page for the model and for disk
//! 4. [`llm`]    drives both model calls with timeout and backoff
//! 5. [`postprocess`] strips fences and whitespace noise from model output
//! 6. [`report`] appends the essay and renders the `.docx`
//! 7. [`artifacts`] names files and writes them atomically

pub mod artifacts;
pub mod encode;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod render;
pub mod report;
