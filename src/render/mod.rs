//! Markdown rendering of classified elements and document post-processing.

mod markdown;
mod toc;

pub use markdown::{render_element, render_page};
pub use toc::{generate_toc, insert_toc, TOC_END, TOC_START};
