//! PDF exports: LaTeX rendering, `pdflatex` compilation and the download routes.

pub mod compiler;
pub mod handlers;
pub mod latex;
