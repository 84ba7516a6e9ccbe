//! The compiler seam: script text in, executable cells out.
//!
//! The engine treats "compile cell source into an executable unit" as an
//! opaque collaborator step. Embedders supply a [`CellCompiler`] for their
//! script language and, if they load scripts from disk, a [`ScriptParser`]
//! for the on-disk cell layout. [`EchoCompiler`] is the degenerate built-in
//! compiler the CLI falls back to, so any script file can be served without
//! a real language behind it.

use std::fmt;

use crate::error::{Error, Result};
use crate::widgets;

/// Splits raw script text into per-cell source chunks, in cell order.
pub trait ScriptParser: Send + Sync {
    fn parse(&self, source: &str) -> Result<Vec<String>>;
}

/// Percent-format cell splitter.
///
/// A line whose trimmed text starts with `# %%` or `// %%` opens a new
/// cell; text before the first marker belongs to the first cell. Chunks
/// that are entirely blank are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct PercentParser;

impl PercentParser {
    fn is_marker(line: &str) -> bool {
        let trimmed = line.trim_start();
        trimmed.starts_with("# %%") || trimmed.starts_with("// %%")
    }
}

impl ScriptParser for PercentParser {
    fn parse(&self, source: &str) -> Result<Vec<String>> {
        let mut cells = Vec::new();
        let mut current = String::new();

        for line in source.lines() {
            if Self::is_marker(line) {
                if !current.trim().is_empty() {
                    cells.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
                continue;
            }
            current.push_str(line);
            current.push('\n');
        }
        if !current.trim().is_empty() {
            cells.push(current);
        }

        if cells.is_empty() {
            return Err(Error::Parse("script has no cells".to_string()));
        }
        Ok(cells)
    }
}

/// A compiled cell body, ready to execute.
///
/// Bodies call the widget emission API in [`crate::widgets`] and report
/// failures through their return value; a failure terminates the run at the
/// cell boundary.
pub struct ExecutableUnit(Box<dyn Fn() -> anyhow::Result<()> + Send + Sync>);

impl ExecutableUnit {
    pub fn new(body: impl Fn() -> anyhow::Result<()> + Send + Sync + 'static) -> Self {
        Self(Box::new(body))
    }

    pub fn call(&self) -> anyhow::Result<()> {
        (self.0)()
    }
}

impl fmt::Debug for ExecutableUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutableUnit").finish_non_exhaustive()
    }
}

/// Compiles one cell's source into an executable unit.
pub trait CellCompiler: Send + Sync {
    fn compile(&self, source: &str) -> Result<ExecutableUnit>;
}

/// Fallback compiler: the compiled unit displays the cell's own source as a
/// text widget keyed by cell content.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoCompiler;

impl CellCompiler for EchoCompiler {
    fn compile(&self, source: &str) -> Result<ExecutableUnit> {
        let source = source.trim_end().to_string();
        Ok(ExecutableUnit::new(move || {
            widgets::text(&source)?;
            Ok(())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_parser_splits_on_markers() {
        let source = "a = 1\n# %% next\nb = a + 1\n// %% last\nc = b\n";
        let cells = PercentParser.parse(source).unwrap();
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[0], "a = 1\n");
        assert_eq!(cells[1], "b = a + 1\n");
        assert_eq!(cells[2], "c = b\n");
    }

    #[test]
    fn percent_parser_drops_blank_chunks() {
        let source = "# %%\n\n# %%\nonly = 1\n";
        let cells = PercentParser.parse(source).unwrap();
        assert_eq!(cells, vec!["only = 1\n".to_string()]);
    }

    #[test]
    fn percent_parser_rejects_empty_script() {
        assert!(matches!(
            PercentParser.parse("   \n"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn echo_compiler_fails_outside_a_run() {
        let unit = EchoCompiler.compile("x = 1").unwrap();
        // no run bound to this thread: the emitted text widget must fail
        let err = unit.call().unwrap_err();
        assert!(err.to_string().contains("no active run"));
    }
}
