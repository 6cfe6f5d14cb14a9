//! Indentation-aware Python source writer.

const INDENT: &str = "    ";

#[derive(Debug, Default)]
pub struct PyWriter {
    out: String,
    depth: usize,
}

impl PyWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    pub fn blank(&mut self) {
        self.out.push('\n');
    }

    pub fn indent(&mut self) {
        self.depth += 1;
    }

    pub fn dedent(&mut self) {
        debug_assert!(self.depth > 0, "dedent below zero");
        self.depth = self.depth.saturating_sub(1);
    }

    /// Write `header:` and indent; pair with `end_block`.
    pub fn block(&mut self, header: &str) {
        self.line(&format!("{}:", header));
        self.indent();
    }

    pub fn end_block(&mut self) {
        self.dedent();
    }

    pub fn into_string(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nesting() {
        let mut w = PyWriter::new();
        w.block("def f()");
        w.block("if x");
        w.line("return 1");
        w.end_block();
        w.line("return 0");
        w.end_block();
        assert_eq!(
            w.into_string(),
            "def f():\n    if x:\n        return 1\n    return 0\n"
        );
    }

    #[test]
    fn blank_lines_carry_no_indent() {
        let mut w = PyWriter::new();
        w.block("class C");
        w.blank();
        w.line("pass");
        w.end_block();
        assert_eq!(w.into_string(), "class C:\n\n    pass\n");
    }
}
