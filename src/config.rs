//! Core configuration.
//!
//! Mirrors the teacher's `CompilerConfig` builder shape, scaled down to the
//! handful of knobs this core's spec names as "default" values rather than
//! hardcoding them.

/// Default heap size handed to `heap.init` by the entry routine (`spec.md`
/// §4.5 step 6): 32 MiB.
pub const DEFAULT_HEAP_BYTES: u32 = 32 * 1024 * 1024;

/// Builder-style configuration for a single compilation run.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Bytes requested from `heap.init` when the entry routine sets up the
    /// heap. Default 32 MiB.
    pub heap_bytes: u32,
    /// Word size in bytes, threaded into the `AsmEmitter`. Default 4.
    pub word_size: u32,
    /// Whether instructions get a trailing `# comment` padded to column 40.
    /// Turning this off produces smaller, harder-to-read output; it never
    /// changes instruction selection. Default `true`.
    pub emit_comments: bool,
    /// The global label the entry routine is emitted under. Default
    /// `"main"`.
    pub entry_label: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            heap_bytes: DEFAULT_HEAP_BYTES,
            word_size: crate::asm::DEFAULT_WORD_SIZE,
            emit_comments: true,
            entry_label: "main".to_string(),
        }
    }
}

impl CoreConfig {
    pub fn new() -> Self {
        CoreConfig::default()
    }

    pub fn with_heap_bytes(mut self, bytes: u32) -> Self {
        self.heap_bytes = bytes;
        self
    }

    pub fn with_word_size(mut self, word_size: u32) -> Self {
        self.word_size = word_size;
        self
    }

    pub fn with_emit_comments(mut self, emit_comments: bool) -> Self {
        self.emit_comments = emit_comments;
        self
    }

    pub fn with_entry_label(mut self, label: impl Into<String>) -> Self {
        self.entry_label = label.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = CoreConfig::default();
        assert_eq!(config.heap_bytes, 32 * 1024 * 1024);
        assert_eq!(config.word_size, 4);
        assert!(config.emit_comments);
        assert_eq!(config.entry_label, "main");
    }

    #[test]
    fn builder_overrides_compose() {
        let config = CoreConfig::new()
            .with_heap_bytes(1024)
            .with_entry_label("start")
            .with_emit_comments(false);
        assert_eq!(config.heap_bytes, 1024);
        assert_eq!(config.entry_label, "start");
        assert!(!config.emit_comments);
    }
}
