//! The assembly emitter: a stateless-except-for-its-buffer formatter over a
//! text sink.
//!
//! `AsmEmitter` performs no validation and no optimization; it is pure
//! formatting. It does not know what a class or a function is; it only
//! knows how to write directives, labels, data words and RV32 instructions
//! as text, in the exact order it is told to. Every instruction emission
//! takes an optional trailing comment, rendered after the instruction is
//! padded out to column 40 (`COMMENT_COLUMN`). Non-label lines are indented
//! two spaces; label lines are not indented at all, so they read as
//! outdents in the emitted text the way assemblers expect.

use crate::label::Label;
use std::fmt::{self, Write as _};

/// One word on RV32 is 4 bytes. Kept as a named constant rather than a
/// literal `4` scattered through the codebase, and threaded through
/// `CoreConfig` so a back-end targeting a different word width is a
/// one-line change, not a grep-and-replace.
pub const DEFAULT_WORD_SIZE: u32 = 4;

const COMMENT_COLUMN: usize = 40;

/// A `.word` value: a literal integer, the address of a label, or a null
/// (zero) word: the three cases `spec.md` §4.5 distinguishes for
/// attribute/global initializers and `None`.
#[derive(Debug, Clone)]
pub enum Word {
    Int(i32),
    Address(Label),
    Null,
}

impl From<i32> for Word {
    fn from(v: i32) -> Self {
        Word::Int(v)
    }
}

impl From<Label> for Word {
    fn from(l: Label) -> Self {
        Word::Address(l)
    }
}

impl From<Option<Label>> for Word {
    fn from(l: Option<Label>) -> Self {
        match l {
            Some(l) => Word::Address(l),
            None => Word::Null,
        }
    }
}

pub struct AsmEmitter {
    output: String,
    word_size: u32,
    emit_comments: bool,
}

impl Default for AsmEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_WORD_SIZE)
    }
}

impl AsmEmitter {
    pub fn new(word_size: u32) -> Self {
        AsmEmitter {
            output: String::new(),
            word_size,
            emit_comments: true,
        }
    }

    /// Build an emitter from a `CoreConfig`, honoring its `word_size` and
    /// `emit_comments` knobs.
    pub fn from_config(config: &crate::config::CoreConfig) -> Self {
        AsmEmitter {
            output: String::new(),
            word_size: config.word_size,
            emit_comments: config.emit_comments,
        }
    }

    pub fn word_size(&self) -> u32 {
        self.word_size
    }

    /// Consume the emitter and return the accumulated text.
    pub fn into_text(self) -> String {
        self.output
    }

    pub fn text(&self) -> &str {
        &self.output
    }

    fn raw(&mut self, line: &str) {
        self.output.push_str(line);
        self.output.push('\n');
    }

    fn instr(&mut self, body: &str, comment: Option<&str>) -> fmt::Result {
        let mut line = String::new();
        write!(&mut line, "  {body}")?;
        if self.emit_comments
            && let Some(c) = comment
        {
            if line.len() < COMMENT_COLUMN {
                line.push_str(&" ".repeat(COMMENT_COLUMN - line.len()));
            } else {
                line.push(' ');
            }
            write!(&mut line, "# {c}")?;
        }
        self.raw(&line);
        Ok(())
    }

    // ---- Sections -----------------------------------------------------

    pub fn section_data(&mut self) {
        self.raw(".data");
    }

    pub fn section_text(&mut self) {
        self.raw(".text");
    }

    // ---- Labels ---------------------------------------------------------

    /// Declare a global (user-visible) label: `.globl name` followed by
    /// `name:`.
    pub fn global_label(&mut self, label: &Label) {
        self.raw(&format!(".globl {label}"));
        self.raw(&format!("{label}:"));
    }

    /// Mark a compiler-local label: just `name:`.
    pub fn local_label(&mut self, label: &Label) {
        self.raw(&format!("{label}:"));
    }

    // ---- Data -------------------------------------------------------------

    pub fn word(&mut self, value: Word, comment: Option<&str>) -> fmt::Result {
        let body = match value {
            Word::Int(v) => format!(".word {v}"),
            Word::Address(l) => format!(".word {l}"),
            Word::Null => ".word 0".to_string(),
        };
        self.instr(&body, comment)
    }

    /// Null-terminated string with standard escape rewriting.
    pub fn string(&mut self, s: &str, comment: Option<&str>) -> fmt::Result {
        let escaped = escape_string(s);
        self.instr(&format!(".string \"{escaped}\""), comment)
    }

    /// Byte alignment to `2^k`.
    pub fn align(&mut self, k: u32) -> fmt::Result {
        self.instr(&format!(".align {k}"), None)
    }

    // ---- Register-register-register --------------------------------------

    fn rrr(&mut self, mnemonic: &str, rd: &str, rs1: &str, rs2: &str, comment: Option<&str>) -> fmt::Result {
        self.instr(&format!("{mnemonic} {rd}, {rs1}, {rs2}"), comment)
    }

    pub fn add(&mut self, rd: &str, rs1: &str, rs2: &str, comment: Option<&str>) -> fmt::Result {
        self.rrr("add", rd, rs1, rs2, comment)
    }
    pub fn sub(&mut self, rd: &str, rs1: &str, rs2: &str, comment: Option<&str>) -> fmt::Result {
        self.rrr("sub", rd, rs1, rs2, comment)
    }
    pub fn mul(&mut self, rd: &str, rs1: &str, rs2: &str, comment: Option<&str>) -> fmt::Result {
        self.rrr("mul", rd, rs1, rs2, comment)
    }
    pub fn div(&mut self, rd: &str, rs1: &str, rs2: &str, comment: Option<&str>) -> fmt::Result {
        self.rrr("div", rd, rs1, rs2, comment)
    }
    pub fn rem(&mut self, rd: &str, rs1: &str, rs2: &str, comment: Option<&str>) -> fmt::Result {
        self.rrr("rem", rd, rs1, rs2, comment)
    }
    pub fn and(&mut self, rd: &str, rs1: &str, rs2: &str, comment: Option<&str>) -> fmt::Result {
        self.rrr("and", rd, rs1, rs2, comment)
    }
    pub fn or(&mut self, rd: &str, rs1: &str, rs2: &str, comment: Option<&str>) -> fmt::Result {
        self.rrr("or", rd, rs1, rs2, comment)
    }
    pub fn xor(&mut self, rd: &str, rs1: &str, rs2: &str, comment: Option<&str>) -> fmt::Result {
        self.rrr("xor", rd, rs1, rs2, comment)
    }
    pub fn slt(&mut self, rd: &str, rs1: &str, rs2: &str, comment: Option<&str>) -> fmt::Result {
        self.rrr("slt", rd, rs1, rs2, comment)
    }

    // ---- Register-register-immediate --------------------------------------

    fn rri(&mut self, mnemonic: &str, rd: &str, rs1: &str, imm: i32, comment: Option<&str>) -> fmt::Result {
        self.instr(&format!("{mnemonic} {rd}, {rs1}, {imm}"), comment)
    }

    pub fn addi(&mut self, rd: &str, rs1: &str, imm: i32, comment: Option<&str>) -> fmt::Result {
        self.rri("addi", rd, rs1, imm, comment)
    }
    pub fn andi(&mut self, rd: &str, rs1: &str, imm: i32, comment: Option<&str>) -> fmt::Result {
        self.rri("andi", rd, rs1, imm, comment)
    }
    pub fn ori(&mut self, rd: &str, rs1: &str, imm: i32, comment: Option<&str>) -> fmt::Result {
        self.rri("ori", rd, rs1, imm, comment)
    }
    pub fn xori(&mut self, rd: &str, rs1: &str, imm: i32, comment: Option<&str>) -> fmt::Result {
        self.rri("xori", rd, rs1, imm, comment)
    }

    // ---- Loads / immediates ------------------------------------------------

    pub fn li(&mut self, rd: &str, imm: i32, comment: Option<&str>) -> fmt::Result {
        self.instr(&format!("li {rd}, {imm}"), comment)
    }
    pub fn lui(&mut self, rd: &str, imm: i32, comment: Option<&str>) -> fmt::Result {
        self.instr(&format!("lui {rd}, {imm}"), comment)
    }
    pub fn la(&mut self, rd: &str, label: &Label, comment: Option<&str>) -> fmt::Result {
        self.instr(&format!("la {rd}, {label}"), comment)
    }
    pub fn mv(&mut self, rd: &str, rs: &str, comment: Option<&str>) -> fmt::Result {
        self.instr(&format!("mv {rd}, {rs}"), comment)
    }

    // ---- Memory -------------------------------------------------------------

    fn mem(&mut self, mnemonic: &str, rd_or_rs2: &str, offset: i32, base: &str, comment: Option<&str>) -> fmt::Result {
        self.instr(&format!("{mnemonic} {rd_or_rs2}, {offset}({base})"), comment)
    }

    pub fn lw(&mut self, rd: &str, offset: i32, base: &str, comment: Option<&str>) -> fmt::Result {
        self.mem("lw", rd, offset, base, comment)
    }
    pub fn sw(&mut self, rs2: &str, offset: i32, base: &str, comment: Option<&str>) -> fmt::Result {
        self.mem("sw", rs2, offset, base, comment)
    }
    pub fn lb(&mut self, rd: &str, offset: i32, base: &str, comment: Option<&str>) -> fmt::Result {
        self.mem("lb", rd, offset, base, comment)
    }
    pub fn lbu(&mut self, rd: &str, offset: i32, base: &str, comment: Option<&str>) -> fmt::Result {
        self.mem("lbu", rd, offset, base, comment)
    }
    pub fn sb(&mut self, rs2: &str, offset: i32, base: &str, comment: Option<&str>) -> fmt::Result {
        self.mem("sb", rs2, offset, base, comment)
    }

    // ---- Control flow -------------------------------------------------------

    pub fn j(&mut self, label: &Label, comment: Option<&str>) -> fmt::Result {
        self.instr(&format!("j {label}"), comment)
    }
    pub fn jr(&mut self, rs: &str, comment: Option<&str>) -> fmt::Result {
        self.instr(&format!("jr {rs}"), comment)
    }
    pub fn jal(&mut self, label: &Label, comment: Option<&str>) -> fmt::Result {
        self.instr(&format!("jal {label}"), comment)
    }
    pub fn jalr(&mut self, rd: &str, rs: &str, offset: i32, comment: Option<&str>) -> fmt::Result {
        self.instr(&format!("jalr {rd}, {offset}({rs})"), comment)
    }

    fn branch2(&mut self, mnemonic: &str, rs1: &str, rs2: &str, label: &Label, comment: Option<&str>) -> fmt::Result {
        self.instr(&format!("{mnemonic} {rs1}, {rs2}, {label}"), comment)
    }

    pub fn beq(&mut self, rs1: &str, rs2: &str, label: &Label, comment: Option<&str>) -> fmt::Result {
        self.branch2("beq", rs1, rs2, label, comment)
    }
    pub fn bne(&mut self, rs1: &str, rs2: &str, label: &Label, comment: Option<&str>) -> fmt::Result {
        self.branch2("bne", rs1, rs2, label, comment)
    }
    pub fn bgeu(&mut self, rs1: &str, rs2: &str, label: &Label, comment: Option<&str>) -> fmt::Result {
        self.branch2("bgeu", rs1, rs2, label, comment)
    }

    fn branch1(&mut self, mnemonic: &str, rs: &str, label: &Label, comment: Option<&str>) -> fmt::Result {
        self.instr(&format!("{mnemonic} {rs}, {label}"), comment)
    }

    pub fn beqz(&mut self, rs: &str, label: &Label, comment: Option<&str>) -> fmt::Result {
        self.branch1("beqz", rs, label, comment)
    }
    pub fn bnez(&mut self, rs: &str, label: &Label, comment: Option<&str>) -> fmt::Result {
        self.branch1("bnez", rs, label, comment)
    }
    pub fn bltz(&mut self, rs: &str, label: &Label, comment: Option<&str>) -> fmt::Result {
        self.branch1("bltz", rs, label, comment)
    }
    pub fn bgtz(&mut self, rs: &str, label: &Label, comment: Option<&str>) -> fmt::Result {
        self.branch1("bgtz", rs, label, comment)
    }
    pub fn blez(&mut self, rs: &str, label: &Label, comment: Option<&str>) -> fmt::Result {
        self.branch1("blez", rs, label, comment)
    }
    pub fn bgez(&mut self, rs: &str, label: &Label, comment: Option<&str>) -> fmt::Result {
        self.branch1("bgez", rs, label, comment)
    }

    // ---- Set-on-condition ---------------------------------------------------

    pub fn seqz(&mut self, rd: &str, rs: &str, comment: Option<&str>) -> fmt::Result {
        self.instr(&format!("seqz {rd}, {rs}"), comment)
    }
    pub fn snez(&mut self, rd: &str, rs: &str, comment: Option<&str>) -> fmt::Result {
        self.instr(&format!("snez {rd}, {rs}"), comment)
    }

    // ---- Syscalls -------------------------------------------------------------

    pub fn ecall(&mut self, comment: Option<&str>) -> fmt::Result {
        self.instr("ecall", comment)
    }

    /// Emit a raw trailing-comment-only line (used sparingly, e.g. section
    /// banners); not part of the instruction set proper.
    pub fn comment_line(&mut self, text: &str) {
        self.raw(&format!("  # {text}"));
    }
}

/// Rewrite `\`, `\n`, `\t`, `"` into their escaped forms for a `.string`
/// directive.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_standard_sequences() {
        assert_eq!(escape_string("a\\b\nc\td\"e"), "a\\\\b\\nc\\td\\\"e");
    }

    #[test]
    fn instructions_are_indented_two_spaces() {
        let mut e = AsmEmitter::default();
        e.li("a0", 5, None).unwrap();
        assert_eq!(e.text(), "  li a0, 5\n");
    }

    #[test]
    fn labels_are_not_indented() {
        let mut e = AsmEmitter::default();
        e.global_label(&Label::user("$main"));
        assert_eq!(e.text(), ".globl $main\n$main:\n");
    }

    #[test]
    fn comments_pad_to_column_40() {
        let mut e = AsmEmitter::default();
        e.li("a0", 1, Some("load arg")).unwrap();
        let line = e.text().lines().next().unwrap();
        let hash_pos = line.find('#').unwrap();
        assert_eq!(hash_pos, 40);
    }

    #[test]
    fn null_word_is_zero() {
        let mut e = AsmEmitter::default();
        e.word(Word::Null, None).unwrap();
        assert_eq!(e.text(), "  .word 0\n");
    }

    #[test]
    fn emit_comments_false_suppresses_trailing_comment() {
        let config = crate::config::CoreConfig::new().with_emit_comments(false);
        let mut e = AsmEmitter::from_config(&config);
        e.li("a0", 5, Some("load arg")).unwrap();
        assert_eq!(e.text(), "  li a0, 5\n");
    }

    #[test]
    fn address_word_uses_label_text() {
        let mut e = AsmEmitter::default();
        e.word(Word::Address(Label::user("$x")), None).unwrap();
        assert_eq!(e.text(), "  .word $x\n");
    }
}
