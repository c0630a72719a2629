//! Recursive-descent parser building the unannotated IR.

use super::lexer::{Lexer, Token};
use super::{ParseError, ParseResult};
use crate::ir::{Block, Instruction, Opcode};

pub struct Parser<'input> {
    lexer: std::iter::Peekable<Lexer<'input>>,
    current_line: usize,
}

impl<'input> Parser<'input> {
    pub fn new(input: &'input str) -> Self {
        Self {
            lexer: Lexer::new(input).peekable(),
            current_line: 1,
        }
    }

    fn next(&mut self) -> ParseResult<Token> {
        match self.lexer.next() {
            Some(Ok((line, tok))) => {
                self.current_line = line;
                Ok(tok)
            }
            Some(Err(e)) => Err(ParseError::Lexer(e)),
            None => Err(ParseError::UnexpectedEof),
        }
    }

    fn syntax_error<T>(&self, message: impl Into<String>) -> ParseResult<T> {
        Err(ParseError::Syntax {
            line: self.current_line,
            message: message.into(),
        })
    }

    fn register(&mut self) -> ParseResult<i64> {
        match self.next()? {
            Token::Register(n) => Ok(n),
            tok => self.syntax_error(format!("expected a register, got {}", tok)),
        }
    }

    fn constant(&mut self) -> ParseResult<i64> {
        match self.next()? {
            Token::Constant(n) => Ok(n),
            tok => self.syntax_error(format!("expected a constant, got {}", tok)),
        }
    }

    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        let tok = self.next()?;
        if tok == expected {
            Ok(())
        } else {
            self.syntax_error(format!("expected {}, got {}", expected, tok))
        }
    }

    /// Parse the whole input as one basic block.
    pub fn parse_block(&mut self) -> ParseResult<Block> {
        let mut block = Block::new();

        while self.lexer.peek().is_some() {
            let inst = self.parse_instruction()?;
            self.expect_end_of_line()?;
            block.push(inst);
        }

        Ok(block)
    }

    fn parse_instruction(&mut self) -> ParseResult<Instruction> {
        let op = match self.next()? {
            Token::Op(op) => op,
            tok => return self.syntax_error(format!("expected an opcode, got {}", tok)),
        };

        let inst = match op {
            Opcode::Load => {
                let addr = self.register()?;
                self.expect(Token::Arrow)?;
                let dest = self.register()?;
                Instruction::load(addr, dest)
            }
            Opcode::LoadI => {
                let value = self.constant()?;
                self.expect(Token::Arrow)?;
                let dest = self.register()?;
                Instruction::load_i(value, dest)
            }
            Opcode::Store => {
                let value = self.register()?;
                self.expect(Token::Arrow)?;
                let addr = self.register()?;
                Instruction::store(value, addr)
            }
            Opcode::Output => Instruction::output(self.constant()?),
            Opcode::Nop => Instruction::nop(),
            _ => {
                let a = self.register()?;
                self.expect(Token::Comma)?;
                let b = self.register()?;
                self.expect(Token::Arrow)?;
                let dest = self.register()?;
                Instruction::arith(op, a, b, dest)
            }
        };

        Ok(inst)
    }

    /// Instructions are one per line; reject trailing tokens.
    fn expect_end_of_line(&mut self) -> ParseResult<()> {
        if let Some(Ok((line, tok))) = self.lexer.peek() {
            if *line == self.current_line {
                let message = format!("expected end of line, got {}", tok);
                return Err(ParseError::Syntax {
                    line: *line,
                    message,
                });
            }
        }
        Ok(())
    }
}

/// Parse ILOC source into a basic block.
pub fn parse(source: &str) -> ParseResult<Block> {
    Parser::new(source).parse_block()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::INVALID;

    #[test]
    fn test_parse_every_form() {
        let block = parse(
            "loadI 1024 => r0\n\
             load r0 => r1\n\
             add r0, r1 => r2\n\
             sub r2, r1 => r3\n\
             mult r3, r3 => r4\n\
             lshift r4, r1 => r5\n\
             rshift r5, r1 => r6\n\
             store r6 => r0\n\
             output 1024\n\
             nop\n",
        )
        .unwrap();

        assert_eq!(block.len(), 10);
        assert_eq!(block.insts[0].op, Opcode::LoadI);
        assert_eq!(block.insts[0].src1.sr, 1024);
        assert!(!block.insts[0].src1.is_reg);
        assert_eq!(block.insts[7].op, Opcode::Store);
        assert!(block.insts[7].src2.is_reg);
        assert_eq!(block.insts[8].src1.sr, 1024);
        assert_eq!(block.insts[9].op, Opcode::Nop);
    }

    #[test]
    fn test_parse_leaves_annotations_unset() {
        let block = parse("add r1, r2 => r3\n").unwrap();
        let inst = &block.insts[0];
        for op in [&inst.src1, &inst.src2, &inst.dest] {
            assert_eq!(op.vr, INVALID);
            assert_eq!(op.pr, INVALID);
            assert_eq!(op.nu, INVALID);
        }
    }

    #[test]
    fn test_parse_comments_and_blank_lines() {
        let block = parse("// prologue\n\nloadI 1 => r0\n\n// done\n").unwrap();
        assert_eq!(block.len(), 1);
    }

    #[test]
    fn test_parse_rejects_missing_arrow() {
        let err = parse("loadI 1024 r0\n").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_parse_rejects_register_where_constant_expected() {
        let err = parse("loadI r1 => r0\n").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
    }

    #[test]
    fn test_parse_rejects_trailing_tokens() {
        let err = parse("nop nop\n").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_parse_rejects_truncated_input() {
        let err = parse("add r1, r2 =>").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof));
    }

    #[test]
    fn test_parse_two_instructions_same_line_rejected() {
        let err = parse("nop\nloadI 1 => r0 output 4\n").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { line: 2, .. }));
    }
}
