//! Parser for the circuit assembly format.
//!
//! Statements are lowered to a [`Circuit`] as they are read; there is no
//! intermediate syntax tree.

use std::collections::HashMap;
use std::f64::consts::{E, PI, TAU};

use qforge_ir::{Circuit, ClbitId, Gate, Instruction, QubitId, StandardGate};

use crate::error::{ParseError, ParseResult};
use crate::lexer::{SpannedToken, Token, tokenize};

/// Parse an assembly source string into a Circuit.
pub fn parse(source: &str) -> ParseResult<Circuit> {
    let mut parser = Parser::new(source)?;
    parser.parse_program()
}

/// A declared register, placed at `offset` in the flat index space.
#[derive(Debug, Clone, Copy)]
struct Register {
    offset: u32,
    size: u32,
}

/// Reference to one element or a whole register.
#[derive(Debug, Clone)]
struct RegisterRef {
    name: String,
    index: Option<u64>,
    line: usize,
}

/// Parser state.
struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    qregs: HashMap<String, Register>,
    cregs: HashMap<String, Register>,
    num_qubits: u32,
    num_clbits: u32,
    instructions: Vec<Instruction>,
}

impl Parser {
    /// Create a new parser from source.
    fn new(source: &str) -> ParseResult<Self> {
        let mut tokens = Vec::new();
        for result in tokenize(source) {
            match result {
                Ok(t) => tokens.push(t),
                Err((line, message)) => return Err(ParseError::LexerError { line, message }),
            }
        }

        Ok(Self {
            tokens,
            pos: 0,
            qregs: HashMap::new(),
            cregs: HashMap::new(),
            num_qubits: 0,
            num_clbits: 0,
            instructions: Vec::new(),
        })
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    /// Line of the current token (or the last one at end of input).
    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos)?.token.clone();
        self.pos += 1;
        Some(token)
    }

    #[allow(clippy::needless_pass_by_value)]
    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        let line = self.line();
        let found = self
            .advance()
            .ok_or_else(|| ParseError::UnexpectedEof(format!("expected {expected}")))?;

        if std::mem::discriminant(&found) != std::mem::discriminant(&expected) {
            return Err(ParseError::UnexpectedToken {
                line,
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
        Ok(())
    }

    fn check(&self, token: &Token) -> bool {
        self.peek()
            .is_some_and(|t| std::mem::discriminant(t) == std::mem::discriminant(token))
    }

    fn consume(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_program(&mut self) -> ParseResult<Circuit> {
        if self.consume(&Token::OpenQasm) {
            self.parse_version()?;
            self.expect(Token::Semicolon)?;
        }

        while !self.is_eof() {
            self.parse_statement()?;
        }

        if self.num_qubits == 0 {
            return Err(ParseError::NoQubits);
        }
        let instructions = std::mem::take(&mut self.instructions);
        Ok(Circuit::from_instructions(
            "main",
            self.num_qubits,
            self.num_clbits,
            instructions,
        )?)
    }

    fn parse_version(&mut self) -> ParseResult<()> {
        match self.advance() {
            Some(Token::FloatLiteral(v)) if (2.0..4.0).contains(&v) => Ok(()),
            Some(Token::IntLiteral(2 | 3)) => Ok(()),
            Some(t) => Err(ParseError::InvalidVersion(t.to_string())),
            None => Err(ParseError::UnexpectedEof("version number".into())),
        }
    }

    fn parse_statement(&mut self) -> ParseResult<()> {
        let line = self.line();
        match self.advance() {
            Some(Token::Include) => {
                let line = self.line();
                match self.advance() {
                    Some(Token::StringLiteral(_)) => {}
                    other => {
                        return Err(ParseError::UnexpectedToken {
                            line,
                            expected: "include path".into(),
                            found: other.map_or_else(|| "end of input".into(), |t| t.to_string()),
                        });
                    }
                }
                self.expect(Token::Semicolon)
            }
            Some(Token::Qubit) => {
                let size = self.parse_optional_size()?;
                let name = self.parse_identifier()?;
                self.expect(Token::Semicolon)?;
                self.declare_qubits(name, size)
            }
            Some(Token::Bit) => {
                let size = self.parse_optional_size()?;
                let name = self.parse_identifier()?;
                self.expect(Token::Semicolon)?;
                self.declare_clbits(name, size)
            }
            Some(Token::Qreg) => {
                let name = self.parse_identifier()?;
                let size = self.parse_optional_size()?;
                self.expect(Token::Semicolon)?;
                self.declare_qubits(name, size)
            }
            Some(Token::Creg) => {
                let name = self.parse_identifier()?;
                let size = self.parse_optional_size()?;
                self.expect(Token::Semicolon)?;
                self.declare_clbits(name, size)
            }
            Some(Token::Barrier) => self.parse_barrier(),
            Some(Token::Measure) => {
                // Legacy form: measure q[0] -> c[0];
                let qubit = self.parse_register_ref()?;
                self.expect(Token::Arrow)?;
                let bit = self.parse_register_ref()?;
                self.expect(Token::Semicolon)?;
                self.lower_measure(&qubit, &bit)
            }
            Some(Token::Identifier(name)) => {
                if self.check(&Token::Eq) || self.is_indexed_assignment() {
                    self.parse_measure_assignment(name, line)
                } else {
                    self.parse_gate_call(name, line)
                }
            }
            Some(t) => Err(ParseError::UnexpectedToken {
                line,
                expected: "statement".into(),
                found: t.to_string(),
            }),
            None => Err(ParseError::UnexpectedEof("statement".into())),
        }
    }

    /// Lookahead for `name[i] = ...`.
    fn is_indexed_assignment(&self) -> bool {
        let window: Vec<_> = self
            .tokens
            .iter()
            .skip(self.pos)
            .take(4)
            .map(|t| &t.token)
            .collect();
        matches!(
            window.as_slice(),
            [Token::LBracket, Token::IntLiteral(_), Token::RBracket, Token::Eq]
        )
    }

    fn parse_measure_assignment(&mut self, name: String, line: usize) -> ParseResult<()> {
        let index = if self.consume(&Token::LBracket) {
            let i = self.parse_int_literal()?;
            self.expect(Token::RBracket)?;
            Some(i)
        } else {
            None
        };
        self.expect(Token::Eq)?;
        self.expect(Token::Measure)?;
        let qubit = self.parse_register_ref()?;
        self.expect(Token::Semicolon)?;
        let bit = RegisterRef { name, index, line };
        self.lower_measure(&qubit, &bit)
    }

    fn parse_barrier(&mut self) -> ParseResult<()> {
        let mut qubits = Vec::new();
        if !self.check(&Token::Semicolon) {
            for r in self.parse_register_refs()? {
                qubits.extend(self.resolve_qubits(&r)?);
            }
        }
        self.expect(Token::Semicolon)?;
        self.instructions.push(Instruction::barrier(qubits));
        Ok(())
    }

    fn parse_gate_call(&mut self, name: String, line: usize) -> ParseResult<()> {
        let params = if self.consume(&Token::LParen) {
            let params = if self.check(&Token::RParen) {
                Vec::new()
            } else {
                self.parse_expression_list()?
            };
            self.expect(Token::RParen)?;
            params
        } else {
            Vec::new()
        };

        let refs = self.parse_register_refs()?;
        self.expect(Token::Semicolon)?;

        let name = StandardGate::canonical_name(&name).to_string();
        let operands: Vec<Vec<QubitId>> = refs
            .iter()
            .map(|r| self.resolve_qubits(r))
            .collect::<ParseResult<_>>()?;

        // A single whole-register operand broadcasts a one-qubit gate.
        if operands.len() == 1 && operands[0].len() > 1 {
            let gate = Gate::from_name(&name, 1, params)?;
            if gate.num_qubits() != 1 {
                return Err(ParseError::UnsupportedBroadcast {
                    line,
                    message: format!("gate '{name}' cannot be broadcast over a register"),
                });
            }
            for q in &operands[0] {
                self.instructions.push(Instruction::gate(gate.clone(), [*q]));
            }
            return Ok(());
        }

        if operands.iter().any(|o| o.len() != 1) {
            return Err(ParseError::UnsupportedBroadcast {
                line,
                message: format!("gate '{name}' mixes register and element operands"),
            });
        }
        let qubits: Vec<QubitId> = operands.into_iter().flatten().collect();
        let gate = Gate::from_name(&name, qubits.len() as u32, params)?;
        self.instructions.push(Instruction::gate(gate, qubits));
        Ok(())
    }

    fn lower_measure(&mut self, qubit: &RegisterRef, bit: &RegisterRef) -> ParseResult<()> {
        let qubits = self.resolve_qubits(qubit)?;
        let clbits = self.resolve_clbits(bit)?;
        if qubits.len() != clbits.len() {
            return Err(ParseError::UnsupportedBroadcast {
                line: qubit.line,
                message: format!(
                    "measuring {} qubits into {} bits",
                    qubits.len(),
                    clbits.len()
                ),
            });
        }
        for (q, c) in qubits.into_iter().zip(clbits) {
            self.instructions.push(Instruction::measure(q, c));
        }
        Ok(())
    }

    fn declare_qubits(&mut self, name: String, size: u32) -> ParseResult<()> {
        if self.qregs.contains_key(&name) || self.cregs.contains_key(&name) {
            return Err(ParseError::DuplicateDeclaration(name));
        }
        self.qregs.insert(
            name,
            Register {
                offset: self.num_qubits,
                size,
            },
        );
        self.num_qubits += size;
        Ok(())
    }

    fn declare_clbits(&mut self, name: String, size: u32) -> ParseResult<()> {
        if self.qregs.contains_key(&name) || self.cregs.contains_key(&name) {
            return Err(ParseError::DuplicateDeclaration(name));
        }
        self.cregs.insert(
            name,
            Register {
                offset: self.num_clbits,
                size,
            },
        );
        self.num_clbits += size;
        Ok(())
    }

    fn resolve(
        registers: &HashMap<String, Register>,
        r: &RegisterRef,
    ) -> ParseResult<Vec<u32>> {
        let reg = registers
            .get(&r.name)
            .ok_or_else(|| ParseError::UndefinedRegister {
                line: r.line,
                name: r.name.clone(),
            })?;
        match r.index {
            Some(i) if i < u64::from(reg.size) => Ok(vec![reg.offset + i as u32]),
            Some(i) => Err(ParseError::IndexOutOfBounds {
                register: r.name.clone(),
                index: i,
                size: reg.size,
            }),
            None => Ok((reg.offset..reg.offset + reg.size).collect()),
        }
    }

    fn resolve_qubits(&self, r: &RegisterRef) -> ParseResult<Vec<QubitId>> {
        Ok(Self::resolve(&self.qregs, r)?
            .into_iter()
            .map(QubitId)
            .collect())
    }

    fn resolve_clbits(&self, r: &RegisterRef) -> ParseResult<Vec<ClbitId>> {
        Ok(Self::resolve(&self.cregs, r)?
            .into_iter()
            .map(ClbitId)
            .collect())
    }

    fn parse_optional_size(&mut self) -> ParseResult<u32> {
        if self.consume(&Token::LBracket) {
            let line = self.line();
            let size = self.parse_int_literal()?;
            self.expect(Token::RBracket)?;
            u32::try_from(size).map_err(|_| ParseError::UnexpectedToken {
                line,
                expected: "register size".into(),
                found: size.to_string(),
            })
        } else {
            Ok(1)
        }
    }

    fn parse_register_refs(&mut self) -> ParseResult<Vec<RegisterRef>> {
        let mut refs = vec![self.parse_register_ref()?];
        while self.consume(&Token::Comma) {
            refs.push(self.parse_register_ref()?);
        }
        Ok(refs)
    }

    fn parse_register_ref(&mut self) -> ParseResult<RegisterRef> {
        let line = self.line();
        let name = self.parse_identifier()?;
        let index = if self.consume(&Token::LBracket) {
            let i = self.parse_int_literal()?;
            self.expect(Token::RBracket)?;
            Some(i)
        } else {
            None
        };
        Ok(RegisterRef { name, index, line })
    }

    fn parse_expression_list(&mut self) -> ParseResult<Vec<f64>> {
        let mut values = vec![self.parse_expression(0)?];
        while self.consume(&Token::Comma) {
            values.push(self.parse_expression(0)?);
        }
        Ok(values)
    }

    /// Precedence climbing over `+ - * /`.
    fn parse_expression(&mut self, min_prec: u8) -> ParseResult<f64> {
        let mut left = self.parse_unary()?;
        loop {
            let (prec, op) = match self.peek() {
                Some(Token::Plus) => (1, Token::Plus),
                Some(Token::Minus) => (1, Token::Minus),
                Some(Token::Star) => (2, Token::Star),
                Some(Token::Slash) => (2, Token::Slash),
                _ => break,
            };
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            let right = self.parse_expression(prec + 1)?;
            left = match op {
                Token::Plus => left + right,
                Token::Minus => left - right,
                Token::Star => left * right,
                _ => left / right,
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<f64> {
        if self.consume(&Token::Minus) {
            return Ok(-self.parse_unary()?);
        }
        if self.consume(&Token::Plus) {
            return self.parse_unary();
        }
        self.parse_primary()
    }

    #[allow(clippy::cast_precision_loss)]
    fn parse_primary(&mut self) -> ParseResult<f64> {
        let line = self.line();
        match self.advance() {
            Some(Token::FloatLiteral(v)) => Ok(v),
            Some(Token::IntLiteral(v)) => Ok(v as f64),
            Some(Token::Pi) => Ok(PI),
            Some(Token::Tau) => Ok(TAU),
            Some(Token::Euler) => Ok(E),
            Some(Token::LParen) => {
                let v = self.parse_expression(0)?;
                self.expect(Token::RParen)?;
                Ok(v)
            }
            Some(t) => Err(ParseError::UnexpectedToken {
                line,
                expected: "expression".into(),
                found: t.to_string(),
            }),
            None => Err(ParseError::UnexpectedEof("expression".into())),
        }
    }

    fn parse_identifier(&mut self) -> ParseResult<String> {
        let line = self.line();
        match self.advance() {
            Some(Token::Identifier(name)) => Ok(name),
            Some(t) => Err(ParseError::UnexpectedToken {
                line,
                expected: "identifier".into(),
                found: t.to_string(),
            }),
            None => Err(ParseError::UnexpectedEof("identifier".into())),
        }
    }

    fn parse_int_literal(&mut self) -> ParseResult<u64> {
        let line = self.line();
        match self.advance() {
            Some(Token::IntLiteral(v)) => Ok(v),
            Some(t) => Err(ParseError::UnexpectedToken {
                line,
                expected: "integer".into(),
                found: t.to_string(),
            }),
            None => Err(ParseError::UnexpectedEof("integer".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qforge_ir::{InstructionKind, StandardGate};

    #[test]
    fn test_parse_bell_state() {
        let source = r"
            OPENQASM 3.0;
            qubit[2] q;
            bit[2] c;
            h q[0];
            cx q[0], q[1];
            c = measure q;
        ";
        let circuit = parse(source).unwrap();
        assert_eq!(circuit.num_qubits(), 2);
        assert_eq!(circuit.num_clbits(), 2);
        assert_eq!(circuit.num_gates(), 2);
        assert_eq!(circuit.measurement_count(), 2);
    }

    #[test]
    fn test_parse_parameterized() {
        let source = "qubit[1] q;\nrx(pi/2) q[0];\nu(-pi, 2*pi/4, 0.5) q[0];";
        let circuit = parse(source).unwrap();
        let gates: Vec<_> = circuit
            .instructions()
            .iter()
            .filter_map(|i| i.as_standard().copied())
            .collect();
        assert_eq!(gates[0], StandardGate::Rx(PI / 2.0));
        assert_eq!(gates[1], StandardGate::U(-PI, PI / 2.0, 0.5));
    }

    #[test]
    fn test_parse_legacy_registers() {
        let source = "OPENQASM 2.0;\nqreg a[2];\nqreg b[1];\ncreg c[3];\ncx a[1], b[0];\nmeasure b[0] -> c[2];";
        let circuit = parse(source).unwrap();
        assert_eq!(circuit.num_qubits(), 3);
        let cx = &circuit.instructions()[0];
        assert_eq!(cx.qubits, vec![QubitId(1), QubitId(2)]);
        let m = &circuit.instructions()[1];
        assert_eq!(m.clbits, vec![ClbitId(2)]);
    }

    #[test]
    fn test_parse_broadcast_single_qubit_gate() {
        let circuit = parse("qubit[3] q;\nh q;").unwrap();
        assert_eq!(circuit.num_gates(), 3);
        assert!(parse("qubit[3] q;\ncx q;").is_err());
    }

    #[test]
    fn test_parse_custom_gate() {
        let circuit = parse("qubit[2] q;\nms(0.25) q[0], q[1];").unwrap();
        let inst = &circuit.instructions()[0];
        match &inst.kind {
            InstructionKind::Gate(g) => {
                assert_eq!(g.name(), "ms");
                assert_eq!(g.num_qubits(), 2);
                assert_eq!(g.params(), vec![0.25]);
            }
            other => panic!("expected gate, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_barrier_forms() {
        let circuit = parse("qubit[2] q;\nbarrier;\nbarrier q[1];").unwrap();
        assert!(circuit.instructions()[0].qubits.is_empty());
        assert_eq!(circuit.instructions()[1].qubits, vec![QubitId(1)]);
    }

    #[test]
    fn test_parse_error_undefined() {
        let err = parse("qubit[2] q;\nh r[0];").unwrap_err();
        assert!(matches!(err, ParseError::UndefinedRegister { line: 2, .. }));
    }

    #[test]
    fn test_parse_error_out_of_bounds() {
        let err = parse("qubit[2] q;\nx q[5];").unwrap_err();
        assert!(matches!(err, ParseError::IndexOutOfBounds { index: 5, size: 2, .. }));
    }

    #[test]
    fn test_parse_error_wrong_params() {
        let err = parse("qubit[1] q;\nrz q[0];").unwrap_err();
        assert!(matches!(err, ParseError::CircuitError(_)));
    }

    #[test]
    fn test_parse_requires_qubits() {
        assert!(matches!(parse("OPENQASM 3.0;"), Err(ParseError::NoQubits)));
    }

    #[test]
    fn test_parse_invalid_version() {
        assert!(matches!(
            parse("OPENQASM 7.0; qubit q;"),
            Err(ParseError::InvalidVersion(_))
        ));
    }
}
