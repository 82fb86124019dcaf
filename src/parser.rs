use crate::ast::*;
use crate::error::{CompileError, ErrorReporter};
use crate::scanner::{Scanner, Token, TokenKind};

/// Parse a whole program. A syntax error is reported and ends the parse;
/// no partial tree is returned.
pub fn parse(source: &str, reporter: &mut ErrorReporter) -> Option<Program> {
    let mut parser = Parser::new(Scanner::new(source));
    match parser.parse_program() {
        Ok(program) => Some(program),
        Err(e) => {
            reporter.report(e);
            None
        }
    }
}

type ParseResult<T> = Result<T, CompileError>;

struct Parser {
    scanner: Scanner,
    current: Token,
    /// Finish line of the last accepted token.
    previous_finish: u32,
}

impl Parser {
    fn new(mut scanner: Scanner) -> Self {
        let current = scanner.next_token();
        Self {
            scanner,
            current,
            previous_finish: 1,
        }
    }

    fn parse_program(&mut self) -> ParseResult<Program> {
        let start = self.start();
        let command = self.parse_command()?;
        if self.peek() != TokenKind::EndOfText {
            return Err(self.error("\"%\" not expected after end of program", &self.current.spelling));
        }
        Ok(Program {
            command,
            position: self.finish(start),
        })
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn peek(&self) -> TokenKind {
        self.current.kind
    }

    fn start(&self) -> u32 {
        self.current.position.start
    }

    fn finish(&self, start: u32) -> SourcePosition {
        SourcePosition::new(start, self.previous_finish.max(start))
    }

    fn advance(&mut self) -> Token {
        self.previous_finish = self.current.position.finish;
        let next = self.scanner.next_token();
        std::mem::replace(&mut self.current, next)
    }

    fn expect(&mut self, expected: TokenKind) -> ParseResult<Token> {
        if self.peek() == expected {
            Ok(self.advance())
        } else {
            Err(self.error("\"%\" expected here", expected.spell()))
        }
    }

    fn error(&self, template: &str, token: &str) -> CompileError {
        CompileError::syntax(template, token, self.current.position)
    }

    // ── Terminals ──────────────────────────────────────────────────

    fn parse_identifier(&mut self) -> ParseResult<Identifier> {
        if self.peek() == TokenKind::Identifier {
            let token = self.advance();
            Ok(Identifier::new(token.spelling, token.position))
        } else {
            Err(self.error("identifier expected here", ""))
        }
    }

    fn parse_operator(&mut self) -> ParseResult<Operator> {
        if self.peek() == TokenKind::Operator {
            let token = self.advance();
            Ok(Operator::new(token.spelling, token.position))
        } else {
            Err(self.error("operator expected here", ""))
        }
    }

    fn parse_integer_literal(&mut self) -> ParseResult<IntegerLiteral> {
        if self.peek() != TokenKind::IntLiteral {
            return Err(self.error("integer literal expected here", ""));
        }
        if self.current.spelling.parse::<i32>().is_err() {
            return Err(self.error("integer literal \"%\" is too large", &self.current.spelling));
        }
        let token = self.advance();
        Ok(IntegerLiteral::new(token.spelling, token.position))
    }

    fn parse_character_literal(&mut self) -> ParseResult<CharacterLiteral> {
        if self.peek() == TokenKind::CharLiteral {
            let token = self.advance();
            Ok(CharacterLiteral::new(token.spelling, token.position))
        } else {
            Err(self.error("character literal expected here", ""))
        }
    }

    // ── Commands ───────────────────────────────────────────────────

    fn parse_command(&mut self) -> ParseResult<Command> {
        let start = self.start();
        let mut command = self.parse_single_command()?;
        while self.peek() == TokenKind::Semicolon {
            self.advance();
            let second = self.parse_single_command()?;
            command = Command::new(
                CommandKind::Sequential {
                    first: Box::new(command),
                    second: Box::new(second),
                },
                self.finish(start),
            );
        }
        Ok(command)
    }

    fn parse_single_command(&mut self) -> ParseResult<Command> {
        let start = self.start();
        let kind = match self.peek() {
            TokenKind::Identifier => {
                let id = self.parse_identifier()?;
                if self.peek() == TokenKind::LParen {
                    self.advance();
                    let args = self.parse_actual_parameter_sequence()?;
                    self.expect(TokenKind::RParen)?;
                    CommandKind::Call { callee: id, args }
                } else {
                    let target = self.parse_rest_of_vname(id)?;
                    if self.peek() == TokenKind::DoubleOperator {
                        // `v **` is shorthand for `v := v * 2`
                        let op_token = self.advance();
                        let at = self.finish(start);
                        let left = Expression::new(ExpressionKind::Vname(target.clone()), target.position);
                        let two = Expression::new(
                            ExpressionKind::Integer(IntegerLiteral::new("2", op_token.position)),
                            op_token.position,
                        );
                        let value = Expression::new(
                            ExpressionKind::Binary {
                                left: Box::new(left),
                                op: Operator::new("*", op_token.position),
                                right: Box::new(two),
                            },
                            at,
                        );
                        CommandKind::Assign { target, value }
                    } else {
                        self.expect(TokenKind::Becomes)?;
                        let value = self.parse_expression()?;
                        CommandKind::Assign { target, value }
                    }
                }
            }
            TokenKind::Begin => {
                self.advance();
                let command = self.parse_command()?;
                self.expect(TokenKind::End)?;
                return Ok(command);
            }
            TokenKind::LCurly => {
                self.advance();
                let command = self.parse_command()?;
                self.expect(TokenKind::RCurly)?;
                return Ok(command);
            }
            TokenKind::Let => {
                self.advance();
                let declaration = self.parse_declaration()?;
                self.expect(TokenKind::In)?;
                let body = self.parse_single_command()?;
                CommandKind::Let {
                    declaration: Box::new(declaration),
                    body: Box::new(body),
                }
            }
            TokenKind::If => {
                self.advance();
                let condition = self.parse_expression()?;
                self.expect(TokenKind::Then)?;
                let then_branch = self.parse_single_command()?;
                self.expect(TokenKind::Else)?;
                let else_branch = self.parse_single_command()?;
                CommandKind::If {
                    condition,
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                }
            }
            TokenKind::While => {
                self.advance();
                let condition = self.parse_expression()?;
                self.expect(TokenKind::Do)?;
                let body = self.parse_single_command()?;
                CommandKind::While {
                    condition,
                    body: Box::new(body),
                }
            }
            TokenKind::Repeat => {
                self.advance();
                let body = self.parse_single_command()?;
                self.expect(TokenKind::Until)?;
                let condition = self.parse_expression()?;
                CommandKind::Repeat {
                    body: Box::new(body),
                    condition,
                }
            }
            TokenKind::Loop => {
                self.advance();
                let body = self.parse_single_command()?;
                self.expect(TokenKind::While)?;
                let condition = self.parse_expression()?;
                self.expect(TokenKind::Do)?;
                let tail = self.parse_single_command()?;
                CommandKind::LoopWhile {
                    body: Box::new(body),
                    condition,
                    tail: Box::new(tail),
                }
            }
            TokenKind::Semicolon
            | TokenKind::End
            | TokenKind::RCurly
            | TokenKind::Else
            | TokenKind::In
            | TokenKind::EndOfText => CommandKind::Empty,
            _ => return Err(self.error("\"%\" cannot start a command", &self.current.spelling)),
        };
        Ok(Command::new(kind, self.finish(start)))
    }

    // ── Expressions ────────────────────────────────────────────────

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        let start = self.start();
        let kind = match self.peek() {
            TokenKind::Let => {
                self.advance();
                let declaration = self.parse_declaration()?;
                self.expect(TokenKind::In)?;
                let body = self.parse_expression()?;
                ExpressionKind::Let {
                    declaration: Box::new(declaration),
                    body: Box::new(body),
                }
            }
            TokenKind::If => {
                self.advance();
                let condition = self.parse_expression()?;
                self.expect(TokenKind::Then)?;
                let then_branch = self.parse_expression()?;
                self.expect(TokenKind::Else)?;
                let else_branch = self.parse_expression()?;
                ExpressionKind::If {
                    condition: Box::new(condition),
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                }
            }
            _ => return self.parse_secondary_expression(),
        };
        Ok(Expression::new(kind, self.finish(start)))
    }

    /// Binary operators all share one precedence and associate to the left.
    fn parse_secondary_expression(&mut self) -> ParseResult<Expression> {
        let start = self.start();
        let mut expr = self.parse_primary_expression()?;
        while self.peek() == TokenKind::Operator {
            let op = self.parse_operator()?;
            let right = self.parse_primary_expression()?;
            expr = Expression::new(
                ExpressionKind::Binary {
                    left: Box::new(expr),
                    op,
                    right: Box::new(right),
                },
                self.finish(start),
            );
        }
        Ok(expr)
    }

    fn parse_primary_expression(&mut self) -> ParseResult<Expression> {
        let start = self.start();
        let kind = match self.peek() {
            TokenKind::IntLiteral => ExpressionKind::Integer(self.parse_integer_literal()?),
            TokenKind::CharLiteral => ExpressionKind::Character(self.parse_character_literal()?),
            TokenKind::LBracket => {
                self.advance();
                let aggregate = self.parse_array_aggregate()?;
                self.expect(TokenKind::RBracket)?;
                ExpressionKind::Array(Box::new(aggregate))
            }
            TokenKind::LCurly => {
                self.advance();
                let aggregate = self.parse_record_aggregate()?;
                self.expect(TokenKind::RCurly)?;
                ExpressionKind::Record(Box::new(aggregate))
            }
            TokenKind::Identifier => {
                let id = self.parse_identifier()?;
                if self.peek() == TokenKind::LParen {
                    self.advance();
                    let args = self.parse_actual_parameter_sequence()?;
                    self.expect(TokenKind::RParen)?;
                    ExpressionKind::Call { callee: id, args }
                } else {
                    ExpressionKind::Vname(self.parse_rest_of_vname(id)?)
                }
            }
            TokenKind::Operator => {
                let op = self.parse_operator()?;
                let operand = self.parse_primary_expression()?;
                ExpressionKind::Unary {
                    op,
                    operand: Box::new(operand),
                }
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                return Ok(expr);
            }
            _ => return Err(self.error("\"%\" cannot start an expression", &self.current.spelling)),
        };
        Ok(Expression::new(kind, self.finish(start)))
    }

    fn parse_record_aggregate(&mut self) -> ParseResult<RecordAggregate> {
        let start = self.start();
        let field = self.parse_identifier()?;
        self.expect(TokenKind::Is)?;
        let value = self.parse_expression()?;
        if self.peek() == TokenKind::Comma {
            self.advance();
            let rest = self.parse_record_aggregate()?;
            Ok(RecordAggregate::Multiple {
                field,
                value,
                rest: Box::new(rest),
                position: self.finish(start),
            })
        } else {
            Ok(RecordAggregate::Single {
                field,
                value,
                position: self.finish(start),
            })
        }
    }

    fn parse_array_aggregate(&mut self) -> ParseResult<ArrayAggregate> {
        let start = self.start();
        let element = self.parse_expression()?;
        if self.peek() == TokenKind::Comma {
            self.advance();
            let rest = self.parse_array_aggregate()?;
            Ok(ArrayAggregate::Multiple {
                element,
                rest: Box::new(rest),
                position: self.finish(start),
            })
        } else {
            Ok(ArrayAggregate::Single {
                element,
                position: self.finish(start),
            })
        }
    }

    // ── Value-or-variable names ────────────────────────────────────

    fn parse_vname(&mut self) -> ParseResult<Vname> {
        let id = self.parse_identifier()?;
        self.parse_rest_of_vname(id)
    }

    fn parse_rest_of_vname(&mut self, id: Identifier) -> ParseResult<Vname> {
        let start = id.position.start;
        let position = id.position;
        let mut vname = Vname::new(VnameKind::Simple(id), position);
        loop {
            match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    let field = self.parse_identifier()?;
                    vname = Vname::new(
                        VnameKind::Dot {
                            record: Box::new(vname),
                            field,
                        },
                        self.finish(start),
                    );
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RBracket)?;
                    vname = Vname::new(
                        VnameKind::Subscript {
                            array: Box::new(vname),
                            index: Box::new(index),
                        },
                        self.finish(start),
                    );
                }
                _ => return Ok(vname),
            }
        }
    }

    // ── Declarations ───────────────────────────────────────────────

    fn parse_declaration(&mut self) -> ParseResult<Declaration> {
        let start = self.start();
        let mut declaration = self.parse_single_declaration()?;
        while self.peek() == TokenKind::Semicolon {
            self.advance();
            let second = self.parse_single_declaration()?;
            declaration = Declaration::new(
                DeclarationKind::Sequential {
                    first: Box::new(declaration),
                    second: Box::new(second),
                },
                self.finish(start),
            );
        }
        Ok(declaration)
    }

    fn parse_single_declaration(&mut self) -> ParseResult<Declaration> {
        let start = self.start();
        let kind = match self.peek() {
            TokenKind::Const => {
                self.advance();
                let name = self.parse_identifier()?;
                self.expect(TokenKind::Is)?;
                let value = self.parse_expression()?;
                DeclarationKind::Const { name, value }
            }
            TokenKind::Var => {
                self.advance();
                let name = self.parse_identifier()?;
                self.expect(TokenKind::Colon)?;
                let ty = self.parse_type_denoter()?;
                DeclarationKind::Var { name, ty }
            }
            TokenKind::Proc => {
                self.advance();
                let name = self.parse_identifier()?;
                self.expect(TokenKind::LParen)?;
                let formals = self.parse_formal_parameter_sequence()?;
                self.expect(TokenKind::RParen)?;
                self.expect(TokenKind::Is)?;
                let body = self.parse_single_command()?;
                DeclarationKind::Proc {
                    name,
                    formals,
                    body: Box::new(body),
                }
            }
            TokenKind::Func => {
                self.advance();
                let name = self.parse_identifier()?;
                self.expect(TokenKind::LParen)?;
                let formals = self.parse_formal_parameter_sequence()?;
                self.expect(TokenKind::RParen)?;
                self.expect(TokenKind::Colon)?;
                let result = self.parse_type_denoter()?;
                self.expect(TokenKind::Is)?;
                let body = self.parse_expression()?;
                DeclarationKind::Func {
                    name,
                    formals,
                    result,
                    body,
                }
            }
            TokenKind::Type => {
                self.advance();
                let name = self.parse_identifier()?;
                self.expect(TokenKind::Is)?;
                let ty = self.parse_type_denoter()?;
                DeclarationKind::Type { name, ty }
            }
            _ => return Err(self.error("\"%\" cannot start a declaration", &self.current.spelling)),
        };
        Ok(Declaration::new(kind, self.finish(start)))
    }

    // ── Parameters ─────────────────────────────────────────────────

    fn parse_formal_parameter_sequence(&mut self) -> ParseResult<FormalParameterSequence> {
        if self.peek() == TokenKind::RParen {
            let start = self.start();
            return Ok(FormalParameterSequence::Empty {
                position: SourcePosition::new(start, start),
            });
        }
        self.parse_proper_formal_parameter_sequence()
    }

    fn parse_proper_formal_parameter_sequence(&mut self) -> ParseResult<FormalParameterSequence> {
        let start = self.start();
        let param = Box::new(self.parse_formal_parameter()?);
        if self.peek() == TokenKind::Comma {
            self.advance();
            let rest = self.parse_proper_formal_parameter_sequence()?;
            Ok(FormalParameterSequence::Multiple {
                param,
                rest: Box::new(rest),
                position: self.finish(start),
            })
        } else {
            Ok(FormalParameterSequence::Single {
                param,
                position: self.finish(start),
            })
        }
    }

    fn parse_formal_parameter(&mut self) -> ParseResult<FormalParameter> {
        let start = self.start();
        let kind = match self.peek() {
            TokenKind::Identifier => {
                let name = self.parse_identifier()?;
                self.expect(TokenKind::Colon)?;
                let ty = self.parse_type_denoter()?;
                FormalParameterKind::Const { name, ty }
            }
            TokenKind::Var => {
                self.advance();
                let name = self.parse_identifier()?;
                self.expect(TokenKind::Colon)?;
                let ty = self.parse_type_denoter()?;
                FormalParameterKind::Var { name, ty }
            }
            TokenKind::Proc => {
                self.advance();
                let name = self.parse_identifier()?;
                self.expect(TokenKind::LParen)?;
                let formals = self.parse_formal_parameter_sequence()?;
                self.expect(TokenKind::RParen)?;
                FormalParameterKind::Proc { name, formals }
            }
            TokenKind::Func => {
                self.advance();
                let name = self.parse_identifier()?;
                self.expect(TokenKind::LParen)?;
                let formals = self.parse_formal_parameter_sequence()?;
                self.expect(TokenKind::RParen)?;
                self.expect(TokenKind::Colon)?;
                let result = self.parse_type_denoter()?;
                FormalParameterKind::Func {
                    name,
                    formals,
                    result,
                }
            }
            _ => {
                return Err(self.error("\"%\" cannot start a formal parameter", &self.current.spelling));
            }
        };
        Ok(FormalParameter::new(kind, self.finish(start)))
    }

    fn parse_actual_parameter_sequence(&mut self) -> ParseResult<ActualParameterSequence> {
        if self.peek() == TokenKind::RParen {
            let start = self.start();
            return Ok(ActualParameterSequence::Empty {
                position: SourcePosition::new(start, start),
            });
        }
        self.parse_proper_actual_parameter_sequence()
    }

    fn parse_proper_actual_parameter_sequence(&mut self) -> ParseResult<ActualParameterSequence> {
        let start = self.start();
        let param = Box::new(self.parse_actual_parameter()?);
        if self.peek() == TokenKind::Comma {
            self.advance();
            let rest = self.parse_proper_actual_parameter_sequence()?;
            Ok(ActualParameterSequence::Multiple {
                param,
                rest: Box::new(rest),
                position: self.finish(start),
            })
        } else {
            Ok(ActualParameterSequence::Single {
                param,
                position: self.finish(start),
            })
        }
    }

    fn parse_actual_parameter(&mut self) -> ParseResult<ActualParameter> {
        let start = self.start();
        let kind = match self.peek() {
            TokenKind::Identifier
            | TokenKind::IntLiteral
            | TokenKind::CharLiteral
            | TokenKind::Operator
            | TokenKind::Let
            | TokenKind::If
            | TokenKind::LParen
            | TokenKind::LBracket
            | TokenKind::LCurly => ActualParameterKind::Const(self.parse_expression()?),
            TokenKind::Var => {
                self.advance();
                ActualParameterKind::Var(self.parse_vname()?)
            }
            TokenKind::Proc => {
                self.advance();
                ActualParameterKind::Proc(self.parse_identifier()?)
            }
            TokenKind::Func => {
                self.advance();
                ActualParameterKind::Func(self.parse_identifier()?)
            }
            _ => {
                return Err(self.error("\"%\" cannot start an actual parameter", &self.current.spelling));
            }
        };
        Ok(ActualParameter {
            kind,
            position: self.finish(start),
        })
    }

    // ── Type denoters ──────────────────────────────────────────────

    fn parse_type_denoter(&mut self) -> ParseResult<TypeRef> {
        let start = self.start();
        let kind = match self.peek() {
            TokenKind::Identifier => TypeKind::Simple(self.parse_identifier()?),
            TokenKind::Array => {
                self.advance();
                let length = self.parse_integer_literal()?;
                self.expect(TokenKind::Of)?;
                let element = self.parse_type_denoter()?;
                TypeKind::Array { length, element }
            }
            TokenKind::Record => {
                self.advance();
                let fields = self.parse_field_type_denoter()?;
                self.expect(TokenKind::End)?;
                TypeKind::Record(fields)
            }
            _ => return Err(self.error("\"%\" cannot start a type denoter", &self.current.spelling)),
        };
        Ok(TypeDenoter::new(kind, self.finish(start)))
    }

    fn parse_field_type_denoter(&mut self) -> ParseResult<FieldTypeDenoter> {
        let start = self.start();
        let name = self.parse_identifier()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type_denoter()?;
        if self.peek() == TokenKind::Comma {
            self.advance();
            let rest = self.parse_field_type_denoter()?;
            Ok(FieldTypeDenoter::Multiple {
                name,
                ty,
                rest: Box::new(rest),
                position: self.finish(start),
                entity: std::cell::OnceCell::new(),
            })
        } else {
            Ok(FieldTypeDenoter::Single {
                name,
                ty,
                position: self.finish(start),
                entity: std::cell::OnceCell::new(),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn parse_str(s: &str) -> Program {
        let mut reporter = ErrorReporter::new();
        let program = parse(s, &mut reporter);
        assert!(!reporter.has_errors(), "{:?}", reporter.errors());
        program.unwrap()
    }

    fn parse_err(s: &str) -> String {
        let mut reporter = ErrorReporter::new();
        assert!(parse(s, &mut reporter).is_none());
        assert_eq!(reporter.error_count(), 1);
        assert_eq!(reporter.errors()[0].kind, ErrorKind::Syntax);
        reporter.errors()[0].message()
    }

    /// Render an expression with explicit grouping, to check association.
    fn shape(e: &Expression) -> String {
        match &e.kind {
            ExpressionKind::Integer(il) => il.spelling.clone(),
            ExpressionKind::Vname(Vname { kind: VnameKind::Simple(id), .. }) => id.spelling.clone(),
            ExpressionKind::Binary { left, op, right } => {
                format!("({} {} {})", shape(left), op.spelling, shape(right))
            }
            ExpressionKind::Unary { op, operand } => format!("({}{})", op.spelling, shape(operand)),
            ExpressionKind::Call { callee, .. } => format!("{}(..)", callee.spelling),
            other => format!("{other:?}"),
        }
    }

    fn assigned(program: &Program) -> &Expression {
        match &program.command.kind {
            CommandKind::Assign { value, .. } => value,
            CommandKind::Let { body, .. } => match &body.kind {
                CommandKind::Assign { value, .. } => value,
                other => panic!("expected assignment, got {other:?}"),
            },
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    #[test]
    fn binary_operators_associate_left_without_precedence() {
        let program = parse_str("x := 2 + 3 * 1 - 4");
        assert_eq!(shape(assigned(&program)), "(((2 + 3) * 1) - 4)");
    }

    #[test]
    fn parentheses_group() {
        let program = parse_str("x := 2 + (3 * 1)");
        assert_eq!(shape(assigned(&program)), "(2 + (3 * 1))");
    }

    #[test]
    fn unary_binds_to_primary() {
        let program = parse_str("b := \\ p /\\ q");
        assert_eq!(shape(assigned(&program)), "((\\p) /\\ q)");
    }

    #[test]
    fn sequential_commands_chain_left() {
        let program = parse_str("a := 1; b := 2; c := 3");
        match &program.command.kind {
            CommandKind::Sequential { first, second } => {
                assert!(matches!(first.kind, CommandKind::Sequential { .. }));
                assert!(matches!(second.kind, CommandKind::Assign { .. }));
            }
            other => panic!("expected sequence, got {other:?}"),
        }
    }

    #[test]
    fn let_with_declarations() {
        let program = parse_str("let const pi ~ 3; var x: Integer in putint(pi)");
        let CommandKind::Let { declaration, body } = &program.command.kind else {
            panic!("expected let");
        };
        let DeclarationKind::Sequential { first, second } = &declaration.kind else {
            panic!("expected declaration sequence");
        };
        assert!(matches!(&first.kind, DeclarationKind::Const { name, .. } if name.spelling == "pi"));
        assert!(matches!(&second.kind, DeclarationKind::Var { name, .. } if name.spelling == "x"));
        assert!(matches!(&body.kind, CommandKind::Call { callee, .. } if callee.spelling == "putint"));
    }

    #[test]
    fn double_operator_desugars_to_doubling() {
        let program = parse_str("n **");
        let CommandKind::Assign { target, value } = &program.command.kind else {
            panic!("expected assignment");
        };
        assert!(matches!(&target.kind, VnameKind::Simple(id) if id.spelling == "n"));
        assert_eq!(shape(value), "(n * 2)");
    }

    #[test]
    fn vnames_chain_fields_and_subscripts() {
        let program = parse_str("a.b[i].c := 0");
        let CommandKind::Assign { target, .. } = &program.command.kind else {
            panic!("expected assignment");
        };
        let VnameKind::Dot { record, field } = &target.kind else {
            panic!("expected field selection");
        };
        assert_eq!(field.spelling, "c");
        let VnameKind::Subscript { array, .. } = &record.kind else {
            panic!("expected subscript");
        };
        assert!(matches!(&array.kind, VnameKind::Dot { field, .. } if field.spelling == "b"));
    }

    #[test]
    fn control_commands() {
        let program = parse_str(
            "begin \
               while x < 10 do x := x + 1; \
               repeat x := x - 1 until x = 0; \
               loop getint(var x) while x > 0 do putint(x); \
               if x = 0 then puteol() else { } \
             end",
        );
        let stats = program.stats();
        assert!(stats.commands >= 9);
    }

    #[test]
    fn routine_declarations_and_parameters() {
        let program = parse_str(
            "let \
               proc p(x: Integer, var y: Integer, proc q(), func f(c: Char): Boolean) ~ y := x; \
               func sq(n: Integer): Integer ~ n * n \
             in p(1, var z, proc r, func g)",
        );
        let CommandKind::Let { declaration, body } = &program.command.kind else {
            panic!("expected let");
        };
        let DeclarationKind::Sequential { first, .. } = &declaration.kind else {
            panic!("expected declaration sequence");
        };
        let DeclarationKind::Proc { formals, .. } = &first.kind else {
            panic!("expected proc");
        };
        let params = formals.params();
        assert_eq!(params.len(), 4);
        assert!(matches!(params[1].kind, FormalParameterKind::Var { .. }));
        assert!(matches!(params[3].kind, FormalParameterKind::Func { .. }));
        let CommandKind::Call { args, .. } = &body.kind else {
            panic!("expected call");
        };
        assert!(matches!(args, ActualParameterSequence::Multiple { .. }));
    }

    #[test]
    fn aggregates_and_types() {
        let program = parse_str(
            "let type R ~ record a: Integer, b: array 2 of Char end; \
                 var r: R \
             in r := {a ~ 1, b ~ ['x', 'y']}",
        );
        let value = assigned(&program);
        let ExpressionKind::Record(aggregate) = &value.kind else {
            panic!("expected record aggregate");
        };
        let RecordAggregate::Multiple { rest, .. } = &**aggregate else {
            panic!("expected two fields");
        };
        let RecordAggregate::Single { value, .. } = rest.as_ref() else {
            panic!("expected single field");
        };
        assert!(matches!(&value.kind, ExpressionKind::Array(aa) if aa.element_count() == 2));
    }

    #[test]
    fn empty_program_is_empty_command() {
        let program = parse_str("");
        assert!(matches!(program.command.kind, CommandKind::Empty));
    }

    #[test]
    fn positions_span_lines() {
        let program = parse_str("let\n  var x: Integer\nin\n  x := 1");
        assert_eq!(program.command.position, SourcePosition::new(1, 4));
    }

    #[test]
    fn syntax_errors() {
        assert_eq!(parse_err("x := "), "\"\" cannot start an expression");
        assert_eq!(parse_err("x = 1"), "\":=\" expected here");
        assert_eq!(parse_err("x := 1 )"), "\")\" not expected after end of program");
        assert_eq!(parse_err("let in x := 1"), "\"in\" cannot start a declaration");
        assert_eq!(parse_err("let var x: 3 in x := 1"), "\"3\" cannot start a type denoter");
        assert_eq!(parse_err("then"), "\"then\" cannot start a command");
        assert_eq!(parse_err("x := 'a"), "\"'a\" cannot start an expression");
        assert_eq!(parse_err("x := 99999999999"), "integer literal \"99999999999\" is too large");
    }
}
