use crate::ast::*;
use crate::machine::{self, Primitive};
use crate::std_env::StdEnvironment;

// ── Constant folding on a checked tree ─────────────────────────────

/// Collapse integer-constant arithmetic into literals, in place. Only the
/// standard `+ - * / //` fold, recognised by binding rather than spelling,
/// so a program that redeclares `+` keeps its own meaning. Returns the
/// number of binary expressions folded.
pub fn fold_constants(program: &mut Program, std_env: &StdEnvironment) -> usize {
    let mut folder = Folder { std_env, folds: 0 };
    folder.fold_command(&mut program.command);
    tracing::debug!(folds = folder.folds, "constant folding finished");
    folder.folds
}

struct Folder<'env> {
    std_env: &'env StdEnvironment,
    folds: usize,
}

/// Apply `primitive` as the target machine would, or decline: division by zero,
/// overflow, and results outside the machine's integer range stay unfolded
/// so the fault surfaces at run time.
fn evaluate(primitive: Primitive, a: i32, b: i32) -> Option<i32> {
    let value = match primitive {
        Primitive::Add => a.checked_add(b),
        Primitive::Sub => a.checked_sub(b),
        Primitive::Mult => a.checked_mul(b),
        Primitive::Div => a.checked_div(b),
        Primitive::Mod => a.checked_rem(b),
        _ => None,
    }?;
    (-machine::MAXINT_REP..=machine::MAXINT_REP)
        .contains(&value)
        .then_some(value)
}

fn integer_value(expr: &Expression) -> Option<i32> {
    match &expr.kind {
        ExpressionKind::Integer(il) => Some(il.value()),
        _ => None,
    }
}

impl Folder<'_> {
    fn fold_command(&mut self, command: &mut Command) {
        match &mut command.kind {
            CommandKind::Empty => {}
            CommandKind::Assign { target, value } => {
                self.fold_vname(target);
                self.substitute(value);
            }
            CommandKind::Call { args, .. } => self.fold_actuals(args),
            CommandKind::Sequential { first, second } => {
                self.fold_command(first);
                self.fold_command(second);
            }
            CommandKind::Let { declaration, body } => {
                self.fold_declaration(declaration);
                self.fold_command(body);
            }
            CommandKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.substitute(condition);
                self.fold_command(then_branch);
                self.fold_command(else_branch);
            }
            CommandKind::While { condition, body } | CommandKind::Repeat { body, condition } => {
                self.substitute(condition);
                self.fold_command(body);
            }
            CommandKind::LoopWhile {
                body,
                condition,
                tail,
            } => {
                self.fold_command(body);
                self.substitute(condition);
                self.fold_command(tail);
            }
        }
    }

    /// Replace `expr` with its folded form, if it has one.
    fn substitute(&mut self, expr: &mut Expression) {
        if let Some(folded) = self.fold_expr(expr) {
            *expr = folded;
        }
    }

    /// `Some` when the whole expression is an integer constant; otherwise
    /// rewrites foldable children in place and returns `None`.
    fn fold_expr(&mut self, expr: &mut Expression) -> Option<Expression> {
        match &mut expr.kind {
            ExpressionKind::Integer(_) => Some(expr.clone()),
            ExpressionKind::Binary { left, op, right } => {
                self.substitute(left);
                self.substitute(right);
                let a = integer_value(left)?;
                let b = integer_value(right)?;
                let primitive = op.decl.and_then(|id| self.std_env.arithmetic_primitive(id))?;
                let value = evaluate(primitive, a, b)?;
                self.folds += 1;
                let position = left.position;
                let mut literal = Expression::new(
                    ExpressionKind::Integer(IntegerLiteral::new(value.to_string(), position)),
                    position,
                );
                literal.ty = Some(self.std_env.integer_type.clone());
                Some(literal)
            }
            ExpressionKind::Empty | ExpressionKind::Character(_) => None,
            ExpressionKind::Vname(vname) => {
                self.fold_vname(vname);
                None
            }
            ExpressionKind::Call { args, .. } => {
                self.fold_actuals(args);
                None
            }
            ExpressionKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.substitute(condition);
                self.substitute(then_branch);
                self.substitute(else_branch);
                None
            }
            ExpressionKind::Let { declaration, body } => {
                self.fold_declaration(declaration);
                self.substitute(body);
                None
            }
            ExpressionKind::Unary { operand, .. } => {
                self.substitute(operand);
                None
            }
            ExpressionKind::Array(aggregate) => {
                self.fold_array_aggregate(aggregate);
                None
            }
            ExpressionKind::Record(aggregate) => {
                self.fold_record_aggregate(aggregate);
                None
            }
        }
    }

    fn fold_array_aggregate(&mut self, aggregate: &mut ArrayAggregate) {
        match aggregate {
            ArrayAggregate::Single { element, .. } => self.substitute(element),
            ArrayAggregate::Multiple { element, rest, .. } => {
                self.substitute(element);
                self.fold_array_aggregate(rest);
            }
        }
    }

    fn fold_record_aggregate(&mut self, aggregate: &mut RecordAggregate) {
        match aggregate {
            RecordAggregate::Single { value, .. } => self.substitute(value),
            RecordAggregate::Multiple { value, rest, .. } => {
                self.substitute(value);
                self.fold_record_aggregate(rest);
            }
        }
    }

    fn fold_vname(&mut self, vname: &mut Vname) {
        match &mut vname.kind {
            VnameKind::Simple(_) => {}
            VnameKind::Dot { record, .. } => self.fold_vname(record),
            VnameKind::Subscript { array, index } => {
                self.fold_vname(array);
                self.substitute(index);
            }
        }
    }

    fn fold_declaration(&mut self, declaration: &mut Declaration) {
        match &mut declaration.kind {
            DeclarationKind::Const { value, .. } => self.substitute(value),
            DeclarationKind::Proc { body, .. } => self.fold_command(body),
            DeclarationKind::Func { body, .. } => self.substitute(body),
            DeclarationKind::Sequential { first, second } => {
                self.fold_declaration(first);
                self.fold_declaration(second);
            }
            DeclarationKind::Var { .. } | DeclarationKind::Type { .. } => {}
        }
    }

    fn fold_actuals(&mut self, args: &mut ActualParameterSequence) {
        let (param, rest) = match args {
            ActualParameterSequence::Empty { .. } => return,
            ActualParameterSequence::Single { param, .. } => (param, None),
            ActualParameterSequence::Multiple { param, rest, .. } => (param, Some(rest)),
        };
        match &mut param.kind {
            ActualParameterKind::Const(expr) => self.substitute(expr),
            ActualParameterKind::Var(vname) => self.fold_vname(vname),
            ActualParameterKind::Proc(_) | ActualParameterKind::Func(_) => {}
        }
        if let Some(rest) = rest {
            self.fold_actuals(rest);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::checker::check;
    use crate::error::ErrorReporter;
    use crate::parser::parse;
    use proptest::prelude::*;

    fn fold_str(source: &str) -> (Program, usize) {
        let mut reporter = ErrorReporter::new();
        let mut program = parse(source, &mut reporter).unwrap();
        let env = StdEnvironment::new();
        check(&mut program, &env, &mut reporter);
        assert!(!reporter.has_errors(), "{:?}", reporter.errors());
        let folds = fold_constants(&mut program, &env);
        (program, folds)
    }

    /// Value assigned by a program of the form `let ... in x := E`.
    fn assigned(program: &Program) -> &Expression {
        let CommandKind::Let { body, .. } = &program.command.kind else {
            panic!("expected let");
        };
        let CommandKind::Assign { value, .. } = &body.kind else {
            panic!("expected assignment");
        };
        value
    }

    #[test]
    fn folds_left_to_right() {
        let (program, folds) = fold_str("let var x: Integer in x := 2 + 3 * 4");
        assert_eq!(folds, 2);
        assert_eq!(integer_value(assigned(&program)), Some(20));
        assert!(assigned(&program).ty.as_ref().unwrap().equivalent(&StdEnvironment::new().integer_type));
    }

    #[test]
    fn partial_folding_keeps_variables() {
        let (program, folds) = fold_str("let var x: Integer in x := x + (2 * 5)");
        assert_eq!(folds, 1);
        let ExpressionKind::Binary { left, right, .. } = &assigned(&program).kind else {
            panic!("expected binary");
        };
        assert!(matches!(left.kind, ExpressionKind::Vname(_)));
        assert_eq!(integer_value(right), Some(10));
    }

    #[test]
    fn comparisons_and_booleans_are_not_folded() {
        let (program, folds) = fold_str("let var b: Boolean in b := 1 < 2");
        assert_eq!(folds, 0);
        assert!(matches!(assigned(&program).kind, ExpressionKind::Binary { .. }));
    }

    #[test]
    fn division_by_zero_is_left_for_run_time() {
        let (program, folds) = fold_str("let var x: Integer in x := (4 - 4) + 7 / 0");
        assert_eq!(folds, 2);
        let ExpressionKind::Binary { left, op, right } = &assigned(&program).kind else {
            panic!("expected binary");
        };
        assert_eq!(op.spelling, "/");
        assert_eq!(integer_value(left), Some(7));
        assert_eq!(integer_value(right), Some(0));
    }

    #[test]
    fn out_of_range_results_are_not_folded() {
        let (_, folds) = fold_str("let var x: Integer in x := 30000 + 30000");
        assert_eq!(folds, 0);
    }

    #[test]
    fn modulo_folds() {
        let (program, _) = fold_str("let var x: Integer in x := 7 // 2");
        assert_eq!(integer_value(assigned(&program)), Some(1));
    }

    #[test]
    fn folds_inside_arguments_and_declarations() {
        let (program, folds) = fold_str("let const k ~ 6 * 7 in putint(k - (1 + 1))");
        assert_eq!(folds, 2);
        let CommandKind::Let { declaration, body } = &program.command.kind else {
            panic!("expected let");
        };
        let DeclarationKind::Const { value, .. } = &declaration.kind else {
            panic!("expected const");
        };
        assert_eq!(integer_value(value), Some(42));
        let CommandKind::Call { args: ActualParameterSequence::Single { param, .. }, .. } = &body.kind else {
            panic!("expected call");
        };
        let ActualParameterKind::Const(arg) = &param.kind else {
            panic!("expected const actual");
        };
        let ExpressionKind::Binary { right, .. } = &arg.kind else {
            panic!("expected binary");
        };
        assert_eq!(integer_value(right), Some(2));
    }

    fn arith() -> impl Strategy<Value = (i32, Vec<(char, i32)>)> {
        (0..100i32, prop::collection::vec((prop::sample::select(vec!['+', '-', '*']), 0..10i32), 0..6))
    }

    proptest! {
        #[test]
        fn folding_matches_left_to_right_evaluation((first, rest) in arith()) {
            let mut source = format!("let var x: Integer in x := {first}");
            let mut expected = first;
            let mut in_range = true;
            for (op, n) in &rest {
                source.push_str(&format!(" {op} {n}"));
                expected = match op {
                    '+' => expected + n,
                    '-' => expected - n,
                    _ => expected * n,
                };
                in_range &= expected.abs() <= machine::MAXINT_REP;
            }
            prop_assume!(in_range);
            let (mut program, folds) = fold_str(&source);
            prop_assert_eq!(folds, rest.len());
            prop_assert_eq!(integer_value(assigned(&program)), Some(expected));

            let env = StdEnvironment::new();
            prop_assert_eq!(fold_constants(&mut program, &env), 0);
        }
    }
}
