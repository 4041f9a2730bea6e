use crate::{
    analyzer, parser,
    util::fmt::tree::{ExprDisplay, SemanticTreeDisplay, SyntaxTreeDisplay},
};

/// Each variant contains the input.
pub enum Test {
    ParserProgram(&'static str),
    ParserExpr(&'static str),
    AnalyzerProgram(&'static str),
}

pub enum Assertion {
    TreeOk(&'static str),
    ExpectedErrors(&'static [&'static str]),
}

/// Runs `test` through the stages it names, returning the printed tree and
/// the error, if any. Every stage fails fast, so a failed run has an empty
/// tree and exactly one error.
#[track_caller]
pub fn run_pipeline(test: Test) -> (String, Vec<String>) {
    let result = match test {
        Test::ParserProgram(input) => parser::parse(input)
            .map(|root| SyntaxTreeDisplay(&root).to_string())
            .map_err(|error| error.to_string()),
        Test::ParserExpr(input) => parser::parse_expr(input)
            .map(|expr| ExprDisplay(&expr).to_string())
            .map_err(|error| error.to_string()),
        Test::AnalyzerProgram(input) => match parser::parse(input) {
            Ok(root) => analyzer::analyze(&root)
                .map(|tree| SemanticTreeDisplay(&tree).to_string())
                .map_err(|error| error.to_string()),
            Err(error) => Err(error.to_string()),
        },
    };
    match result {
        Ok(tree) => (tree, vec![]),
        Err(error) => (String::new(), vec![error]),
    }
}

#[track_caller]
pub fn run_assertion(
    assertion: Assertion,
    formatted_actual_tree: &str,
    formatted_actual_errors: &[String],
) {
    match assertion {
        Assertion::TreeOk(expected_tree) => {
            let expected_errors: &[&str] = &[];
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors);
            ::pretty_assertions::assert_eq!(formatted_actual_tree.trim(), expected_tree.trim());
        }
        Assertion::ExpectedErrors(expected_errors) => {
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors);
        }
    }
}

macro_rules! tree_tests {
    (
        use $test_kind:ident;

        $(
            fn $test_name:ident() {
                let $source_kind:ident = $source:expr;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let test: crate::util::test_utils::Test =
                    tree_tests!(@@get_test($test_kind, $source_kind), $source);
                let (formatted_actual_tree, formatted_actual_errors) =
                    crate::util::test_utils::run_pipeline(test);
                let ctx = (&formatted_actual_tree, &formatted_actual_errors);
                tree_tests!(@@expand_assertions, ctx, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $ctx:expr, []) => {};
    (@@expand_assertions, $ctx:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            tree_tests!(@@assertion, $assertion, $assertion_expected),
            $ctx.0,
            $ctx.1,
        );
        tree_tests!(@@expand_assertions, $ctx, [$($rest_assertions_tt)*]);
    };

    (@@assertion, tree_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk(::indoc::indoc! { $expected })
    };
    (@@assertion, expected_errors, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedErrors($expected)
    };

    (@@get_test(parser, program), $source:expr) => {
        crate::util::test_utils::Test::ParserProgram($source)
    };
    (@@get_test(parser, expr), $source:expr) => {
        crate::util::test_utils::Test::ParserExpr($source)
    };
    (@@get_test(analyzer, program), $source:expr) => {
        crate::util::test_utils::Test::AnalyzerProgram($source)
    };
}
pub(crate) use tree_tests;
