use std::io;

use tracing::{debug, instrument};

use crate::{
    analyzer, ast, lexer, parser,
    semantic::SemanticTree,
    token::{Spanned, Token},
};

/// The output of every stage of the front end.
#[derive(Clone, Debug)]
pub struct Compilation {
    pub syntax: ast::Node,
    pub semantic: SemanticTree,
}

/// Parses and analyzes `src`.
#[instrument(level = "debug", skip_all, fields(len = src.len()))]
pub fn compile(src: &str) -> Result<Compilation, Error> {
    let syntax = parser::parse(src)?;
    debug!(declarations = syntax.children().len(), "parsed");
    let semantic = analyzer::analyze(&syntax)?;
    debug!("analyzed");
    Ok(Compilation { syntax, semantic })
}

/// Reads UTF-8 source text from `reader` up to its end, then compiles it.
pub fn compile_reader(mut reader: impl io::Read) -> Result<Compilation, Error> {
    let mut src = String::new();
    reader.read_to_string(&mut src)?;
    drop(reader);
    compile(&src)
}

/// Tokenizes `src`, mapping errors into the crate-level [`Error`].
pub fn tokenize(src: &str) -> Result<Vec<Token>, Error> {
    Ok(lexer::tokenize(src)?)
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read source: {0}")]
    Io(#[from] io::Error),
    #[error("lexical error at {0}")]
    Lexer(#[from] Spanned<lexer::Error>),
    #[error("syntax error at {0}")]
    Parser(#[source] Spanned<parser::Error>),
    #[error("semantic error: {0}")]
    Analyzer(#[from] analyzer::Error),
}

impl From<Spanned<parser::Error>> for Error {
    fn from(error: Spanned<parser::Error>) -> Self {
        match error.inner {
            parser::Error::Lexer(inner) => Error::Lexer(error.span.wrap(inner)),
            _ => Error::Parser(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::semantic::{EntryKind, Primitive};

    #[test]
    fn compile_runs_every_stage() {
        let compilation = compile("class C { var a = 10 + 5; }").unwrap();
        assert_eq!(compilation.syntax.children().len(), 1);

        let tree = &compilation.semantic;
        let c = tree.find_type(SemanticTree::ROOT, "C").unwrap();
        let [a] = tree[c].children() else {
            panic!("expected a single child");
        };
        assert!(matches!(
            tree[*a].kind,
            EntryKind::Variable { ty: Some(ty), .. } if ty == Primitive::Integer.id()
        ));
    }

    #[test]
    fn compile_reader_reads_to_the_end() {
        let src = "enum E { A, B }\nclass C;\n";
        let compilation = compile_reader(src.as_bytes()).unwrap();
        assert_eq!(compilation.syntax.children().len(), 2);
    }

    #[test]
    fn errors_name_their_stage() {
        let error = compile("var a = #;").unwrap_err();
        assert_eq!(error.to_string(), "lexical error at 8..9: unexpected character '#'");

        let error = compile("var a = 1").unwrap_err();
        assert_eq!(error.to_string(), "syntax error at 9..9: unexpected end of input");

        let error = compile("var a: Integer = true;").unwrap_err();
        assert_eq!(
            error.to_string(),
            "semantic error: a is declared as Integer, but its value is Boolean"
        );
    }

    #[test]
    fn invalid_utf8_is_an_io_error() {
        let error = compile_reader(&[0x66, 0xff, 0xfe][..]).unwrap_err();
        assert!(matches!(error, Error::Io(_)), "{error:?}");
    }
}
