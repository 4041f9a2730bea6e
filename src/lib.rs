/// The lexer takes the source input, lazily mapping it into a sequence of
/// tokens.
pub mod lexer;

/// The parser pulls tokens from the lexer, mapping them into a syntax tree.
pub mod parser;

/// The analyzer takes a syntax tree, resolves its scopes and types, and maps
/// it into a semantic tree.
pub mod analyzer;

/// Runs the whole front end over some source text.
pub mod driver;

pub mod ast;
pub mod semantic;
pub mod token;

pub mod util {
    pub mod fmt {
        pub mod tree;
    }
    #[cfg(test)]
    pub(crate) mod test_utils;
}
