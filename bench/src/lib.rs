use std::fmt::Write;

/// Builds a program of `copies` declaration groups, each with distinct names,
/// covering every construct the front end accepts.
pub fn sample_source(copies: usize) -> String {
    let mut src = String::with_capacity(copies * 320);
    for i in 0..copies {
        _ = writeln!(
            src,
            r#"enum Color{i} {{ Red, Green = 10, Blue }}
class Point{i}<T>(var x: Integer, val y: Integer) {{
    var sum = 1 + 2 + 3;
    val label: String = "point {i}";
    var total: Integer get = 40 + 2;
    var range: Integer get {{ val limit = 1; return 2 + 3; }}
}}
val origin{i}: Point{i}<Integer>;"#
        );
    }
    src
}

#[cfg(test)]
mod tests {
    use super::sample_source;

    #[test]
    fn sample_compiles() {
        let compilation = bvc::driver::compile(&sample_source(3)).unwrap();
        assert_eq!(compilation.syntax.children().len(), 9);
    }
}
