use std::collections::HashSet;

use super::error::{AssemblyError, AssemblyErrorKind, Result};
use super::Line;

/// A `%macro` definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macro {
    pub name: String,
    pub params: Vec<String>,
    /// Body lines, tokenized but not expanded
    pub body: Vec<Line>,
}

impl Macro {
    /// Substitutes `args` for the parameters, token by token. Labels defined in
    /// the body are renamed with `expansion` so that every expansion gets its
    /// own copy. The expanded lines carry `line_nr`, the line of the call.
    pub fn expand(&self, args: &[String], expansion: usize, line_nr: usize) -> Result<Vec<Line>> {
        if args.len() != self.params.len() {
            return Err(AssemblyError::new(
                AssemblyErrorKind::MacroArity {
                    expected: self.params.len(),
                    found: args.len(),
                },
                format!("in call of `{}`", self.name),
                line_nr,
            ));
        }

        let locals: HashSet<&str> = self
            .body
            .iter()
            .filter_map(|line| line.tokens.first())
            .filter_map(|token| token.strip_suffix(':'))
            .collect();

        let substitute = |token: &String| -> String {
            if let Some(i) = self.params.iter().position(|param| param == token) {
                return args[i].clone();
            }

            match token.strip_suffix(':') {
                Some(label) if locals.contains(label) => {
                    format!("{}:", self.local_name(label, expansion))
                }
                None if locals.contains(token.as_str()) => self.local_name(token, expansion),
                _ => token.clone(),
            }
        };

        Ok(self
            .body
            .iter()
            .map(|line| Line {
                tokens: line.tokens.iter().map(substitute).collect(),
                line_nr,
            })
            .collect())
    }

    fn local_name(&self, label: &str, expansion: usize) -> String {
        format!("{}@{}#{}", label, self.name, expansion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::eyre::Result;

    fn line(text: &str) -> Line {
        Line {
            tokens: text.split_whitespace().map(String::from).collect(),
            line_nr: 1,
        }
    }

    fn tokens(lines: &[Line]) -> Vec<Vec<&str>> {
        lines
            .iter()
            .map(|line| line.tokens.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn test_substitutes_params_by_position() -> Result<()> {
        let mac = Macro {
            name: "SET".into(),
            params: vec!["addr".into(), "value".into()],
            body: vec![line("LOAD value"), line("STORE addr")],
        };

        let expanded = mac.expand(&["3".into(), "0x41".into()], 0, 7)?;
        assert_eq!(tokens(&expanded), vec![vec!["LOAD", "0x41"], vec!["STORE", "3"]]);
        assert!(expanded.iter().all(|line| line.line_nr == 7));

        Ok(())
    }

    #[test]
    fn test_substitution_is_token_level() -> Result<()> {
        let mac = Macro {
            name: "M".into(),
            params: vec!["x".into()],
            body: vec![line("LOAD xx")],
        };

        let expanded = mac.expand(&["5".into()], 0, 1)?;
        assert_eq!(tokens(&expanded), vec![vec!["LOAD", "xx"]]);

        Ok(())
    }

    #[test]
    fn test_renames_local_labels() -> Result<()> {
        let mac = Macro {
            name: "SPIN".into(),
            params: vec![],
            body: vec![line("top: SUB 0"), line("JNZ top"), line("JMP outer")],
        };

        let expanded = mac.expand(&[], 2, 1)?;
        assert_eq!(
            tokens(&expanded),
            vec![
                vec!["top@SPIN#2:", "SUB", "0"],
                vec!["JNZ", "top@SPIN#2"],
                vec!["JMP", "outer"],
            ]
        );

        Ok(())
    }

    #[test]
    fn test_arity_mismatch() -> Result<()> {
        let mac = Macro {
            name: "M".into(),
            params: vec!["a".into()],
            body: vec![],
        };

        let err = mac.expand(&[], 0, 4).unwrap_err();
        assert_eq!(
            err.kind(),
            AssemblyErrorKind::MacroArity {
                expected: 1,
                found: 0
            }
        );
        assert_eq!(err.line_nr(), 4);

        Ok(())
    }
}
