use compact_str::{format_compact, CompactString};
use std::fmt;

use super::{Dfa, DfaState, StateId};
use crate::interval::EOF;

/// Display names of token types
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    literal_names: Vec<Option<CompactString>>,
    symbolic_names: Vec<Option<CompactString>>,
}

impl Vocabulary {
    /// Names are indexed by token type; index 0 is unused
    #[must_use]
    pub fn new(
        literal_names: impl IntoIterator<Item = Option<&'static str>>,
        symbolic_names: impl IntoIterator<Item = Option<&'static str>>,
    ) -> Self {
        Self {
            literal_names: literal_names
                .into_iter()
                .map(|n| n.map(CompactString::from))
                .collect(),
            symbolic_names: symbolic_names
                .into_iter()
                .map(|n| n.map(CompactString::from))
                .collect(),
        }
    }

    fn lookup(names: &[Option<CompactString>], token_type: i32) -> Option<&str> {
        usize::try_from(token_type)
            .ok()
            .and_then(|i| names.get(i))
            .and_then(|name| name.as_deref())
    }

    #[must_use]
    pub fn literal_name(&self, token_type: i32) -> Option<&str> {
        Self::lookup(&self.literal_names, token_type)
    }

    #[must_use]
    pub fn symbolic_name(&self, token_type: i32) -> Option<&str> {
        if token_type == EOF {
            return Some("EOF");
        }
        Self::lookup(&self.symbolic_names, token_type)
    }

    /// Literal name, else symbolic name, else the number
    #[must_use]
    pub fn display_name(&self, token_type: i32) -> CompactString {
        self.literal_name(token_type)
            .or_else(|| self.symbolic_name(token_type))
            .map_or_else(|| format_compact!("{token_type}"), CompactString::from)
    }
}

enum EdgeLabels<'a> {
    Tokens(&'a Vocabulary),
    Chars,
}

/// Text form of a DFA, one edge per line:
/// `s0-ID->:s1=>2`
pub struct DfaDisplay<'a> {
    dfa: &'a Dfa,
    labels: EdgeLabels<'a>,
}

impl Dfa {
    /// Render a parser DFA with token names from `vocabulary`
    #[must_use]
    pub fn display<'a>(&'a self, vocabulary: &'a Vocabulary) -> DfaDisplay<'a> {
        DfaDisplay {
            dfa: self,
            labels: EdgeLabels::Tokens(vocabulary),
        }
    }

    /// Render a lexer DFA with quoted characters
    #[must_use]
    pub fn display_lexer(&self) -> DfaDisplay<'_> {
        DfaDisplay {
            dfa: self,
            labels: EdgeLabels::Chars,
        }
    }
}

fn write_state(f: &mut fmt::Formatter<'_>, state: &DfaState) -> fmt::Result {
    if state.is_accept_state {
        f.write_str(":")?;
    }
    write!(f, "s{}", state.state_number.0)?;
    if state.requires_full_context {
        f.write_str("^")?;
    }
    if state.is_accept_state {
        if let Some(predicates) = &state.predicates {
            f.write_str("=>[")?;
            for (i, p) in predicates.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "({}, {})", p.pred, p.alt)?;
            }
            f.write_str("]")?;
        } else if let Some(prediction) = state.prediction {
            write!(f, "=>{prediction}")?;
        }
    }
    Ok(())
}

impl fmt::Display for DfaDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for state in self.dfa.states() {
            for (symbol, target) in self.dfa.edges_from(state.state_number) {
                let Some(target) = self.dfa.state(target) else {
                    continue;
                };
                write_state(f, state)?;
                match &self.labels {
                    EdgeLabels::Tokens(vocabulary) => {
                        write!(f, "-{}->", vocabulary.display_name(symbol))?;
                    }
                    EdgeLabels::Chars => match u32::try_from(symbol).ok().and_then(char::from_u32)
                    {
                        Some(c) => write!(f, "-'{}'->", c.escape_default())?,
                        None => write!(f, "-{symbol}->")?,
                    },
                }
                write_state(f, target)?;
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_error() {
            f.write_str("ERROR")
        } else {
            write!(f, "s{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_fallbacks() {
        let vocabulary = Vocabulary::new([None, Some("'+'"), None], [None, Some("PLUS"), Some("ID")]);
        assert_eq!(vocabulary.display_name(1), "'+'");
        assert_eq!(vocabulary.display_name(2), "ID");
        assert_eq!(vocabulary.display_name(7), "7");
        assert_eq!(vocabulary.display_name(EOF), "EOF");
    }
}
